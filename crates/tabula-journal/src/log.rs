//! Match recording
//!
//! A match is fully described by its seed, its seats and the commands the
//! server accepted, in order. Anything else can be recomputed.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tabula_core::{
    execute_pipeline, new_match, CommandOf, Game, GameRng, MatchState, PipelineConfig,
    PipelineOutcome, PlayerId,
};
use tracing::{debug, info};

/// Everything needed to reproduce a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct MatchLog<G: Game> {
    pub seed: u64,
    pub player_ids: Vec<PlayerId>,
    /// Accepted commands only; rejections never touch state or randomness
    pub commands: Vec<CommandOf<G>>,
    pub started_at: Option<DateTime<Utc>>,
}

impl<G: Game> MatchLog<G> {
    pub fn new(seed: u64, player_ids: Vec<PlayerId>) -> Self {
        Self {
            seed,
            player_ids,
            commands: Vec::new(),
            started_at: None,
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Runs a match the way a server does and records what it accepts
pub struct MatchRecorder<G: Game> {
    pipeline: Arc<PipelineConfig<G>>,
    log: MatchLog<G>,
    state: MatchState<G>,
    random: GameRng,
}

impl<G: Game> MatchRecorder<G> {
    /// Set up a match from `seed`
    pub fn new(pipeline: Arc<PipelineConfig<G>>, seed: u64, player_ids: Vec<PlayerId>) -> Self {
        let mut random = GameRng::new(seed);
        let state = new_match(&pipeline, &player_ids, &mut random);
        let mut log = MatchLog::new(seed, player_ids);
        log.started_at = Some(Utc::now());
        info!(seed, players = log.player_ids.len(), "recording match");
        Self {
            pipeline,
            log,
            state,
            random,
        }
    }

    /// Run a command, keeping it in the log if it was applied
    pub fn submit(&mut self, command: CommandOf<G>) -> Result<PipelineOutcome<G>> {
        let outcome = execute_pipeline(
            &self.pipeline,
            &self.state,
            &command,
            &mut self.random,
            &self.log.player_ids,
        )?;
        match &outcome {
            PipelineOutcome::Applied { state, events } => {
                debug!(command = %command.command_type(), events = events.len(), "recorded");
                self.state = state.clone();
                self.log.commands.push(command);
            }
            PipelineOutcome::Rejected { rejection } => {
                debug!(command = %command.command_type(), code = %rejection.code, "not recorded");
            }
        }
        Ok(outcome)
    }

    pub fn state(&self) -> &MatchState<G> {
        &self.state
    }

    pub fn log(&self) -> &MatchLog<G> {
        &self.log
    }

    pub fn into_log(self) -> MatchLog<G> {
        self.log
    }
}

/// Re-run every command of `log` and return the final state.
///
/// Every command was accepted when recorded; a rejection now means the
/// pipeline is not deterministic for this log.
pub fn replay_commands<G: Game>(
    pipeline: &PipelineConfig<G>,
    log: &MatchLog<G>,
) -> Result<MatchState<G>> {
    replay_prefix(pipeline, log, log.commands.len())
}

/// State after the first `count` commands of `log`
pub fn replay_prefix<G: Game>(
    pipeline: &PipelineConfig<G>,
    log: &MatchLog<G>,
    count: usize,
) -> Result<MatchState<G>> {
    let mut random = GameRng::new(log.seed);
    let mut state = new_match(pipeline, &log.player_ids, &mut random);
    for (index, command) in log.commands.iter().take(count).enumerate() {
        match execute_pipeline(pipeline, &state, command, &mut random, &log.player_ids)? {
            PipelineOutcome::Applied { state: next, .. } => state = next,
            PipelineOutcome::Rejected { rejection } => {
                return Err(Error::Diverged {
                    index,
                    command_type: command.command_type().to_string(),
                    code: rejection.code,
                });
            }
        }
    }
    Ok(state)
}
