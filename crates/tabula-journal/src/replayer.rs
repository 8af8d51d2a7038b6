//! Replay functionality for recorded matches

use crate::log::{replay_prefix, MatchLog};
use crate::{Error, Result};
use tabula_core::{
    execute_pipeline, DomainCore, EventStream, Game, GameRng, MatchState, PipelineConfig,
    PipelineOutcome, PlayerId,
};
use tracing::warn;

/// Fold an event stream through `reduce` alone, starting from `setup`.
///
/// The stream must be complete: trimmed streams cannot be folded because
/// the dropped prefix changed the core too.
pub fn replay_reduce<G: Game>(
    domain: &dyn DomainCore<G>,
    seed: u64,
    player_ids: &[PlayerId],
    stream: &EventStream<G::Event>,
) -> Result<G::Core> {
    if let Some(first) = stream.entries().first() {
        if first.id != 0 {
            return Err(Error::TrimmedStream(first.id));
        }
    }
    let mut core = domain.setup(player_ids, &mut GameRng::new(seed));
    for entry in stream.entries() {
        core = domain
            .reduce(&core, &entry.event)
            .map_err(|fault| Error::ReduceFault {
                id: entry.id,
                message: fault.to_string(),
            })?;
    }
    Ok(core)
}

/// Check that folding the live event stream reproduces the live core
pub fn verify_reduce_purity<G: Game>(
    pipeline: &PipelineConfig<G>,
    log: &MatchLog<G>,
    state: &MatchState<G>,
) -> Result<()> {
    let stream = state.event_stream();
    let folded = replay_reduce(pipeline.domain.as_ref(), log.seed, &log.player_ids, stream)?;
    if folded != state.core {
        warn!(events = stream.len(), "folded core differs from live core");
        return Err(Error::ImpureReduce {
            events: stream.len(),
        });
    }
    Ok(())
}

/// State of the replayer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    /// Not started
    Idle,
    /// Stopped somewhere inside the log
    Paused,
    /// Reached end of log
    Finished,
}

/// Steps through a recorded match one command at a time
pub struct Replayer<'a, G: Game> {
    pipeline: &'a PipelineConfig<G>,
    log: &'a MatchLog<G>,
    state: MatchState<G>,
    random: GameRng,
    position: usize,
    replay_state: ReplayState,
}

impl<'a, G: Game> Replayer<'a, G> {
    /// Create a replayer positioned before the first command
    pub fn new(pipeline: &'a PipelineConfig<G>, log: &'a MatchLog<G>) -> Self {
        let mut random = GameRng::new(log.seed);
        let state = tabula_core::new_match(pipeline, &log.player_ids, &mut random);
        Self {
            pipeline,
            log,
            state,
            random,
            position: 0,
            replay_state: ReplayState::Idle,
        }
    }

    pub fn state(&self) -> &MatchState<G> {
        &self.state
    }

    /// Number of commands applied so far
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn replay_state(&self) -> ReplayState {
        self.replay_state
    }

    /// Apply the next command; `false` once the log is exhausted
    pub fn step_forward(&mut self) -> Result<bool> {
        let Some(command) = self.log.commands.get(self.position) else {
            self.replay_state = ReplayState::Finished;
            return Ok(false);
        };
        let outcome = execute_pipeline(
            self.pipeline,
            &self.state,
            command,
            &mut self.random,
            &self.log.player_ids,
        )?;
        match outcome {
            PipelineOutcome::Applied { state, .. } => self.state = state,
            PipelineOutcome::Rejected { rejection } => {
                return Err(Error::Diverged {
                    index: self.position,
                    command_type: command.command_type().to_string(),
                    code: rejection.code,
                });
            }
        }
        self.position += 1;
        self.replay_state = if self.position == self.log.len() {
            ReplayState::Finished
        } else {
            ReplayState::Paused
        };
        Ok(true)
    }

    /// Step backward one command by replaying from the start
    pub fn step_backward(&mut self) -> Result<bool> {
        if self.position == 0 {
            return Ok(false);
        }
        self.goto(self.position - 1)?;
        Ok(true)
    }

    /// Jump to the state after `position` commands
    pub fn goto(&mut self, position: usize) -> Result<()> {
        let position = position.min(self.log.len());
        if position < self.position {
            self.reset();
        }
        while self.position < position {
            self.step_forward()?;
        }
        if position == self.log.len() {
            self.replay_state = ReplayState::Finished;
        }
        Ok(())
    }

    /// Back to the freshly set-up match
    pub fn reset(&mut self) {
        self.random = GameRng::new(self.log.seed);
        self.state = tabula_core::new_match(self.pipeline, &self.log.player_ids, &mut self.random);
        self.position = 0;
        self.replay_state = ReplayState::Idle;
    }

    /// Final state without stepping
    pub fn run_to_end(&mut self) -> Result<&MatchState<G>> {
        self.goto(self.log.len())?;
        Ok(&self.state)
    }

    /// Equivalent stateless replay of the first `position` commands
    pub fn state_at(&self, position: usize) -> Result<MatchState<G>> {
        replay_prefix(self.pipeline, self.log, position)
    }
}
