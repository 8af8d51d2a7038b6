//! Client-side optimistic execution
//!
//! The client runs the same pipeline as the server the moment a command is
//! issued, renders the prediction, and keeps it in a FIFO of pending
//! commands. When an authoritative state arrives the engine reconciles:
//! a prediction the server confirmed is dropped from the queue, the rest are
//! replayed on top of the server state, and anything that no longer applies
//! is discarded together with its successors.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tabula_core::{
    execute_pipeline, CommandOf, EventStream, Game, GameRng, MatchState, PipelineConfig,
    PipelineOutcome, PlayerId, RandomProbe, RandomSource,
};
use tracing::{debug, info, warn};

/// Whether a command type may be predicted locally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Determinism {
    /// Predict, but discard the result if it drew any randomness
    #[default]
    Auto,
    /// Always keep the prediction; no probe
    Deterministic,
    /// Never predict
    NonDeterministic,
}

/// What happens to the events of a prediction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnimationMode {
    /// Keep predicted events so they animate immediately
    Optimistic,
    /// Keep the previous event stream; events animate once confirmed
    #[default]
    WaitConfirm,
}

/// Per-command-type prediction policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimisticConfig {
    pub determinism: IndexMap<String, Determinism>,
    pub animation: IndexMap<String, AnimationMode>,
    /// Predictions beyond this many unconfirmed commands are sent unpredicted
    pub max_pending: usize,
}

impl Default for OptimisticConfig {
    fn default() -> Self {
        Self {
            determinism: IndexMap::new(),
            animation: IndexMap::new(),
            max_pending: 32,
        }
    }
}

impl OptimisticConfig {
    pub fn with_determinism(mut self, command_type: impl Into<String>, d: Determinism) -> Self {
        self.determinism.insert(command_type.into(), d);
        self
    }

    pub fn with_animation(mut self, command_type: impl Into<String>, mode: AnimationMode) -> Self {
        self.animation.insert(command_type.into(), mode);
        self
    }

    pub fn determinism_of(&self, command_type: &str) -> Determinism {
        self.determinism.get(command_type).copied().unwrap_or_default()
    }

    pub fn animation_of(&self, command_type: &str) -> AnimationMode {
        self.animation.get(command_type).copied().unwrap_or_default()
    }
}

/// Where the engine stands relative to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    /// Rendering confirmed state; nothing pending
    Idle,
    /// At least one prediction awaits confirmation
    Predicting,
    /// The last reconcile discarded every prediction
    RolledBack,
}

/// A command predicted locally and not yet confirmed
#[derive(Debug, Clone)]
pub struct PendingCommand<G: Game> {
    pub seq: u64,
    pub command: CommandOf<G>,
    pub predicted: MatchState<G>,
    pub previous: MatchState<G>,
}

/// Result of issuing a command
#[derive(Debug, Clone)]
pub struct Prediction<G: Game> {
    /// The state to render now, or `None` to keep rendering the current one
    pub state_to_render: Option<MatchState<G>>,
    /// Commands are always sent; prediction never replaces the server
    pub should_send: bool,
    pub animation: AnimationMode,
}

impl<G: Game> Prediction<G> {
    fn send_only() -> Self {
        Self {
            state_to_render: None,
            should_send: true,
            animation: AnimationMode::WaitConfirm,
        }
    }

    pub fn is_predicted(&self) -> bool {
        self.state_to_render.is_some()
    }
}

/// How a reconciled render relates to the events already played
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamChange {
    /// Nothing was played ahead of the server; consume forward
    Forward,
    /// Every played event survived unchanged
    Confirmed,
    /// Played events were replaced, starting at this id
    Diverged { first_replaced: u64 },
}

/// Result of reconciling with an authoritative state
#[derive(Debug, Clone)]
pub struct ReconcileOutcome<G: Game> {
    pub state_to_render: MatchState<G>,
    /// At least one prediction no longer applied and was discarded
    pub did_rollback: bool,
    /// Highest event id shown through optimistic animation before this
    /// reconcile
    pub watermark: Option<u64>,
    pub stream_change: StreamChange,
    /// The server state matched the oldest prediction
    pub confirmed_prefix: bool,
    /// Predictions discarded because they no longer applied
    pub dropped: usize,
}

/// Keep or strip the events of an optimistic result
pub fn apply_animation_mode<G: Game>(
    predicted: MatchState<G>,
    previous: &MatchState<G>,
    mode: AnimationMode,
) -> MatchState<G> {
    let mut state = predicted;
    if mode == AnimationMode::WaitConfirm {
        state.sys.event_stream = previous.sys.event_stream.clone();
    }
    state
}

/// Highest id in the stream, if any entry is held
pub fn max_event_id<E>(stream: &EventStream<E>) -> Option<u64> {
    stream.max_id()
}

/// Compare a stream played up to `watermark` with the one about to render
pub fn compare_played<E: PartialEq>(
    played: &EventStream<E>,
    rendered: &EventStream<E>,
    watermark: u64,
) -> StreamChange {
    let held = rendered.entries();
    for entry in played.entries().iter().take_while(|e| e.id <= watermark) {
        let kept = held
            .binary_search_by_key(&entry.id, |e| e.id)
            .ok()
            .map(|i| &held[i]);
        if kept != Some(entry) {
            return StreamChange::Diverged {
                first_replaced: entry.id,
            };
        }
    }
    StreamChange::Confirmed
}

/// Drop entries that already played through optimistic animation
pub fn filter_played_events<G: Game>(
    state: &MatchState<G>,
    watermark: Option<u64>,
) -> MatchState<G> {
    let mut filtered = state.clone();
    if let Some(watermark) = watermark {
        filtered.sys.event_stream.drop_through(watermark);
    }
    filtered
}

/// Client prediction engine for one match
pub struct OptimisticEngine<G: Game> {
    pipeline: Arc<PipelineConfig<G>>,
    config: OptimisticConfig,
    player_ids: Vec<PlayerId>,
    random: Box<dyn RandomSource + Send>,
    confirmed: Option<MatchState<G>>,
    pending: VecDeque<PendingCommand<G>>,
    next_seq: u64,
    watermark: Option<u64>,
    phase: EnginePhase,
}

impl<G: Game> OptimisticEngine<G> {
    pub fn new(pipeline: Arc<PipelineConfig<G>>, config: OptimisticConfig) -> Self {
        Self {
            pipeline,
            config,
            player_ids: Vec::new(),
            random: Box::new(GameRng::default()),
            confirmed: None,
            pending: VecDeque::new(),
            next_seq: 1,
            watermark: None,
            phase: EnginePhase::Idle,
        }
    }

    /// Use a specific local random source for predictions
    pub fn with_random(mut self, random: impl RandomSource + Send + 'static) -> Self {
        self.random = Box::new(random);
        self
    }

    pub fn with_player_ids(mut self, player_ids: Vec<PlayerId>) -> Self {
        self.player_ids = player_ids;
        self
    }

    pub fn set_player_ids(&mut self, player_ids: Vec<PlayerId>) {
        self.player_ids = player_ids;
    }

    /// Latest prediction, or the confirmed state
    pub fn current_state(&self) -> Option<&MatchState<G>> {
        self.pending
            .back()
            .map(|p| &p.predicted)
            .or(self.confirmed.as_ref())
    }

    pub fn confirmed_state(&self) -> Option<&MatchState<G>> {
        self.confirmed.as_ref()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingCommand<G>> {
        self.pending.iter()
    }

    pub fn watermark(&self) -> Option<u64> {
        self.watermark
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    /// Predict `command` locally if policy allows
    pub fn process_command(&mut self, command: CommandOf<G>) -> Prediction<G> {
        let Some(current) = self.current_state().cloned() else {
            return Prediction::send_only();
        };
        let command_type = command.command_type().to_string();
        let declared = self.config.determinism_of(&command_type);
        if declared == Determinism::NonDeterministic {
            return Prediction::send_only();
        }
        if self.pending.len() >= self.config.max_pending {
            debug!(command = %command_type, pending = self.pending.len(), "pending queue full; not predicting");
            return Prediction::send_only();
        }

        let (result, drew_random) = if declared == Determinism::Auto {
            let mut probe = RandomProbe::new(self.random.as_mut());
            let result =
                execute_pipeline(&self.pipeline, &current, &command, &mut probe, &self.player_ids);
            (result, probe.was_used())
        } else {
            let result = execute_pipeline(
                &self.pipeline,
                &current,
                &command,
                self.random.as_mut(),
                &self.player_ids,
            );
            (result, false)
        };

        let state = match result {
            Ok(PipelineOutcome::Applied { state, .. }) if !drew_random => state,
            Ok(PipelineOutcome::Applied { .. }) => {
                debug!(command = %command_type, "prediction drew randomness; discarded");
                return Prediction::send_only();
            }
            Ok(PipelineOutcome::Rejected { rejection }) => {
                debug!(command = %command_type, code = %rejection.code, "rejected locally; sending anyway");
                return Prediction::send_only();
            }
            Err(err) => {
                warn!(command = %command_type, error = %err, "local prediction faulted");
                return Prediction::send_only();
            }
        };

        let mode = self.config.animation_of(&command_type);
        if mode == AnimationMode::Optimistic {
            if let Some(max) = max_event_id(state.event_stream()) {
                self.watermark = Some(self.watermark.map_or(max, |w| w.max(max)));
            }
        }
        let predicted = apply_animation_mode(state, &current, mode);

        self.pending.push_back(PendingCommand {
            seq: self.next_seq,
            command,
            predicted: predicted.clone(),
            previous: current,
        });
        self.next_seq += 1;
        self.phase = EnginePhase::Predicting;

        Prediction {
            state_to_render: Some(predicted),
            should_send: true,
            animation: mode,
        }
    }

    /// Reconcile with an authoritative state from the server
    pub fn reconcile(&mut self, server: MatchState<G>) -> ReconcileOutcome<G> {
        let shown = self.watermark;
        let played = shown
            .and_then(|_| self.current_state())
            .map(|state| state.sys.event_stream.clone());
        self.confirmed = Some(server.clone());

        if self.pending.is_empty() {
            self.watermark = None;
            self.phase = EnginePhase::Idle;
            return ReconcileOutcome {
                state_to_render: server,
                did_rollback: false,
                watermark: None,
                stream_change: StreamChange::Forward,
                confirmed_prefix: false,
                dropped: 0,
            };
        }

        let mut pending = std::mem::take(&mut self.pending);
        // Otherwise the server state came from someone else's command and
        // every prediction is replayed on top of it.
        let confirmed_prefix = pending
            .front()
            .is_some_and(|first| first.predicted.core == server.core);
        if confirmed_prefix {
            pending.pop_front();
        }
        let replaying = pending.len();
        self.pending = self.replay(&server, pending);
        let dropped = replaying - self.pending.len();
        self.watermark = self.played_watermark();

        let state_to_render = match self.pending.back() {
            Some(latest) => {
                self.phase = EnginePhase::Predicting;
                latest.predicted.clone()
            }
            None if dropped == 0 => {
                self.phase = EnginePhase::Idle;
                server
            }
            None => {
                self.phase = EnginePhase::RolledBack;
                server
            }
        };
        let stream_change = match (&played, shown) {
            (Some(played), Some(watermark)) => {
                compare_played(played, state_to_render.event_stream(), watermark)
            }
            _ => StreamChange::Forward,
        };

        if dropped > 0 || matches!(stream_change, StreamChange::Diverged { .. }) {
            info!(
                confirmed_prefix,
                dropped,
                pending = self.pending.len(),
                watermark = ?shown,
                change = ?stream_change,
                "reconciled; played events replaced"
            );
        } else {
            debug!(
                confirmed_prefix,
                pending = self.pending.len(),
                change = ?stream_change,
                "reconciled"
            );
        }
        ReconcileOutcome {
            state_to_render,
            did_rollback: dropped > 0,
            watermark: shown,
            stream_change,
            confirmed_prefix,
            dropped,
        }
    }

    /// Forget everything (reconnect, tab resync)
    pub fn reset(&mut self) {
        self.pending.clear();
        self.confirmed = None;
        self.next_seq = 1;
        self.watermark = None;
        self.phase = EnginePhase::Idle;
    }

    /// Highest event id the kept optimistic predictions put on screen
    fn played_watermark(&self) -> Option<u64> {
        self.pending
            .iter()
            .rev()
            .find(|p| self.config.animation_of(p.command.command_type()) == AnimationMode::Optimistic)
            .and_then(|p| max_event_id(p.predicted.event_stream()))
    }

    /// Re-run pending commands on `base`, stopping at the first that fails
    fn replay(
        &mut self,
        base: &MatchState<G>,
        commands: VecDeque<PendingCommand<G>>,
    ) -> VecDeque<PendingCommand<G>> {
        let mut replayed = VecDeque::with_capacity(commands.len());
        let mut current = base.clone();
        for pending in commands {
            let outcome = execute_pipeline(
                &self.pipeline,
                &current,
                &pending.command,
                self.random.as_mut(),
                &self.player_ids,
            );
            let state = match outcome {
                Ok(PipelineOutcome::Applied { state, .. }) => state,
                Ok(PipelineOutcome::Rejected { rejection }) => {
                    debug!(seq = pending.seq, code = %rejection.code, "prediction no longer applies");
                    break;
                }
                Err(err) => {
                    warn!(seq = pending.seq, error = %err, "replaying prediction faulted");
                    break;
                }
            };
            let mode = self.config.animation_of(pending.command.command_type());
            let predicted = apply_animation_mode(state, &current, mode);
            let previous = std::mem::replace(&mut current, predicted.clone());
            replayed.push_back(PendingCommand {
                seq: pending.seq,
                command: pending.command,
                predicted,
                previous,
            });
        }
        replayed
    }
}
