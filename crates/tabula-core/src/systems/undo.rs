//! Undo: full-state snapshots with event-stream rewind

use super::{Gate, System, SystemContext};
use crate::command::SysCommand;
use crate::domain::{codes, CommandOf, EventOf, Game, Rejection};
use crate::error::Result;
use crate::rng::RandomSource;
use crate::state::MatchState;
use serde::{Deserialize, Serialize};
use tracing::info;

/// The state before an undoable command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct UndoSnapshot<G: Game> {
    /// Stored without its own undo stack or event history
    pub state: Box<MatchState<G>>,
    /// Event stream position to rewind to
    pub next_event_id: u64,
    pub command_type: String,
}

/// Bounded snapshot stack, newest last
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct UndoState<G: Game> {
    pub snapshots: Vec<UndoSnapshot<G>>,
}

impl<G: Game> Default for UndoState<G> {
    fn default() -> Self {
        Self {
            snapshots: Vec::new(),
        }
    }
}

impl<G: Game> UndoState<G> {
    pub fn can_undo(&self) -> bool {
        !self.snapshots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Push a snapshot, evicting the oldest beyond `max`
    pub fn push(&mut self, snapshot: UndoSnapshot<G>, max: usize) {
        self.snapshots.push(snapshot);
        if max > 0 && self.snapshots.len() > max {
            let excess = self.snapshots.len() - max;
            self.snapshots.drain(..excess);
        }
    }
}

/// Owns `sys.undo` and handles `SYS_UNDO`
#[derive(Debug, Clone, Default)]
pub struct UndoSystem;

impl UndoSystem {
    pub fn new() -> Self {
        Self
    }
}

impl<G: Game> System<G> for UndoSystem {
    fn name(&self) -> &'static str {
        "undo"
    }

    fn before_command(
        &self,
        ctx: &SystemContext<'_, G>,
        state: &MatchState<G>,
        command: &CommandOf<G>,
        _random: &mut dyn RandomSource,
    ) -> Result<Gate<G>> {
        if !matches!(command.as_system(), Some(SysCommand::Undo)) {
            return Ok(Gate::Continue);
        }
        if !ctx.config.undo.enabled {
            return Ok(Gate::Reject(Rejection::new(
                codes::UNDO_DISABLED,
                "undo is disabled for this match",
            )));
        }

        let mut remaining = state.sys.undo.snapshots.clone();
        let Some(snapshot) = remaining.pop() else {
            return Ok(Gate::Reject(Rejection::new(
                codes::UNDO_EMPTY,
                "nothing to undo",
            )));
        };

        let mut restored = *snapshot.state;
        restored.sys.undo.snapshots = remaining;
        restored.sys.event_stream = state.sys.event_stream.clone();
        restored.sys.event_stream.rewind_to(snapshot.next_event_id);

        info!(
            undone = %snapshot.command_type,
            next_event_id = snapshot.next_event_id,
            remaining = restored.sys.undo.len(),
            "undo restored snapshot"
        );
        Ok(Gate::Restore(Box::new(restored)))
    }

    fn after_command(
        &self,
        ctx: &SystemContext<'_, G>,
        previous: &MatchState<G>,
        next: &mut MatchState<G>,
        command: &CommandOf<G>,
        events: &[EventOf<G>],
    ) {
        let undo = &ctx.config.undo;
        if !undo.enabled
            || command.is_system()
            || events.is_empty()
            || undo.skip_commands.iter().any(|t| t == command.command_type())
        {
            return;
        }

        let mut snapshot_state = previous.clone();
        snapshot_state.sys.undo.snapshots.clear();
        snapshot_state.sys.event_stream.strip();

        next.sys.undo.push(
            UndoSnapshot {
                state: Box::new(snapshot_state),
                next_event_id: previous.sys.event_stream.next_id(),
                command_type: command.command_type().to_string(),
            },
            undo.max_snapshots,
        );
    }
}
