//! Systems layered around the domain core
//!
//! Each system owns one slice of [`SystemState`] and sees every command
//! before the domain does and every event after the domain has folded it.
//! Systems run in registration order; the default order is undo, tutorial,
//! interaction, response window.

pub mod interaction;
pub mod response;
pub mod tutorial;
pub mod undo;

use crate::category::CategoryTable;
use crate::config::EngineConfig;
use crate::domain::{CommandOf, DomainCore, EventBodyOf, EventOf, Game, Rejection};
use crate::error::Result;
use crate::event::SysEvent;
use crate::identity::PlayerId;
use crate::rng::RandomSource;
use crate::state::{MatchState, SystemState};

pub use interaction::InteractionSystem;
pub use response::ResponseWindowSystem;
pub use tutorial::TutorialSystem;
pub use undo::UndoSystem;

/// Read-only context handed to every system hook
pub struct SystemContext<'a, G: Game> {
    pub domain: &'a dyn DomainCore<G>,
    pub categories: &'a CategoryTable,
    pub config: &'a EngineConfig,
    pub player_ids: &'a [PlayerId],
    /// The command being applied was injected by a system (tutorial AI)
    pub scripted: bool,
    /// Nesting level of scripted commands; 0 for external commands
    pub depth: usize,
    /// Timestamp of the command being applied
    pub timestamp: u64,
}

/// What a system decides about an incoming command
#[derive(Debug)]
pub enum Gate<G: Game> {
    /// Not my business; ask the next system
    Continue,
    /// Refuse the command; state is returned unchanged
    Reject(Rejection),
    /// The system consumed the command and produced these events
    Handled(Vec<EventBodyOf<G>>),
    /// Replace the whole state (undo) without emitting events
    Restore(Box<MatchState<G>>),
}

/// Commands a system wants run through the pipeline on someone's behalf
#[derive(Debug)]
pub struct Scheduled<G: Game> {
    /// Folded before the commands run. Must change the system's state so
    /// the same batch is not scheduled again.
    pub marker: Vec<SysEvent>,
    pub commands: Vec<CommandOf<G>>,
}

pub trait System<G: Game>: Send + Sync {
    fn name(&self) -> &'static str;

    /// Gate an incoming command, or handle a `SYS_` command outright
    fn before_command(
        &self,
        _ctx: &SystemContext<'_, G>,
        _state: &MatchState<G>,
        _command: &CommandOf<G>,
        _random: &mut dyn RandomSource,
    ) -> Result<Gate<G>> {
        Ok(Gate::Continue)
    }

    /// Fold an event into this system's slice. `core` is already reduced.
    fn reduce(
        &self,
        _ctx: &SystemContext<'_, G>,
        _core: &G::Core,
        _sys: &mut SystemState<G>,
        _event: &EventOf<G>,
    ) {
    }

    /// Deterministic follow-up events, folded immediately after `event`
    fn after_event(
        &self,
        _ctx: &SystemContext<'_, G>,
        _state: &MatchState<G>,
        _event: &EventOf<G>,
    ) -> Vec<SysEvent> {
        Vec::new()
    }

    /// Bookkeeping once an external command has been fully applied
    fn after_command(
        &self,
        _ctx: &SystemContext<'_, G>,
        _previous: &MatchState<G>,
        _next: &mut MatchState<G>,
        _command: &CommandOf<G>,
        _events: &[EventOf<G>],
    ) {
    }

    /// Scripted commands to run after the current command's events
    fn take_scheduled(
        &self,
        _ctx: &SystemContext<'_, G>,
        _state: &MatchState<G>,
    ) -> Option<Scheduled<G>> {
        None
    }
}
