//! The domain plug-in contract
//!
//! A game is a [`Game`] marker binding three types together plus a
//! [`DomainCore`] implementation holding its pure functions. The core is
//! chosen once at match setup and threaded through every pipeline call.

use crate::command::{Command, CommandKind};
use crate::error::DomainFault;
use crate::event::{Event, EventBody, EventKind};
use crate::event_stream::EventStreamEntry;
use crate::identity::{DefId, PlayerId};
use crate::rng::RandomSource;
use crate::state::MatchState;
use crate::systems::interaction::{EntityRef, Interaction, InteractionOption};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Binds a domain's state, command and event types.
///
/// Implemented by a unit marker type; the engine is generic over it.
pub trait Game: fmt::Debug + Clone + PartialEq + Send + Sync + 'static {
    type Core: fmt::Debug + Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync;
    type Command: CommandKind
        + fmt::Debug
        + Clone
        + PartialEq
        + Serialize
        + DeserializeOwned
        + Send
        + Sync;
    type Event: EventKind + fmt::Debug + Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync;
}

pub type CommandOf<G> = Command<<G as Game>::Command>;
pub type EventOf<G> = Event<<G as Game>::Event>;
pub type EventBodyOf<G> = EventBody<<G as Game>::Event>;
pub type EntryOf<G> = EventStreamEntry<<G as Game>::Event>;

/// Stable rejection codes used by the engine's own systems
pub mod codes {
    pub const UNHANDLED_SYSTEM_COMMAND: &str = "system.unhandled";
    pub const INTERACTION_PENDING: &str = "interaction.pending";
    pub const INTERACTION_NONE: &str = "interaction.none";
    pub const INTERACTION_STALE: &str = "interaction.stale";
    pub const INTERACTION_NOT_OWNER: &str = "interaction.not_owner";
    pub const INTERACTION_UNKNOWN_OPTION: &str = "interaction.unknown_option";
    pub const INTERACTION_DUPLICATE_OPTION: &str = "interaction.duplicate_option";
    pub const INTERACTION_SELECTION_COUNT: &str = "interaction.selection_count";
    pub const INTERACTION_NOT_CANCELLABLE: &str = "interaction.not_cancellable";
    pub const UNDO_DISABLED: &str = "undo.disabled";
    pub const UNDO_EMPTY: &str = "undo.empty";
    pub const TUTORIAL_UNKNOWN_MANIFEST: &str = "tutorial.unknown_manifest";
    pub const TUTORIAL_EMPTY_MANIFEST: &str = "tutorial.empty_manifest";
    pub const TUTORIAL_NOT_ACTIVE: &str = "tutorial.not_active";
    pub const TUTORIAL_COMMAND_BLOCKED: &str = "tutorial.command_blocked";
    pub const TUTORIAL_AWAITING_AI: &str = "tutorial.awaiting_ai";
    pub const TUTORIAL_AI_NOT_PLAYED: &str = "tutorial.ai_not_played";
    pub const TUTORIAL_STEP_MISMATCH: &str = "tutorial.step_mismatch";
    pub const RESPONSE_NOT_OPEN: &str = "response.not_open";
    pub const RESPONSE_NOT_RESPONDER: &str = "response.not_responder";
    pub const RESPONSE_CATEGORY_BLOCKED: &str = "response.category_blocked";
}

/// A typed, expected failure: the command is illegal right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub code: String,
    pub message: String,
}

impl Rejection {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// The pure functions a game supplies.
///
/// `validate` and `reduce` must not touch randomness; `execute` may only
/// draw from the source it is handed. `reduce` sees both domain events and
/// the system events that affect the core (`TOKEN_USED`, `DAMAGE_DEALT`).
pub trait DomainCore<G: Game>: Send + Sync {
    /// Build the initial core state
    fn setup(&self, player_ids: &[PlayerId], random: &mut dyn RandomSource) -> G::Core;

    /// Cheap legality check. Illegal input is a rejection, never a panic.
    fn validate(
        &self,
        state: &MatchState<G>,
        player_id: &PlayerId,
        command: &G::Command,
    ) -> Result<(), Rejection>;

    /// Turn a validated command into events
    fn execute(
        &self,
        state: &MatchState<G>,
        player_id: &PlayerId,
        command: &G::Command,
        random: &mut dyn RandomSource,
    ) -> Result<Vec<EventBodyOf<G>>, DomainFault>;

    /// Pure fold of one event into the core
    fn reduce(&self, core: &G::Core, event: &EventOf<G>) -> Result<G::Core, DomainFault>;

    /// Whether an entity referenced by an interaction option still exists.
    /// Used by the generic option refresh before a queued prompt is shown.
    fn entity_is_live(&self, _core: &G::Core, _entity: &EntityRef) -> bool {
        true
    }

    /// Re-derive options for interactions created with an options generator.
    /// `None` falls back to filtering the stored options.
    fn generate_options(
        &self,
        _core: &G::Core,
        _generator: &DefId,
        _interaction: &Interaction,
    ) -> Option<Vec<InteractionOption>> {
        None
    }

    /// Continuation run when a player answers a prompt. The returned events
    /// land between `INTERACTION_RESPONDED` and `INTERACTION_COMPLETED`.
    fn resolve_interaction(
        &self,
        _state: &MatchState<G>,
        _player_id: &PlayerId,
        _interaction: &Interaction,
        _chosen: &[InteractionOption],
        _random: &mut dyn RandomSource,
    ) -> Result<Vec<EventBodyOf<G>>, DomainFault> {
        Ok(Vec::new())
    }
}
