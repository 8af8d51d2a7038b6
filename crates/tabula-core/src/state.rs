//! Match state: a domain-owned core next to engine-owned system state

use crate::domain::Game;
use crate::event_stream::EventStream;
use crate::systems::interaction::{Interaction, InteractionState};
use crate::systems::response::ResponseWindowState;
use crate::systems::tutorial::TutorialState;
use crate::systems::undo::UndoState;
use serde::{Deserialize, Serialize};

/// Everything a match is. Never mutated in place by callers; every pipeline
/// call returns a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct MatchState<G: Game> {
    pub core: G::Core,
    pub sys: SystemState<G>,
}

impl<G: Game> MatchState<G> {
    /// Wrap a freshly set-up core with empty system state
    pub fn new(core: G::Core) -> Self {
        Self {
            core,
            sys: SystemState::default(),
        }
    }

    pub fn event_stream(&self) -> &EventStream<G::Event> {
        &self.sys.event_stream
    }

    /// The prompt currently shown to a player, if any
    pub fn current_interaction(&self) -> Option<&Interaction> {
        self.sys.interaction.current.as_ref()
    }

    pub fn is_response_window_open(&self) -> bool {
        self.sys.response.is_open
    }

    /// Copy of this state with the event history removed, as sent in a
    /// `state:sync` message
    pub fn stripped(&self) -> Self {
        let mut state = self.clone();
        state.sys.event_stream.strip();
        state
    }
}

/// Engine-owned sub-states, one per system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct SystemState<G: Game> {
    pub event_stream: EventStream<G::Event>,
    pub undo: UndoState<G>,
    pub interaction: InteractionState,
    pub tutorial: TutorialState,
    pub response: ResponseWindowState,
}

impl<G: Game> Default for SystemState<G> {
    fn default() -> Self {
        Self {
            event_stream: EventStream::default(),
            undo: UndoState::default(),
            interaction: InteractionState::default(),
            tutorial: TutorialState::default(),
            response: ResponseWindowState::default(),
        }
    }
}
