//! Transport seam for a client session
//!
//! The session never opens sockets. Users implement [`MatchTransport`] over
//! whatever stack they run (WebSocket, in-process channel, test double).

use serde::{Deserialize, Serialize};
use tabula_core::{CommandOf, Game, MatchState};

/// Authoritative updates pushed by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub enum ServerMessage<G: Game> {
    /// State after one or more accepted commands
    State { state: MatchState<G> },
    /// Full resync; the event stream arrives stripped
    Sync { state: MatchState<G> },
}

impl<G: Game> ServerMessage<G> {
    pub fn state(&self) -> &MatchState<G> {
        match self {
            ServerMessage::State { state } | ServerMessage::Sync { state } => state,
        }
    }
}

/// Bidirectional match channel
pub trait MatchTransport<G: Game> {
    /// Error type for this transport
    type Error: std::error::Error + Send + Sync + 'static;

    /// Send a batch of commands, in order
    fn send_commands(&mut self, commands: Vec<CommandOf<G>>) -> Result<(), Self::Error>;

    /// Receive the next server message (non-blocking)
    ///
    /// Returns `Ok(None)` if nothing is waiting.
    fn poll(&mut self) -> Result<Option<ServerMessage<G>>, Self::Error>;
}
