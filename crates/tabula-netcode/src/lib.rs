//! Tabula Netcode - client-side prediction for turn-based matches
//!
//! This crate provides the client half of a tabula match:
//!
//! - **Prediction**: run the shared pipeline locally before the server answers
//! - **Reconciliation**: keep confirmed predictions, replay or discard the rest
//! - **Cursors**: hand UI code exactly the events it has not seen yet
//! - **Batching**: coalesce rapid commands into one send
//! - **Local interactions**: multi-step choices that commit as one command
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       ClientSession                          │
//! │  ┌──────────────┐  ┌──────────────────┐  ┌───────────────┐  │
//! │  │   Batcher    │◀─│ OptimisticEngine │─▶│  Render state │  │
//! │  └──────────────┘  └──────────────────┘  └───────────────┘  │
//! │         │                  ▲                     │           │
//! │         ▼                  │                     ▼           │
//! │  ┌──────────────┐  ┌──────────────────┐  ┌───────────────┐  │
//! │  │  Transport   │─▶│  RollbackSignal  │─▶│    Cursor     │  │
//! │  └──────────────┘  └──────────────────┘  └───────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use tabula_netcode::{BatcherConfig, ClientSession, EventStreamCursor, OptimisticEngine};
//!
//! let engine = OptimisticEngine::new(pipeline, OptimisticConfig::default())
//!     .with_player_ids(player_ids);
//! let mut session = ClientSession::new(engine, BatcherConfig::default(), transport);
//! let mut cursor = EventStreamCursor::new(session.signal(), session.reconnect_token());
//!
//! loop {
//!     if let Some(command) = next_click() {
//!         session.submit(command, now_ms())?;
//!     }
//!     session.tick(now_ms())?;
//!
//!     if let Some(state) = session.state() {
//!         let fresh = cursor.consume_new(state.event_stream(), session.signal(), session.reconnect_token());
//!         animate(fresh.entries);
//!         render(state);
//!     }
//! }
//! ```

mod batcher;
mod cursor;
mod error;
mod local_interaction;
mod optimistic;
mod session;
mod transport;

#[cfg(test)]
mod test_game;

pub use batcher::{BatcherConfig, CommandBatcher};
pub use cursor::{ConsumeResult, EventStreamCursor, RollbackSignal};
pub use error::{Error, Result};
pub use local_interaction::{
    LocalCommit, LocalInteraction, LocalInteractionManager, LocalReducer, LocalStep,
};
pub use optimistic::{
    apply_animation_mode, compare_played, filter_played_events, max_event_id, AnimationMode,
    Determinism, EnginePhase, OptimisticConfig, OptimisticEngine, PendingCommand, Prediction,
    ReconcileOutcome, StreamChange,
};
pub use session::ClientSession;
pub use transport::{MatchTransport, ServerMessage};
