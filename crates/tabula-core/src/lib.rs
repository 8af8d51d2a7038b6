//! Tabula Core - Deterministic command/event engine for turn-based games
//!
//! This crate provides the engine shared by an authoritative server and
//! predicting clients:
//! - Typed commands and events with engine (`SYS_`) and domain variants
//! - An append-only event stream with monotonic, undo-rewindable ids
//! - The domain plug-in contract (`setup`, `validate`, `execute`, `reduce`)
//! - The command pipeline that gates, executes and folds commands
//! - Systems: interaction queue, undo, tutorial, response windows
//! - Primitives: modifiers, damage calculation, ability constraints
//! - Deterministic randomness and state checksums
//!
//! ## Determinism
//!
//! Given the same state, command and random seed, [`execute_pipeline`]
//! produces the same state and the same events on every machine. Nothing in
//! the pipeline reads a clock or suspends.
//!
//! ```
//! use tabula_core::{Event, EventStream};
//!
//! let mut stream: EventStream<u8> = EventStream::new();
//! let appended = stream.append(vec![Event::domain(1u8, "PING", 0)], 0);
//! assert_eq!(appended[0].id, 0);
//! assert_eq!(stream.next_id(), 1);
//! ```

mod category;
pub mod checksum;
mod command;
mod config;
mod domain;
mod error;
mod event;
mod event_stream;
mod identity;
pub mod pipeline;
pub mod primitives;
mod rng;
mod state;
pub mod systems;
mod value;

#[cfg(test)]
mod test_game;

pub use category::{CategoryTable, CommandCategory};
pub use command::{is_system_command_type, sys_command, Command, CommandBody, CommandKind, SysCommand};
pub use config::{EngineConfig, EventStreamConfig, PipelineLimits, UndoConfig};
pub use domain::{
    codes, CommandOf, DomainCore, EntryOf, EventBodyOf, EventOf, Game, Rejection,
};
pub use error::{DomainFault, Error, Result};
pub use event::{sys_event, Event, EventBody, EventKind, SysEvent};
pub use event_stream::{EventStream, EventStreamEntry};
pub use identity::{DefId, PlayerId};
pub use pipeline::{execute_pipeline, new_match, PipelineConfig, PipelineOutcome};
pub use rng::{shuffle, GameRng, RandomProbe, RandomSource, SequenceRandom};
pub use state::{MatchState, SystemState};
pub use systems::interaction::{
    create_multi_choice, create_simple_choice, queue_interaction, refresh_interaction_options,
    resolve_interaction, EntityRef, Interaction, InteractionKind, InteractionOption,
};
pub use systems::response::PendingDamage;
pub use systems::tutorial::{
    EventMatcher, ScriptedAction, TutorialLibrary, TutorialManifest, TutorialStep,
};
pub use systems::{Gate, System, SystemContext};
pub use value::{Value, ValueMap};
