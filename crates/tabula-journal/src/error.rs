//! Error types for tabula-journal

use thiserror::Error;

/// Journal error type
#[derive(Debug, Error)]
pub enum Error {
    /// The pipeline faulted while replaying
    #[error(transparent)]
    Core(#[from] tabula_core::Error),

    /// A recorded command was rejected on replay
    #[error("Replay diverged at command {index} ({command_type}): {code}")]
    Diverged {
        index: usize,
        command_type: String,
        code: String,
    },

    /// A reducer disagreed with itself when folding the event stream
    #[error("Reduce fault at event {id}: {message}")]
    ReduceFault { id: u64, message: String },

    /// Folding the event stream did not reproduce the live core
    #[error("Reduce is not pure: folding {events} events produced a different core")]
    ImpureReduce { events: usize },

    /// The stream no longer starts at id 0, so it cannot be folded from setup
    #[error("Event stream is trimmed; first retained id is {0}")]
    TrimmedStream(u64),

    /// Export error
    #[error("Export error: {0}")]
    ExportError(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for journal operations
pub type Result<T> = std::result::Result<T, Error>;
