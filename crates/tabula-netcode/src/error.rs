//! Error types for tabula-netcode

use thiserror::Error;

/// Netcode error type
#[derive(Debug, Error)]
pub enum Error {
    /// A pipeline run failed with an engine fault
    #[error(transparent)]
    Core(#[from] tabula_core::Error),

    /// No local interaction is in progress
    #[error("No local interaction is active")]
    NoLocalInteraction,

    /// A local interaction was started without a registered reducer
    #[error("No local interaction registered for {0}")]
    UnknownLocalInteraction(String),

    /// A local reducer refused a step; the interaction was cancelled
    #[error("Local step {step} failed: {message}")]
    LocalStepFailed { step: String, message: String },

    /// The session was closed and takes no more commands
    #[error("Session is closed")]
    Closed,

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Result type for netcode operations
pub type Result<T> = std::result::Result<T, Error>;
