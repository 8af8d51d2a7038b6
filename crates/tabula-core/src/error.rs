//! Error types for tabula-core
//!
//! Only engine-fatal conditions live here. A command that is merely illegal
//! is not an error: it comes back as a [`Rejection`](crate::Rejection) inside
//! [`PipelineOutcome::Rejected`](crate::PipelineOutcome).

use thiserror::Error;

/// Failure raised by a domain's `execute` or `reduce`.
///
/// The pipeline never swallows this; it propagates to the caller, which owns
/// match-level recovery (for example reloading the last persisted state).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct DomainFault(pub String);

impl DomainFault {
    /// Create a new fault with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Domain fault while processing {command_type}: {fault}")]
    DomainFault {
        command_type: String,
        #[source]
        fault: DomainFault,
    },

    #[error("Follow-up event limit of {limit} exceeded while processing {command_type}")]
    FollowUpLimit { command_type: String, limit: usize },

    #[error("Scripted command depth {depth} exceeds the configured limit")]
    ScriptedDepth { depth: usize },

    #[error("Constraint handler not registered: {0}")]
    UnknownConstraintHandler(String),

    #[error("Custom constraint {0} requires a constraint registry")]
    MissingConstraintRegistry(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    pub(crate) fn domain(command_type: &str, fault: DomainFault) -> Self {
        Error::DomainFault {
            command_type: command_type.to_string(),
            fault,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
