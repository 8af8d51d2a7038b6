//! Token and status effect definitions

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tabula_core::primitives::TokenDefinition;

/// `(tokens: [(id: "evasive", name: "Evasive", evades: true)])`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenDoc {
    pub tokens: Vec<TokenDefinition>,
}

/// Reject definitions that could never be used
pub fn validate_token(token: &TokenDefinition) -> Result<()> {
    if token.id.is_empty() {
        return Err(Error::InvalidSchema(format!(
            "token '{}' has an empty id",
            token.name
        )));
    }
    if token.evades && token.response_modifier.is_some() {
        return Err(Error::InvalidSchema(format!(
            "token '{}' both evades and modifies damage",
            token.id
        )));
    }
    Ok(())
}
