//! Command category tables

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tabula_core::CommandCategory;

/// `(categories: { "ROLL_DICE": Strategic, "END_TURN": PhaseControl })`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryDoc {
    pub categories: IndexMap<String, CommandCategory>,
}
