//! Engine configuration

use serde::{Deserialize, Serialize};
use tabula_core::EngineConfig;

/// `(engine: (undo: (max_snapshots: 20)))`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigDoc {
    #[serde(default)]
    pub engine: EngineConfig,
}
