//! Tutorial manifests

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tabula_core::TutorialManifest;

/// `(tutorials: [(id: "intro", steps: [...])])`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TutorialDoc<C> {
    pub tutorials: Vec<TutorialManifest<C>>,
}

/// Step ids must be unique within a manifest; they are what clients and
/// `SYS_TUTORIAL_AI_CONSUMED` refer to.
pub fn validate_manifest<C>(manifest: &TutorialManifest<C>) -> Result<()> {
    if manifest.id.is_empty() {
        return Err(Error::InvalidSchema("tutorial with an empty id".to_string()));
    }
    let mut seen = HashSet::new();
    for step in &manifest.steps {
        if !seen.insert(step.id.as_str()) {
            return Err(Error::DuplicateDefinition(format!(
                "{}/{}",
                manifest.id, step.id
            )));
        }
    }
    Ok(())
}
