//! Tabula Script - RON rule-set loader
//!
//! Loads the immutable tables a game hands to the engine:
//! - Command category tables
//! - Tutorial manifests with scripted actions and advance matchers
//! - Token and status effect definitions
//! - Engine configuration (undo, event stream retention, pipeline limits)

mod error;
mod loader;
mod schema;

pub use error::{Error, Result};
pub use loader::{Loader, RuleSet};
pub use schema::token::validate_token;
pub use schema::tutorial::validate_manifest;
pub use schema::{CategoryDoc, ConfigDoc, TokenDoc, TutorialDoc};
