//! Document shapes for RON rule files
//!
//! Each file holds one top-level struct naming what it contains, so the
//! loader can tell a category table from a tutorial library by its field.

pub mod category;
pub mod config;
pub mod token;
pub mod tutorial;

pub use category::CategoryDoc;
pub use config::ConfigDoc;
pub use token::TokenDoc;
pub use tutorial::TutorialDoc;
