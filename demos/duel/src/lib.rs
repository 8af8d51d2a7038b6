//! Duel - a two-player dice duel running on tabula
//!
//! Demonstrates every engine layer with a small rule set:
//!
//! - **Domain**: dice, ward cards, tokens and hp behind [`DuelDomain`]
//! - **Systems**: response windows for incoming damage, discard prompts,
//!   undo and a scripted tutorial
//! - **Rules**: categories, tokens, tutorials and engine limits loaded from
//!   the RON files under `rules/`
//! - **Host**: an in-process authoritative [`MatchHost`] and the loopback
//!   link predicting clients connect through

pub mod domain;
pub mod game;
pub mod server;

pub use domain::DuelDomain;
pub use game::{Card, Duel, DuelCommand, DuelCore, DuelEvent, Fighter};
pub use server::{LinkError, LocalLink, MatchHost};

use std::path::Path;
use std::sync::Arc;
use tabula_core::{PipelineConfig, PlayerId};
use tabula_script::{Loader, RuleSet};

const CATEGORIES: &str = include_str!("../rules/categories.ron");
const TOKENS: &str = include_str!("../rules/tokens.ron");
const TUTORIALS: &str = include_str!("../rules/tutorials.ron");
const ENGINE: &str = include_str!("../rules/engine.ron");

/// The rule set shipped with the crate
pub fn rules() -> tabula_script::Result<RuleSet<DuelCommand>> {
    let mut loader = Loader::new();
    loader.load_categories_str(CATEGORIES)?;
    loader.load_tokens_str(TOKENS)?;
    loader.load_tutorials_str(TUTORIALS)?;
    loader.load_config_str(ENGINE)?;
    Ok(loader.finish())
}

/// A rule set read from a directory of RON files
pub fn rules_from_dir(path: impl AsRef<Path>) -> tabula_script::Result<RuleSet<DuelCommand>> {
    let mut loader = Loader::new();
    loader.load_directory(path)?;
    Ok(loader.finish())
}

/// Wire a rule set into a pipeline with the standard systems
pub fn pipeline_from(rules: RuleSet<DuelCommand>) -> Arc<PipelineConfig<Duel>> {
    let domain = DuelDomain::new(rules.tokens.clone());
    Arc::new(rules.into_pipeline(domain))
}

/// Pipeline over the shipped rule set
pub fn pipeline() -> tabula_script::Result<Arc<PipelineConfig<Duel>>> {
    rules().map(pipeline_from)
}

pub fn seats() -> Vec<PlayerId> {
    vec![PlayerId::from("0"), PlayerId::from("1")]
}
