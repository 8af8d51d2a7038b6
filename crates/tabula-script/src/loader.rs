//! RON rule-set loader

use crate::error::{Error, Result};
use crate::schema::token::validate_token;
use crate::schema::tutorial::validate_manifest;
use crate::schema::{CategoryDoc, ConfigDoc, TokenDoc, TutorialDoc};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tabula_core::primitives::{TokenDefinition, TokenTable};
use tabula_core::{
    CategoryTable, CommandCategory, DomainCore, EngineConfig, Game, PipelineConfig,
    TutorialLibrary, TutorialManifest,
};
use tracing::debug;

/// Immutable rule tables for one game, built once at start-up
#[derive(Debug, Clone)]
pub struct RuleSet<C> {
    pub categories: CategoryTable,
    pub tutorials: TutorialLibrary<C>,
    pub tokens: TokenTable,
    pub config: EngineConfig,
}

impl<C> Default for RuleSet<C> {
    fn default() -> Self {
        Self {
            categories: CategoryTable::default(),
            tutorials: TutorialLibrary::default(),
            tokens: TokenTable::default(),
            config: EngineConfig::default(),
        }
    }
}

impl<C> RuleSet<C> {
    /// Get a token definition
    pub fn get_token(&self, id: &str) -> Option<&TokenDefinition> {
        self.tokens.get(id)
    }

    /// Get a tutorial manifest
    pub fn get_tutorial(&self, id: &str) -> Option<&TutorialManifest<C>> {
        self.tutorials.get(id)
    }

    /// A pipeline with the standard systems wired to these tables
    pub fn into_pipeline<G>(self, domain: impl DomainCore<G> + 'static) -> PipelineConfig<G>
    where
        G: Game<Command = C>,
    {
        PipelineConfig::new(domain)
            .with_default_systems(Arc::new(self.tutorials))
            .with_categories(self.categories)
            .with_config(self.config)
    }
}

/// Loader for RON rule files
pub struct Loader<C> {
    rules: RuleSet<C>,
    config_loaded: bool,
}

impl<C: DeserializeOwned> Loader<C> {
    /// Create a new loader
    pub fn new() -> Self {
        Self {
            rules: RuleSet::default(),
            config_loaded: false,
        }
    }

    /// Load a single RON file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        debug!(file = %path.display(), "loading rule file");

        if filename.contains("categor") || content.contains("categories:") {
            self.load_categories_str(&content)
        } else if filename.contains("tutorial") || content.contains("tutorials:") {
            self.load_tutorials_str(&content)
        } else if filename.contains("token") || content.contains("tokens:") {
            self.load_tokens_str(&content)
        } else if filename.contains("engine") || content.contains("engine:") {
            self.load_config_str(&content)
        } else {
            Err(Error::InvalidSchema(format!(
                "cannot tell what {} contains",
                path.display()
            )))
        }
    }

    /// Load a category table from a RON string
    pub fn load_categories_str(&mut self, content: &str) -> Result<()> {
        let doc: CategoryDoc = ron::from_str(content)?;
        for (command_type, category) in doc.categories {
            self.add_category(command_type, category)?;
        }
        Ok(())
    }

    /// Load tutorial manifests from a RON string
    pub fn load_tutorials_str(&mut self, content: &str) -> Result<()> {
        let doc: TutorialDoc<C> = ron::from_str(content)?;
        for manifest in doc.tutorials {
            validate_manifest(&manifest)?;
            if self.rules.tutorials.contains_key(&manifest.id) {
                return Err(Error::DuplicateDefinition(manifest.id));
            }
            self.rules.tutorials.insert(manifest.id.clone(), manifest);
        }
        Ok(())
    }

    /// Load token definitions from a RON string
    pub fn load_tokens_str(&mut self, content: &str) -> Result<()> {
        let doc: TokenDoc = ron::from_str(content)?;
        for token in doc.tokens {
            validate_token(&token)?;
            if self.rules.tokens.contains_key(&token.id) {
                return Err(Error::DuplicateDefinition(token.id));
            }
            self.rules.tokens.insert(token.id.clone(), token);
        }
        Ok(())
    }

    /// Load the engine configuration from a RON string
    pub fn load_config_str(&mut self, content: &str) -> Result<()> {
        if self.config_loaded {
            return Err(Error::DuplicateDefinition("engine".to_string()));
        }
        let doc: ConfigDoc = ron::from_str(content)?;
        self.rules.config = doc.engine;
        self.config_loaded = true;
        Ok(())
    }

    /// Load all RON files from a directory, in file name order
    pub fn load_directory(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if !path.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Not a directory: {:?}", path),
            )));
        }

        let mut paths = fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        paths.sort();

        for file_path in paths {
            if file_path.extension().is_some_and(|e| e == "ron") {
                self.load_file(&file_path)?;
            } else if file_path.is_dir() {
                self.load_directory(&file_path)?;
            }
        }

        Ok(())
    }

    /// Finish loading and return the rule set
    pub fn finish(self) -> RuleSet<C> {
        self.rules
    }

    /// Get the current tables (for inspection during loading)
    pub fn rules(&self) -> &RuleSet<C> {
        &self.rules
    }

    fn add_category(&mut self, command_type: String, category: CommandCategory) -> Result<()> {
        if self.rules.categories.category_of(&command_type).is_some() {
            return Err(Error::DuplicateDefinition(command_type));
        }
        let categories = std::mem::take(&mut self.rules.categories);
        self.rules.categories = categories.with(command_type, category);
        Ok(())
    }
}

impl<C: DeserializeOwned> Default for Loader<C> {
    fn default() -> Self {
        Self::new()
    }
}
