//! Priority-ordered numeric modifiers

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModifierKind {
    /// Added to the running value
    Flat,
    /// Scales the running value by `1 + value / 100`
    Percent,
}

impl ModifierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModifierKind::Flat => "flat",
            ModifierKind::Percent => "percent",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierDef {
    pub id: String,
    pub kind: ModifierKind,
    pub value: f64,
    /// Lower priorities apply first; ties keep insertion order
    pub priority: i32,
    pub source: String,
    pub description: Option<String>,
}

impl ModifierDef {
    pub fn flat(id: impl Into<String>, value: f64, priority: i32) -> Self {
        let id = id.into();
        Self {
            source: id.clone(),
            id,
            kind: ModifierKind::Flat,
            value,
            priority,
            description: None,
        }
    }

    pub fn percent(id: impl Into<String>, value: f64, priority: i32) -> Self {
        Self {
            kind: ModifierKind::Percent,
            ..Self::flat(id, value, priority)
        }
    }

    pub fn from_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn apply(&self, running: f64) -> f64 {
        match self.kind {
            ModifierKind::Flat => running + self.value,
            ModifierKind::Percent => running * (1.0 + self.value / 100.0),
        }
    }
}

/// An ordered collection of modifiers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModifierStack {
    entries: Vec<ModifierDef>,
}

impl ModifierStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a modifier; an existing modifier with the same id is replaced
    pub fn add(&mut self, modifier: ModifierDef) {
        self.entries.retain(|m| m.id != modifier.id);
        self.entries.push(modifier);
    }

    pub fn remove(&mut self, id: &str) -> Option<ModifierDef> {
        let index = self.entries.iter().position(|m| m.id == id)?;
        Some(self.entries.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<&ModifierDef> {
        self.entries.iter().find(|m| m.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Modifiers in application order
    pub fn ordered(&self) -> Vec<&ModifierDef> {
        let mut ordered: Vec<_> = self.entries.iter().collect();
        ordered.sort_by_key(|m| m.priority);
        ordered
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModifierResult {
    pub final_value: f64,
    /// Ids in the order they were applied
    pub applied_ids: Vec<String>,
}

/// Apply every modifier in priority order to `initial`
pub fn apply_modifiers(stack: &ModifierStack, initial: f64) -> ModifierResult {
    let mut value = initial;
    let mut applied_ids = Vec::with_capacity(stack.len());
    for modifier in stack.ordered() {
        value = modifier.apply(value);
        applied_ids.push(modifier.id.clone());
    }
    ModifierResult {
        final_value: value,
        applied_ids,
    }
}
