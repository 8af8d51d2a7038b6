//! Command categories
//!
//! Categories let systems restrict commands by role rather than by listing
//! every command type. Any `SYS_` command resolves to
//! [`CommandCategory::System`] without registration.

use crate::command::is_system_command_type;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandCategory {
    /// Engine commands (undo, interaction answers, tutorial control)
    System,
    /// Ends or advances phases and turns
    PhaseControl,
    /// Main-phase decisions: playing cards, buying, attacking
    Strategic,
    /// Reactive plays such as spending a token or an instant
    Tactical,
    /// Prompt answers and other UI-driven choices
    UiInteraction,
    /// Bookkeeping that does not advance the game
    StateManagement,
}

impl CommandCategory {
    /// Categories that remain legal while a response window is open
    pub const RESPONSE_WINDOW: [CommandCategory; 4] = [
        CommandCategory::System,
        CommandCategory::Tactical,
        CommandCategory::UiInteraction,
        CommandCategory::StateManagement,
    ];
}

/// Immutable lookup from command type to category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryTable {
    entries: IndexMap<String, CommandCategory>,
}

impl CategoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command type
    pub fn with(mut self, command_type: impl Into<String>, category: CommandCategory) -> Self {
        self.entries.insert(command_type.into(), category);
        self
    }

    /// Category of a command type; `SYS_` types are always `System`
    pub fn category_of(&self, command_type: &str) -> Option<CommandCategory> {
        if is_system_command_type(command_type) {
            return Some(CommandCategory::System);
        }
        self.entries.get(command_type).copied()
    }

    pub fn is_in(&self, command_type: &str, category: CommandCategory) -> bool {
        self.category_of(command_type) == Some(category)
    }

    pub fn is_in_any(&self, command_type: &str, categories: &[CommandCategory]) -> bool {
        self.category_of(command_type)
            .is_some_and(|c| categories.contains(&c))
    }

    /// Registered command types in a category, in registration order
    pub fn commands_in(&self, category: CommandCategory) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, c)| **c == category)
            .map(|(t, _)| t.as_str())
            .collect()
    }

    /// Whether a command may run while a response window is open
    pub fn allowed_in_response_window(&self, command_type: &str) -> bool {
        self.is_in_any(command_type, &CommandCategory::RESPONSE_WINDOW)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> CategoryTable {
        CategoryTable::new()
            .with("END_PHASE", CommandCategory::PhaseControl)
            .with("PLAY_CARD", CommandCategory::Strategic)
            .with("USE_TOKEN", CommandCategory::Tactical)
            .with("SKIP_TOKEN", CommandCategory::Tactical)
    }

    #[test]
    fn test_sys_prefix_resolves_to_system() {
        let table = table();
        assert_eq!(table.category_of("SYS_UNDO"), Some(CommandCategory::System));
        assert_eq!(
            table.category_of("SYS_SOMETHING_NEW"),
            Some(CommandCategory::System)
        );
        assert_eq!(table.category_of("UNKNOWN"), None);
    }

    #[test]
    fn test_response_window_categories() {
        let table = table();
        assert!(table.allowed_in_response_window("USE_TOKEN"));
        assert!(table.allowed_in_response_window("SYS_INTERACTION_RESPOND"));
        assert!(!table.allowed_in_response_window("END_PHASE"));
        assert!(!table.allowed_in_response_window("PLAY_CARD"));
        assert!(!table.allowed_in_response_window("UNKNOWN"));
    }

    #[test]
    fn test_commands_in_preserves_order() {
        let table = table();
        assert_eq!(
            table.commands_in(CommandCategory::Tactical),
            vec!["USE_TOKEN", "SKIP_TOKEN"]
        );
        assert!(table.is_in("PLAY_CARD", CommandCategory::Strategic));
    }
}
