//! Engine Configuration - undo, event stream and pipeline limits
//!
//! A single [`EngineConfig`] value is built at start-up (usually loaded from
//! RON) and shared by every match that uses the same rule set.

use serde::{Deserialize, Serialize};

/// Top-level engine configuration
///
/// # Example
///
/// ```
/// use tabula_core::EngineConfig;
///
/// let config = EngineConfig::default();
/// assert!(config.undo.enabled);
/// assert_eq!(config.undo.max_snapshots, 50);
/// assert_eq!(config.event_stream.max_entries, 0);
///
/// let config = EngineConfig::default().without_undo();
/// assert!(!config.undo.enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub undo: UndoConfig,
    pub event_stream: EventStreamConfig,
    pub pipeline: PipelineLimits,
}

impl EngineConfig {
    /// Disable undo snapshots entirely
    pub fn without_undo(mut self) -> Self {
        self.undo.enabled = false;
        self
    }

    /// Cap the number of undo snapshots kept per match
    pub fn with_max_snapshots(mut self, max: usize) -> Self {
        self.undo.max_snapshots = max;
        self
    }

    /// Cap the number of entries kept in the event stream (0 = unlimited)
    pub fn with_max_stream_entries(mut self, max: usize) -> Self {
        self.event_stream.max_entries = max;
        self
    }
}

/// Undo snapshot settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UndoConfig {
    pub enabled: bool,
    /// Oldest snapshots are evicted once this many are held
    pub max_snapshots: usize,
    /// Command types that never take a snapshot
    pub skip_commands: Vec<String>,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_snapshots: 50,
            skip_commands: Vec::new(),
        }
    }
}

/// Event stream retention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EventStreamConfig {
    /// 0 keeps every entry
    pub max_entries: usize,
}

/// Bounds on follow-up work the pipeline performs for a single command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineLimits {
    /// How deep scripted commands may nest (tutorial AI actions)
    pub max_scripted_depth: usize,
    /// Maximum number of system follow-up events per command
    pub max_follow_up_events: usize,
}

impl Default for PipelineLimits {
    fn default() -> Self {
        Self {
            max_scripted_depth: 8,
            max_follow_up_events: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.undo.enabled);
        assert_eq!(config.undo.max_snapshots, 50);
        assert_eq!(config.pipeline.max_scripted_depth, 8);
        assert_eq!(config.pipeline.max_follow_up_events, 256);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config: EngineConfig = ron::from_str("(undo: (max_snapshots: 3))").unwrap();
        assert_eq!(config.undo.max_snapshots, 3);
        assert!(config.undo.enabled);
        assert_eq!(config.pipeline, PipelineLimits::default());
    }

    #[test]
    fn test_builders() {
        let config = EngineConfig::default()
            .with_max_snapshots(2)
            .with_max_stream_entries(100);
        assert_eq!(config.undo.max_snapshots, 2);
        assert_eq!(config.event_stream.max_entries, 100);
    }
}
