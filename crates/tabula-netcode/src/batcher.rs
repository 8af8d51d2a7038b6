//! Client command batching
//!
//! Coalesces rapid local commands into a single network send. The batcher
//! is clock-agnostic: callers pass the current time in milliseconds to
//! [`CommandBatcher::enqueue`] and [`CommandBatcher::poll`].

use serde::{Deserialize, Serialize};
use tabula_core::{Command, CommandKind};
use tracing::trace;

/// Batching knobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatcherConfig {
    /// Sliding window in milliseconds; 0 sends every command at once
    pub window_ms: u64,
    /// Flush as soon as this many commands are queued
    pub max_batch_size: usize,
    /// Command types that flush the queue immediately
    pub immediate_commands: Vec<String>,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            window_ms: 16,
            max_batch_size: 8,
            immediate_commands: Vec::new(),
        }
    }
}

impl BatcherConfig {
    pub fn with_window(mut self, window_ms: u64) -> Self {
        self.window_ms = window_ms;
        self
    }

    pub fn with_immediate(mut self, command_type: impl Into<String>) -> Self {
        self.immediate_commands.push(command_type.into());
        self
    }
}

/// Queue of commands waiting for their window to close
#[derive(Debug)]
pub struct CommandBatcher<C> {
    config: BatcherConfig,
    queue: Vec<Command<C>>,
    deadline: Option<u64>,
    destroyed: bool,
}

impl<C: CommandKind> CommandBatcher<C> {
    pub fn new(config: BatcherConfig) -> Self {
        Self {
            config,
            queue: Vec::new(),
            deadline: None,
            destroyed: false,
        }
    }

    /// Queue a command, returning a batch if one should be sent now
    pub fn enqueue(&mut self, command: Command<C>, now: u64) -> Vec<Command<C>> {
        if self.destroyed {
            return Vec::new();
        }
        if self.config.window_ms == 0 {
            return vec![command];
        }

        let immediate = self
            .config
            .immediate_commands
            .iter()
            .any(|t| t == command.command_type());
        self.queue.push(command);

        if immediate || self.queue.len() >= self.config.max_batch_size {
            return self.flush();
        }
        // Each new command pushes the deadline out again.
        self.deadline = Some(now + self.config.window_ms);
        Vec::new()
    }

    /// Flush if the window has elapsed
    pub fn poll(&mut self, now: u64) -> Vec<Command<C>> {
        match self.deadline {
            Some(deadline) if now >= deadline => self.flush(),
            _ => Vec::new(),
        }
    }

    /// Send everything queued, in enqueue order
    pub fn flush(&mut self) -> Vec<Command<C>> {
        self.deadline = None;
        let batch = std::mem::take(&mut self.queue);
        if !batch.is_empty() {
            trace!(size = batch.len(), "flushing command batch");
        }
        batch
    }

    /// Drop the queue and ignore every later call
    pub fn destroy(&mut self) {
        self.queue.clear();
        self.deadline = None;
        self.destroyed = true;
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// When the pending window closes, if one is open
    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_game::CounterCommand;

    fn inc(n: i64) -> Command<CounterCommand> {
        Command::domain("0", CounterCommand::Inc(n))
    }

    fn values(batch: &[Command<CounterCommand>]) -> Vec<i64> {
        batch
            .iter()
            .filter_map(|c| match c.as_domain() {
                Some(CounterCommand::Inc(n)) => Some(*n),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_zero_window_sends_immediately() {
        let mut batcher = CommandBatcher::new(BatcherConfig::default().with_window(0));
        assert_eq!(values(&batcher.enqueue(inc(1), 0)), vec![1]);
        assert!(batcher.is_empty());
    }

    #[test]
    fn test_sliding_window() {
        let mut batcher = CommandBatcher::new(BatcherConfig::default().with_window(10));
        assert!(batcher.enqueue(inc(1), 0).is_empty());
        assert!(batcher.enqueue(inc(2), 8).is_empty());
        // the second command moved the deadline to 18
        assert!(batcher.poll(12).is_empty());
        assert_eq!(values(&batcher.poll(18)), vec![1, 2]);
        assert!(batcher.poll(40).is_empty());
    }

    #[test]
    fn test_max_batch_size_flushes() {
        let config = BatcherConfig {
            window_ms: 100,
            max_batch_size: 3,
            immediate_commands: Vec::new(),
        };
        let mut batcher = CommandBatcher::new(config);
        batcher.enqueue(inc(1), 0);
        batcher.enqueue(inc(2), 0);
        assert_eq!(values(&batcher.enqueue(inc(3), 0)), vec![1, 2, 3]);
        assert_eq!(batcher.deadline(), None);
    }

    #[test]
    fn test_immediate_command_flushes_queue() {
        let mut batcher =
            CommandBatcher::new(BatcherConfig::default().with_window(50).with_immediate("ROLL"));
        batcher.enqueue(inc(1), 0);
        let batch = batcher.enqueue(Command::domain("0", CounterCommand::Roll), 1);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1].command_type(), "ROLL");
    }

    #[test]
    fn test_destroy() {
        let mut batcher = CommandBatcher::new(BatcherConfig::default());
        batcher.enqueue(inc(1), 0);
        batcher.destroy();
        assert!(batcher.is_destroyed());
        assert!(batcher.is_empty());
        assert!(batcher.enqueue(inc(2), 0).is_empty());
        assert!(batcher.poll(1_000).is_empty());
    }

    #[test]
    fn test_config_from_ron() {
        let config: BatcherConfig =
            ron::from_str(r#"(window_ms: 0, immediate_commands: ["END_TURN"])"#).unwrap();
        assert_eq!(config.window_ms, 0);
        assert_eq!(config.max_batch_size, 8);
        assert_eq!(config.immediate_commands, vec!["END_TURN".to_string()]);
    }
}
