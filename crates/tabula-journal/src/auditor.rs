//! Auditing and analytics for match event streams

use indexmap::IndexMap;
use tabula_core::{EventKind, EventStream, EventStreamEntry, SysEvent};

/// Auditor for querying and analyzing an event stream
pub struct Auditor<'a, E> {
    stream: &'a EventStream<E>,
}

impl<'a, E: EventKind> Auditor<'a, E> {
    /// Create a new auditor for a stream
    pub fn new(stream: &'a EventStream<E>) -> Self {
        Self { stream }
    }

    /// Generate a comprehensive audit report
    pub fn generate_report(&self) -> AuditReport {
        let mut event_counts: IndexMap<String, u64> = IndexMap::new();
        let mut commands_by_type: IndexMap<String, u64> = IndexMap::new();
        let mut system_events = 0;

        for entry in self.stream.entries() {
            *event_counts
                .entry(entry.event.event_type().to_string())
                .or_insert(0) += 1;
            *commands_by_type
                .entry(entry.event.source_command_type.clone())
                .or_insert(0) += 1;
            if entry.event.as_system().is_some() {
                system_events += 1;
            }
        }

        let entries = self.stream.entries();
        AuditReport {
            total_events: entries.len(),
            system_events,
            first_id: entries.first().map(|e| e.id),
            last_id: entries.last().map(|e| e.id),
            next_id: self.stream.next_id(),
            event_counts,
            commands_by_type,
            completion: self.completion_audit(),
        }
    }

    /// Query entries matching specific criteria
    pub fn query(&self, query: &AuditQuery) -> Vec<&'a EventStreamEntry<E>> {
        self.stream
            .entries()
            .iter()
            .filter(|entry| query.matches(entry))
            .collect()
    }

    /// Events produced while processing one command type
    pub fn command_summary(&self, command_type: &str) -> EventSummary {
        let mut total = 0;
        let mut by_type: IndexMap<String, u64> = IndexMap::new();

        for entry in self.stream.entries() {
            if entry.event.source_command_type == command_type {
                total += 1;
                *by_type
                    .entry(entry.event.event_type().to_string())
                    .or_insert(0) += 1;
            }
        }

        EventSummary { total, by_type }
    }

    /// Count occurrences of a specific event type
    pub fn count_event(&self, event_type: &str) -> u64 {
        self.stream
            .entries()
            .iter()
            .filter(|entry| entry.event.event_type() == event_type)
            .count() as u64
    }

    /// Get all unique event types, sorted
    pub fn unique_events(&self) -> Vec<String> {
        let mut events: Vec<String> = self
            .stream
            .entries()
            .iter()
            .map(|entry| entry.event.event_type().to_string())
            .collect();
        events.sort();
        events.dedup();
        events
    }

    /// Prompts, response windows and scripted AI turns opened but never finished
    pub fn completion_audit(&self) -> CompletionAudit {
        let mut audit = CompletionAudit::default();
        for entry in self.stream.entries() {
            match entry.event.as_system() {
                Some(SysEvent::InteractionRequested { interaction }) => {
                    audit.open_interactions.push(interaction.id.clone());
                }
                Some(SysEvent::InteractionCompleted { interaction_id }) => {
                    audit.open_interactions.retain(|id| id != interaction_id);
                }
                Some(SysEvent::TokenResponseRequested { pending_damage, .. }) => {
                    audit.open_response_windows.push(pending_damage.id.clone());
                }
                Some(SysEvent::TokenResponseClosed {
                    pending_damage_id, ..
                }) => {
                    audit
                        .open_response_windows
                        .retain(|id| id != pending_damage_id);
                }
                Some(SysEvent::TutorialAiPlayed { step_id }) => {
                    audit.unconsumed_ai_steps.push(step_id.clone());
                }
                Some(SysEvent::TutorialAiConsumed { step_id }) => {
                    audit.unconsumed_ai_steps.retain(|id| id != step_id);
                }
                _ => {}
            }
        }
        audit
    }
}

/// Things left open at the end of a stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionAudit {
    pub open_interactions: Vec<String>,
    /// Pending damage ids
    pub open_response_windows: Vec<String>,
    pub unconsumed_ai_steps: Vec<String>,
}

impl CompletionAudit {
    pub fn is_complete(&self) -> bool {
        self.open_interactions.is_empty()
            && self.open_response_windows.is_empty()
            && self.unconsumed_ai_steps.is_empty()
    }
}

/// A comprehensive audit report
#[derive(Debug, Clone)]
pub struct AuditReport {
    /// Entries currently held
    pub total_events: usize,
    /// Entries emitted by systems rather than the domain
    pub system_events: usize,
    pub first_id: Option<u64>,
    pub last_id: Option<u64>,
    pub next_id: u64,
    /// Count of each event type, in first-seen order
    pub event_counts: IndexMap<String, u64>,
    /// Events grouped by the command that produced them
    pub commands_by_type: IndexMap<String, u64>,
    pub completion: CompletionAudit,
}

impl std::fmt::Display for AuditReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Audit Report ===")?;
        writeln!(f, "Total events: {}", self.total_events)?;
        writeln!(f, "System events: {}", self.system_events)?;
        writeln!(f, "Next id: {}", self.next_id)?;

        if let (Some(first), Some(last)) = (self.first_id, self.last_id) {
            writeln!(f, "Id range: {} - {}", first, last)?;
        }

        if !self.event_counts.is_empty() {
            writeln!(f, "\nEvents by type:")?;
            let mut sorted: Vec<_> = self.event_counts.iter().collect();
            sorted.sort_by_key(|(_, count)| std::cmp::Reverse(*count));
            for (event, count) in sorted {
                writeln!(f, "  {}: {}", event, count)?;
            }
        }

        if !self.commands_by_type.is_empty() {
            writeln!(f, "\nEvents by command:")?;
            for (cmd, count) in &self.commands_by_type {
                writeln!(f, "  {}: {}", cmd, count)?;
            }
        }

        if !self.completion.is_complete() {
            writeln!(f, "\nIncomplete:")?;
            for id in &self.completion.open_interactions {
                writeln!(f, "  interaction {}", id)?;
            }
            for id in &self.completion.open_response_windows {
                writeln!(f, "  response window {}", id)?;
            }
            for id in &self.completion.unconsumed_ai_steps {
                writeln!(f, "  tutorial ai step {}", id)?;
            }
        }

        Ok(())
    }
}

/// Query criteria for filtering stream entries
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    /// First id (inclusive)
    pub start_id: Option<u64>,
    /// Last id (inclusive)
    pub end_id: Option<u64>,
    /// Filter by event type
    pub event_type: Option<String>,
    /// Filter by the command that produced the event
    pub command_type: Option<String>,
    /// Only engine events
    pub system_only: bool,
}

impl AuditQuery {
    /// Create a new empty query
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by id range
    pub fn in_range(mut self, start: u64, end: u64) -> Self {
        self.start_id = Some(start);
        self.end_id = Some(end);
        self
    }

    /// Filter by event type
    pub fn by_event(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Filter by source command
    pub fn by_command(mut self, command_type: impl Into<String>) -> Self {
        self.command_type = Some(command_type.into());
        self
    }

    pub fn system_only(mut self) -> Self {
        self.system_only = true;
        self
    }

    fn matches<E: EventKind>(&self, entry: &EventStreamEntry<E>) -> bool {
        if self.start_id.is_some_and(|start| entry.id < start) {
            return false;
        }
        if self.end_id.is_some_and(|end| entry.id > end) {
            return false;
        }
        if let Some(ref event_type) = self.event_type {
            if entry.event.event_type() != event_type {
                return false;
            }
        }
        if let Some(ref command_type) = self.command_type {
            if &entry.event.source_command_type != command_type {
                return false;
            }
        }
        !self.system_only || entry.event.as_system().is_some()
    }
}

/// Summary of events for one command type
#[derive(Debug, Clone)]
pub struct EventSummary {
    /// Total number of events
    pub total: u64,
    /// Events grouped by type
    pub by_type: IndexMap<String, u64>,
}
