//! Export recorded matches to various formats

use crate::log::MatchLog;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use tabula_core::{CommandOf, EntryOf, Game, MatchState, PlayerId};

/// Export format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// RON format (Rust Object Notation)
    Ron,
    /// JSON format (requires serde_json feature)
    Json,
    /// Human-readable text format
    Text,
}

/// Exporter for a match log and, optionally, the state it produced
pub struct Exporter<'a, G: Game> {
    log: &'a MatchLog<G>,
    state: Option<&'a MatchState<G>>,
}

impl<'a, G: Game> Exporter<'a, G> {
    /// Create a new exporter
    pub fn new(log: &'a MatchLog<G>) -> Self {
        Self { log, state: None }
    }

    /// Include the event stream of `state`
    pub fn with_state(mut self, state: &'a MatchState<G>) -> Self {
        self.state = Some(state);
        self
    }

    /// Export to a string in the specified format
    pub fn export(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Ron => self.to_ron(),
            ExportFormat::Json => self.to_json(),
            ExportFormat::Text => Ok(self.to_text()),
        }
    }

    /// Export to a writer
    pub fn export_to<W: Write>(&self, writer: &mut W, format: ExportFormat) -> Result<()> {
        let content = self.export(format)?;
        writer.write_all(content.as_bytes())?;
        Ok(())
    }

    /// Export to RON format
    pub fn to_ron(&self) -> Result<String> {
        let export = self.export_data(Utc::now());
        ron::ser::to_string_pretty(&export, ron::ser::PrettyConfig::default())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Export to JSON format
    #[cfg(feature = "serde_json")]
    pub fn to_json(&self) -> Result<String> {
        let export = self.export_data(Utc::now());
        serde_json::to_string_pretty(&export).map_err(|e| Error::Serialization(e.to_string()))
    }

    #[cfg(not(feature = "serde_json"))]
    pub fn to_json(&self) -> Result<String> {
        Err(Error::ExportError(
            "JSON export requires the 'serde_json' feature".to_string(),
        ))
    }

    /// Export to human-readable text format
    pub fn to_text(&self) -> String {
        let mut output = String::new();

        output.push_str("=== Match Export ===\n\n");
        output.push_str(&format!("Seed: {}\n", self.log.seed));
        let players: Vec<&str> = self.log.player_ids.iter().map(PlayerId::as_str).collect();
        output.push_str(&format!("Players: {}\n", players.join(", ")));
        if let Some(started) = self.log.started_at {
            output.push_str(&format!("Started: {}\n", started.to_rfc3339()));
        }
        output.push_str(&format!("Commands: {}\n", self.log.len()));

        output.push_str("\n=== Commands ===\n\n");
        for (index, command) in self.log.commands.iter().enumerate() {
            output.push_str(&format!(
                "  #{} {} by {} at {}\n",
                index,
                command.command_type(),
                command.player_id.as_str(),
                command.timestamp
            ));
        }

        if let Some(state) = self.state {
            output.push_str("\n=== Events ===\n\n");
            for entry in state.event_stream().entries() {
                output.push_str(&format!(
                    "  [{}] {} <- {}\n",
                    entry.id,
                    entry.event.event_type(),
                    entry.event.source_command_type
                ));
            }
        }

        output
    }

    fn export_data(&self, exported_at: DateTime<Utc>) -> ExportData<'_, G> {
        ExportData {
            version: 1,
            exported_at,
            seed: self.log.seed,
            player_ids: &self.log.player_ids,
            started_at: self.log.started_at,
            commands: &self.log.commands,
            events: self.state.map(|s| s.event_stream().entries()),
        }
    }
}

/// Data structure for full match export
#[derive(Serialize)]
#[serde(bound = "")]
struct ExportData<'a, G: Game> {
    version: u32,
    exported_at: DateTime<Utc>,
    seed: u64,
    player_ids: &'a [PlayerId],
    started_at: Option<DateTime<Utc>>,
    commands: &'a [CommandOf<G>],
    events: Option<&'a [EntryOf<G>]>,
}
