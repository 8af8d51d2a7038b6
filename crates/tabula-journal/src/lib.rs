//! Tabula Journal - Match recording, replay and auditing
//!
//! This crate builds on `tabula-core`'s deterministic pipeline to provide:
//!
//! - **Recorder**: Run a match server-side and keep the accepted commands
//! - **Replayer**: Re-run a log command by command, or fold its event stream
//!   through `reduce` alone to check purity
//! - **Auditor**: Query and summarize event streams, and list prompts or
//!   response windows that never finished
//! - **Exporter**: Export logs to RON, JSON or text
//!
//! # Example
//!
//! ```rust,ignore
//! use tabula_journal::{replay_commands, verify_reduce_purity, Auditor, Exporter, MatchRecorder};
//!
//! // Record a match
//! let mut recorder = MatchRecorder::new(pipeline.clone(), seed, player_ids);
//! for command in incoming {
//!     recorder.submit(command)?;
//! }
//!
//! // Same seed, same commands, same state
//! let replayed = replay_commands(&pipeline, recorder.log())?;
//! assert_eq!(&replayed, recorder.state());
//! verify_reduce_purity(&pipeline, recorder.log(), recorder.state())?;
//!
//! // Audit the stream
//! let report = Auditor::new(recorder.state().event_stream()).generate_report();
//! println!("{}", report);
//!
//! // Export for external analysis
//! let ron = Exporter::new(recorder.log()).with_state(recorder.state()).to_ron()?;
//! ```

mod auditor;
mod error;
mod exporter;
mod log;
mod replayer;

#[cfg(test)]
mod test_game;

pub use auditor::{AuditQuery, AuditReport, Auditor, CompletionAudit, EventSummary};
pub use error::{Error, Result};
pub use exporter::{ExportFormat, Exporter};
pub use log::{replay_commands, replay_prefix, MatchLog, MatchRecorder};
pub use replayer::{replay_reduce, verify_reduce_purity, ReplayState, Replayer};
