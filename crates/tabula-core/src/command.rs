//! Commands submitted by players, the tutorial runtime, or the engine itself

use crate::event::{Event, EventBody};
use crate::identity::PlayerId;
use serde::{Deserialize, Serialize};

/// Implemented by a domain's command enum so the engine can name commands
/// without knowing their shape.
pub trait CommandKind {
    /// Wire type of this command, e.g. `"PLAY_CARD"`.
    fn command_type(&self) -> &str;
}

/// Engine-owned command type strings
pub mod sys_command {
    pub const PREFIX: &str = "SYS_";
    pub const UNDO: &str = "SYS_UNDO";
    pub const TUTORIAL_START: &str = "SYS_TUTORIAL_START";
    pub const TUTORIAL_AI_CONSUMED: &str = "SYS_TUTORIAL_AI_CONSUMED";
    pub const INTERACTION_RESPOND: &str = "SYS_INTERACTION_RESPOND";
    pub const INTERACTION_CANCEL: &str = "SYS_INTERACTION_CANCEL";
    pub const RESPONSE_PASS: &str = "SYS_RESPONSE_PASS";
}

/// Commands handled by the systems layer rather than the domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SysCommand {
    /// Restore the most recent undo snapshot
    Undo,
    /// Install a tutorial manifest by id
    TutorialStart { manifest_id: String },
    /// The client finished replaying the scripted actions of a step
    TutorialAiConsumed { step_id: Option<String> },
    /// Answer the current interaction
    InteractionRespond {
        interaction_id: String,
        option_ids: Vec<String>,
    },
    /// Abandon the current interaction, if it allows cancelling
    InteractionCancel { interaction_id: String },
    /// Decline to respond in an open response window
    ResponsePass,
}

impl CommandKind for SysCommand {
    fn command_type(&self) -> &str {
        match self {
            SysCommand::Undo => sys_command::UNDO,
            SysCommand::TutorialStart { .. } => sys_command::TUTORIAL_START,
            SysCommand::TutorialAiConsumed { .. } => sys_command::TUTORIAL_AI_CONSUMED,
            SysCommand::InteractionRespond { .. } => sys_command::INTERACTION_RESPOND,
            SysCommand::InteractionCancel { .. } => sys_command::INTERACTION_CANCEL,
            SysCommand::ResponsePass => sys_command::RESPONSE_PASS,
        }
    }
}

/// Either an engine command or a domain command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandBody<C> {
    System(SysCommand),
    Domain(C),
}

/// A command as it travels through the pipeline.
///
/// Immutable once created; the pipeline only ever borrows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command<C> {
    pub body: CommandBody<C>,
    pub player_id: PlayerId,
    /// Milliseconds supplied by the caller. Events inherit it so replays
    /// never consult a wall clock.
    pub timestamp: u64,
}

impl<C: CommandKind> Command<C> {
    /// Create a domain command
    pub fn domain(player_id: impl Into<PlayerId>, command: C) -> Self {
        Self {
            body: CommandBody::Domain(command),
            player_id: player_id.into(),
            timestamp: 0,
        }
    }

    /// Create an engine command
    pub fn system(player_id: impl Into<PlayerId>, command: SysCommand) -> Self {
        Self {
            body: CommandBody::System(command),
            player_id: player_id.into(),
            timestamp: 0,
        }
    }

    /// Set the timestamp
    pub fn at(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Wire type string
    pub fn command_type(&self) -> &str {
        match &self.body {
            CommandBody::System(cmd) => cmd.command_type(),
            CommandBody::Domain(cmd) => cmd.command_type(),
        }
    }

    /// Whether this is an engine command
    pub fn is_system(&self) -> bool {
        matches!(self.body, CommandBody::System(_))
    }

    pub fn as_system(&self) -> Option<&SysCommand> {
        match &self.body {
            CommandBody::System(cmd) => Some(cmd),
            CommandBody::Domain(_) => None,
        }
    }

    pub fn as_domain(&self) -> Option<&C> {
        match &self.body {
            CommandBody::Domain(cmd) => Some(cmd),
            CommandBody::System(_) => None,
        }
    }

    /// Attach this command's provenance to an event body
    pub fn stamp<E>(&self, body: EventBody<E>) -> Event<E> {
        Event {
            body,
            source_command_type: self.command_type().to_string(),
            timestamp: self.timestamp,
        }
    }
}

/// Whether a command type string names an engine command
pub fn is_system_command_type(command_type: &str) -> bool {
    command_type.starts_with(sys_command::PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Toy {
        Roll,
    }

    impl CommandKind for Toy {
        fn command_type(&self) -> &str {
            "ROLL"
        }
    }

    #[test]
    fn test_command_types() {
        let cmd = Command::domain("0", Toy::Roll).at(500);
        assert_eq!(cmd.command_type(), "ROLL");
        assert!(!cmd.is_system());
        assert_eq!(cmd.as_domain(), Some(&Toy::Roll));

        let undo: Command<Toy> = Command::system("0", SysCommand::Undo);
        assert_eq!(undo.command_type(), sys_command::UNDO);
        assert!(undo.is_system());
        assert!(is_system_command_type(undo.command_type()));
        assert!(!is_system_command_type("ROLL"));
    }

    #[test]
    fn test_emitted_events_inherit_command() {
        let cmd = Command::domain("1", Toy::Roll).at(1234);
        let event: Event<u8> = cmd.stamp(EventBody::Domain(7));
        assert_eq!(event.source_command_type, "ROLL");
        assert_eq!(event.timestamp, 1234);
        assert_eq!(event.as_domain(), Some(&7));
    }
}
