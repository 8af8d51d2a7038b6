//! Events: the only things `reduce` ever sees

use crate::identity::PlayerId;
use crate::systems::interaction::Interaction;
use crate::systems::response::PendingDamage;
use crate::value::{Value, ValueMap};
use serde::{Deserialize, Serialize};

/// Implemented by a domain's event enum.
pub trait EventKind {
    /// Wire type of this event, e.g. `"CARD_PLAYED"`.
    fn event_type(&self) -> &str;

    /// Dynamic view of the payload, used by tutorial step matchers.
    /// Domains that never match on payload fields can keep the default.
    fn payload(&self) -> Value {
        Value::Null
    }
}

/// Engine-owned event type strings
pub mod sys_event {
    pub const INTERACTION_REQUESTED: &str = "INTERACTION_REQUESTED";
    pub const INTERACTION_RESPONDED: &str = "INTERACTION_RESPONDED";
    pub const INTERACTION_CANCELLED: &str = "INTERACTION_CANCELLED";
    pub const INTERACTION_COMPLETED: &str = "INTERACTION_COMPLETED";
    pub const TOKEN_RESPONSE_REQUESTED: &str = "TOKEN_RESPONSE_REQUESTED";
    pub const TOKEN_USED: &str = "TOKEN_USED";
    pub const TOKEN_RESPONSE_CLOSED: &str = "TOKEN_RESPONSE_CLOSED";
    pub const DAMAGE_DEALT: &str = "DAMAGE_DEALT";
    pub const TUTORIAL_STARTED: &str = "TUTORIAL_STARTED";
    pub const TUTORIAL_STEP_ADVANCED: &str = "TUTORIAL_STEP_ADVANCED";
    pub const TUTORIAL_AI_PLAYED: &str = "TUTORIAL_AI_PLAYED";
    pub const TUTORIAL_AI_CONSUMED: &str = "TUTORIAL_AI_CONSUMED";
    pub const TUTORIAL_COMPLETED: &str = "TUTORIAL_COMPLETED";
}

/// Events emitted by the systems layer.
///
/// Domains must fold the ones that touch their state (`TOKEN_USED`,
/// `DAMAGE_DEALT`) and may ignore the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SysEvent {
    InteractionRequested {
        interaction: Interaction,
    },
    InteractionResponded {
        interaction_id: String,
        player_id: PlayerId,
        option_ids: Vec<String>,
    },
    InteractionCancelled {
        interaction_id: String,
        player_id: PlayerId,
    },
    InteractionCompleted {
        interaction_id: String,
    },
    TokenResponseRequested {
        pending_damage: PendingDamage,
        allowed_commands: Vec<String>,
        response_advance_events: Vec<String>,
    },
    TokenUsed {
        player_id: PlayerId,
        token_id: String,
        amount: u32,
        /// Added to the pending damage (negative reduces it)
        damage_modifier: i32,
        evade: bool,
    },
    TokenResponseClosed {
        pending_damage_id: String,
        final_damage: u32,
        fully_evaded: bool,
        source_player_id: Option<PlayerId>,
        target_player_id: PlayerId,
        source_ability_id: Option<String>,
    },
    DamageDealt {
        source_player_id: Option<PlayerId>,
        target_player_id: PlayerId,
        amount: u32,
        source_ability_id: Option<String>,
    },
    TutorialStarted {
        manifest_id: String,
        step_id: String,
    },
    TutorialStepAdvanced {
        from_index: usize,
        to_index: usize,
        step_id: String,
    },
    TutorialAiPlayed {
        step_id: String,
    },
    TutorialAiConsumed {
        step_id: String,
    },
    TutorialCompleted {
        manifest_id: String,
    },
}

impl EventKind for SysEvent {
    fn event_type(&self) -> &str {
        match self {
            SysEvent::InteractionRequested { .. } => sys_event::INTERACTION_REQUESTED,
            SysEvent::InteractionResponded { .. } => sys_event::INTERACTION_RESPONDED,
            SysEvent::InteractionCancelled { .. } => sys_event::INTERACTION_CANCELLED,
            SysEvent::InteractionCompleted { .. } => sys_event::INTERACTION_COMPLETED,
            SysEvent::TokenResponseRequested { .. } => sys_event::TOKEN_RESPONSE_REQUESTED,
            SysEvent::TokenUsed { .. } => sys_event::TOKEN_USED,
            SysEvent::TokenResponseClosed { .. } => sys_event::TOKEN_RESPONSE_CLOSED,
            SysEvent::DamageDealt { .. } => sys_event::DAMAGE_DEALT,
            SysEvent::TutorialStarted { .. } => sys_event::TUTORIAL_STARTED,
            SysEvent::TutorialStepAdvanced { .. } => sys_event::TUTORIAL_STEP_ADVANCED,
            SysEvent::TutorialAiPlayed { .. } => sys_event::TUTORIAL_AI_PLAYED,
            SysEvent::TutorialAiConsumed { .. } => sys_event::TUTORIAL_AI_CONSUMED,
            SysEvent::TutorialCompleted { .. } => sys_event::TUTORIAL_COMPLETED,
        }
    }

    fn payload(&self) -> Value {
        let mut map = ValueMap::new();
        match self {
            SysEvent::InteractionRequested { interaction } => {
                map.insert("interactionId".into(), interaction.id.as_str().into());
                map.insert("playerId".into(), interaction.player_id.as_str().into());
                map.insert("kind".into(), interaction.kind.as_str().into());
                if let Some(source) = &interaction.source_id {
                    map.insert("sourceId".into(), source.as_str().into());
                }
            }
            SysEvent::InteractionResponded {
                interaction_id,
                player_id,
                option_ids,
            } => {
                map.insert("interactionId".into(), interaction_id.as_str().into());
                map.insert("playerId".into(), player_id.as_str().into());
                map.insert(
                    "optionIds".into(),
                    Value::List(option_ids.iter().map(|id| id.as_str().into()).collect()),
                );
            }
            SysEvent::InteractionCancelled {
                interaction_id,
                player_id,
            } => {
                map.insert("interactionId".into(), interaction_id.as_str().into());
                map.insert("playerId".into(), player_id.as_str().into());
            }
            SysEvent::InteractionCompleted { interaction_id } => {
                map.insert("interactionId".into(), interaction_id.as_str().into());
            }
            SysEvent::TokenResponseRequested { pending_damage, .. } => {
                map.insert("pendingDamageId".into(), pending_damage.id.as_str().into());
                map.insert(
                    "responderId".into(),
                    pending_damage.responder_id.as_str().into(),
                );
                map.insert("damage".into(), pending_damage.current_damage.into());
            }
            SysEvent::TokenUsed {
                player_id,
                token_id,
                amount,
                damage_modifier,
                evade,
            } => {
                map.insert("playerId".into(), player_id.as_str().into());
                map.insert("tokenId".into(), token_id.as_str().into());
                map.insert("amount".into(), (*amount).into());
                map.insert("damageModifier".into(), (*damage_modifier).into());
                map.insert("evade".into(), (*evade).into());
            }
            SysEvent::TokenResponseClosed {
                pending_damage_id,
                final_damage,
                fully_evaded,
                target_player_id,
                ..
            } => {
                map.insert("pendingDamageId".into(), pending_damage_id.as_str().into());
                map.insert("finalDamage".into(), (*final_damage).into());
                map.insert("fullyEvaded".into(), (*fully_evaded).into());
                map.insert("targetPlayerId".into(), target_player_id.as_str().into());
            }
            SysEvent::DamageDealt {
                source_player_id,
                target_player_id,
                amount,
                source_ability_id,
            } => {
                if let Some(source) = source_player_id {
                    map.insert("sourcePlayerId".into(), source.as_str().into());
                }
                map.insert("targetPlayerId".into(), target_player_id.as_str().into());
                map.insert("amount".into(), (*amount).into());
                if let Some(ability) = source_ability_id {
                    map.insert("sourceAbilityId".into(), ability.as_str().into());
                }
            }
            SysEvent::TutorialStarted {
                manifest_id,
                step_id,
            } => {
                map.insert("manifestId".into(), manifest_id.as_str().into());
                map.insert("stepId".into(), step_id.as_str().into());
            }
            SysEvent::TutorialStepAdvanced {
                from_index,
                to_index,
                step_id,
            } => {
                map.insert("fromIndex".into(), (*from_index).into());
                map.insert("toIndex".into(), (*to_index).into());
                map.insert("stepId".into(), step_id.as_str().into());
            }
            SysEvent::TutorialAiPlayed { step_id } | SysEvent::TutorialAiConsumed { step_id } => {
                map.insert("stepId".into(), step_id.as_str().into());
            }
            SysEvent::TutorialCompleted { manifest_id } => {
                map.insert("manifestId".into(), manifest_id.as_str().into());
            }
        }
        Value::Map(map)
    }
}

/// Either an engine event or a domain event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventBody<E> {
    System(SysEvent),
    Domain(E),
}

/// An event produced by `execute` or by a system, before it gets an id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event<E> {
    pub body: EventBody<E>,
    pub source_command_type: String,
    pub timestamp: u64,
}

impl<E> Event<E> {
    /// Build an engine event with explicit provenance
    pub fn system(
        event: SysEvent,
        source_command_type: impl Into<String>,
        timestamp: u64,
    ) -> Self {
        Self {
            body: EventBody::System(event),
            source_command_type: source_command_type.into(),
            timestamp,
        }
    }

    /// Build a domain event with explicit provenance
    pub fn domain(event: E, source_command_type: impl Into<String>, timestamp: u64) -> Self {
        Self {
            body: EventBody::Domain(event),
            source_command_type: source_command_type.into(),
            timestamp,
        }
    }

    /// Another event with the same provenance as this one
    pub fn follow_up(&self, event: SysEvent) -> Self {
        Self::system(event, self.source_command_type.clone(), self.timestamp)
    }

    pub fn as_system(&self) -> Option<&SysEvent> {
        match &self.body {
            EventBody::System(e) => Some(e),
            EventBody::Domain(_) => None,
        }
    }

    pub fn as_domain(&self) -> Option<&E> {
        match &self.body {
            EventBody::Domain(e) => Some(e),
            EventBody::System(_) => None,
        }
    }
}

impl<E: EventKind> Event<E> {
    /// Wire type string
    pub fn event_type(&self) -> &str {
        match &self.body {
            EventBody::System(e) => e.event_type(),
            EventBody::Domain(e) => e.event_type(),
        }
    }

    /// Dynamic payload view
    pub fn payload(&self) -> Value {
        match &self.body {
            EventBody::System(e) => e.payload(),
            EventBody::Domain(e) => e.payload(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl EventKind for () {
        fn event_type(&self) -> &str {
            "UNIT"
        }
    }

    #[test]
    fn test_sys_event_payload() {
        let event: Event<()> = Event::system(
            SysEvent::DamageDealt {
                source_player_id: Some(PlayerId::from("0")),
                target_player_id: PlayerId::from("1"),
                amount: 4,
                source_ability_id: None,
            },
            "ATTACK",
            10,
        );
        let payload = event.payload();
        assert_eq!(payload.get("amount"), Some(&Value::Int(4)));
        assert_eq!(payload.get("targetPlayerId").and_then(Value::as_str), Some("1"));
        assert!(payload.get("sourceAbilityId").is_none());
    }

    #[test]
    fn test_follow_up_keeps_provenance() {
        let event: Event<()> = Event::system(
            SysEvent::InteractionCompleted {
                interaction_id: "i1".into(),
            },
            "SYS_INTERACTION_RESPOND",
            99,
        );
        let next = event.follow_up(SysEvent::TutorialCompleted {
            manifest_id: "intro".into(),
        });
        assert_eq!(next.source_command_type, "SYS_INTERACTION_RESPOND");
        assert_eq!(next.timestamp, 99);
        assert_eq!(next.as_system().map(|e| e.event_type()), Some("TUTORIAL_COMPLETED"));
    }
}
