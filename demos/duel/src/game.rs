//! Duel match data: fighters, cards, commands and events

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tabula_core::primitives::{DamageSources, ShieldPool};
use tabula_core::{CommandKind, EventKind, Game, PlayerId, Value};

pub const STARTING_HP: i64 = 15;
pub const STARTING_HAND: usize = 3;
pub const DICE_PER_ROLL: usize = 3;
pub const MAX_HAND: usize = 6;

/// Marker binding the duel types to the engine
#[derive(Debug, Clone, PartialEq)]
pub struct Duel;

impl Game for Duel {
    type Core = DuelCore;
    type Command = DuelCommand;
    type Event = DuelEvent;
}

/// A ward card; playing it raises a shield of `ward` points
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub uid: String,
    pub ward: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fighter {
    pub hp: i64,
    pub hand: Vec<Card>,
    pub shields: ShieldPool,
    /// Spendable tokens by id
    pub tokens: IndexMap<String, u32>,
    /// Passive statuses by id
    pub statuses: IndexMap<String, u32>,
}

impl Fighter {
    pub fn new(hp: i64) -> Self {
        Self {
            hp,
            ..Self::default()
        }
    }

    pub fn stacks(&self, token_id: &str) -> u32 {
        self.tokens.get(token_id).copied().unwrap_or(0)
    }

    pub fn card(&self, uid: &str) -> Option<&Card> {
        self.hand.iter().find(|c| c.uid == uid)
    }

    pub fn is_down(&self) -> bool {
        self.hp <= 0
    }

    pub(crate) fn gain_token(&mut self, token_id: &str, amount: u32) {
        *self.tokens.entry(token_id.to_string()).or_insert(0) += amount;
    }

    pub(crate) fn spend_token(&mut self, token_id: &str, amount: u32) {
        if let Some(stacks) = self.tokens.get_mut(token_id) {
            *stacks = stacks.saturating_sub(amount);
            if *stacks == 0 {
                self.tokens.shift_remove(token_id);
            }
        }
    }

    pub(crate) fn gain_status(&mut self, status_id: &str) {
        *self.statuses.entry(status_id.to_string()).or_insert(0) += 1;
    }

    pub(crate) fn remove_card(&mut self, uid: &str) -> Option<Card> {
        let index = self.hand.iter().position(|c| c.uid == uid)?;
        Some(self.hand.remove(index))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DuelCore {
    /// Seats in turn order
    pub seats: Vec<PlayerId>,
    pub fighters: IndexMap<PlayerId, Fighter>,
    /// Index into `seats`
    pub active: usize,
    pub turn: u32,
    /// Dice rolled this turn and not yet spent
    pub dice: Vec<u32>,
    pub has_rolled: bool,
    pub next_card: u32,
    /// Set when a fighter drops to zero hp; nothing is legal afterwards
    pub winner: Option<PlayerId>,
}

impl DuelCore {
    pub fn active_player(&self) -> Option<&PlayerId> {
        self.seats.get(self.active)
    }

    /// The seat after `player`, wrapping around
    pub fn opponent_of(&self, player: &PlayerId) -> Option<&PlayerId> {
        let index = self.seats.iter().position(|p| p == player)?;
        self.seats.get((index + 1) % self.seats.len())
    }

    pub fn fighter(&self, player: &PlayerId) -> Option<&Fighter> {
        self.fighters.get(player)
    }

    pub(crate) fn fighter_mut(&mut self, player: &PlayerId) -> Option<&mut Fighter> {
        self.fighters.get_mut(player)
    }

    /// Owner of the card with `uid`
    pub fn holder_of(&self, uid: &str) -> Option<&PlayerId> {
        self.fighters
            .iter()
            .find(|(_, f)| f.card(uid).is_some())
            .map(|(id, _)| id)
    }
}

impl DamageSources for DuelCore {
    fn tokens(&self, player: &PlayerId) -> Vec<(String, u32)> {
        self.fighter(player)
            .map(|f| f.tokens.iter().map(|(id, n)| (id.clone(), *n)).collect())
            .unwrap_or_default()
    }

    fn status_effects(&self, player: &PlayerId) -> Vec<(String, u32)> {
        self.fighter(player)
            .map(|f| f.statuses.iter().map(|(id, n)| (id.clone(), *n)).collect())
            .unwrap_or_default()
    }

    fn shield_total(&self, player: &PlayerId) -> u32 {
        self.fighter(player).map_or(0, |f| f.shields.total())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DuelCommand {
    Roll,
    Attack,
    UseToken { token_id: String },
    RaiseWard { card_uid: String },
    Draw,
    AskDiscard,
    EndTurn,
}

impl CommandKind for DuelCommand {
    fn command_type(&self) -> &str {
        match self {
            DuelCommand::Roll => "ROLL",
            DuelCommand::Attack => "ATTACK",
            DuelCommand::UseToken { .. } => "USE_TOKEN",
            DuelCommand::RaiseWard { .. } => "RAISE_WARD",
            DuelCommand::Draw => "DRAW",
            DuelCommand::AskDiscard => "ASK_DISCARD",
            DuelCommand::EndTurn => "END_TURN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DuelEvent {
    DiceRolled {
        player_id: PlayerId,
        faces: Vec<u32>,
    },
    /// Damage declared against `target`; the response window follows
    AttackDeclared {
        player_id: PlayerId,
        target_player_id: PlayerId,
        damage: u32,
        /// Shields included, for display only
        preview: u32,
        spent_tokens: Vec<String>,
    },
    WardRaised {
        player_id: PlayerId,
        card_uid: String,
        value: u32,
    },
    CardDrawn {
        player_id: PlayerId,
        card: Card,
    },
    CardDiscarded {
        player_id: PlayerId,
        card_uid: String,
    },
    TurnEnded {
        player_id: PlayerId,
        next_player_id: PlayerId,
    },
}

impl EventKind for DuelEvent {
    fn event_type(&self) -> &str {
        match self {
            DuelEvent::DiceRolled { .. } => "DICE_ROLLED",
            DuelEvent::AttackDeclared { .. } => "ATTACK_DECLARED",
            DuelEvent::WardRaised { .. } => "WARD_RAISED",
            DuelEvent::CardDrawn { .. } => "CARD_DRAWN",
            DuelEvent::CardDiscarded { .. } => "CARD_DISCARDED",
            DuelEvent::TurnEnded { .. } => "TURN_ENDED",
        }
    }

    fn payload(&self) -> Value {
        match self {
            DuelEvent::DiceRolled { player_id, faces } => [
                ("playerId", Value::from(player_id.as_str())),
                ("total", Value::from(faces.iter().sum::<u32>())),
            ]
            .into_iter()
            .collect(),
            DuelEvent::AttackDeclared {
                player_id,
                target_player_id,
                damage,
                ..
            } => [
                ("playerId", Value::from(player_id.as_str())),
                ("targetPlayerId", Value::from(target_player_id.as_str())),
                ("damage", Value::from(*damage)),
            ]
            .into_iter()
            .collect(),
            DuelEvent::WardRaised {
                player_id, value, ..
            } => [
                ("playerId", Value::from(player_id.as_str())),
                ("value", Value::from(*value)),
            ]
            .into_iter()
            .collect(),
            DuelEvent::CardDrawn { player_id, .. }
            | DuelEvent::CardDiscarded { player_id, .. }
            | DuelEvent::TurnEnded { player_id, .. } => {
                [("playerId", Value::from(player_id.as_str()))]
                    .into_iter()
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spend_token_removes_empty_stack() {
        let mut fighter = Fighter::new(10);
        fighter.gain_token("guard", 2);
        fighter.spend_token("guard", 1);
        assert_eq!(fighter.stacks("guard"), 1);
        fighter.spend_token("guard", 1);
        assert!(!fighter.tokens.contains_key("guard"));
        fighter.spend_token("guard", 1);
        assert_eq!(fighter.stacks("guard"), 0);
    }

    #[test]
    fn test_opponent_wraps() {
        let core = DuelCore {
            seats: vec![PlayerId::from("0"), PlayerId::from("1")],
            ..DuelCore::default()
        };
        assert_eq!(core.opponent_of(&PlayerId::from("0")), Some(&PlayerId::from("1")));
        assert_eq!(core.opponent_of(&PlayerId::from("1")), Some(&PlayerId::from("0")));
        assert_eq!(core.opponent_of(&PlayerId::from("2")), None);
    }

    #[test]
    fn test_payload_fields() {
        let event = DuelEvent::DiceRolled {
            player_id: PlayerId::from("0"),
            faces: vec![2, 3, 6],
        };
        let payload = event.payload();
        assert_eq!(payload.get("total").and_then(Value::as_int), Some(11));
        assert_eq!(payload.get("playerId").and_then(Value::as_str), Some("0"));
    }
}
