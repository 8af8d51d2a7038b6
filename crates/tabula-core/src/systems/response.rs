//! Response windows and pending damage
//!
//! A window lets the defending player react out of turn order (spend a
//! token to reduce or evade incoming damage). It opens on
//! `TOKEN_RESPONSE_REQUESTED` and always ends with exactly one
//! `TOKEN_RESPONSE_CLOSED`, which this system turns into a single
//! `DAMAGE_DEALT` unless the damage was evaded or reduced to nothing.
//! Shields are not touched here; the domain reducer consumes them when it
//! folds `DAMAGE_DEALT`.

use super::{Gate, System, SystemContext};
use crate::command::SysCommand;
use crate::domain::{codes, CommandOf, EventOf, Game, Rejection};
use crate::error::Result;
use crate::event::{EventBody, EventKind, SysEvent};
use crate::identity::PlayerId;
use crate::rng::RandomSource;
use crate::state::{MatchState, SystemState};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDamage {
    pub id: String,
    pub source_player_id: Option<PlayerId>,
    pub target_player_id: PlayerId,
    pub original_damage: u32,
    pub current_damage: u32,
    /// Domain tag for the kind of response offered, e.g. `"beforeDamageReceived"`
    pub response_type: String,
    /// Seat allowed to act while the window is open
    pub responder_id: PlayerId,
    pub is_fully_evaded: bool,
    pub source_ability_id: Option<String>,
}

impl PendingDamage {
    /// Damage against `target`, who is also the responder
    pub fn new(
        id: impl Into<String>,
        source_player_id: Option<PlayerId>,
        target_player_id: impl Into<PlayerId>,
        damage: u32,
        response_type: impl Into<String>,
    ) -> Self {
        let target_player_id = target_player_id.into();
        Self {
            id: id.into(),
            source_player_id,
            responder_id: target_player_id.clone(),
            target_player_id,
            original_damage: damage,
            current_damage: damage,
            response_type: response_type.into(),
            is_fully_evaded: false,
            source_ability_id: None,
        }
    }

    pub fn with_responder(mut self, responder: impl Into<PlayerId>) -> Self {
        self.responder_id = responder.into();
        self
    }

    pub fn with_source_ability(mut self, ability_id: impl Into<String>) -> Self {
        self.source_ability_id = Some(ability_id.into());
        self
    }

    /// Event opening a response window over this damage
    pub fn request(
        self,
        allowed_commands: Vec<String>,
        response_advance_events: Vec<String>,
    ) -> SysEvent {
        SysEvent::TokenResponseRequested {
            pending_damage: self,
            allowed_commands,
            response_advance_events,
        }
    }

    /// Apply a token's effect; damage never drops below zero
    pub fn apply_token(&mut self, damage_modifier: i32, evade: bool) {
        let adjusted = self.current_damage as i64 + damage_modifier as i64;
        self.current_damage = adjusted.clamp(0, u32::MAX as i64) as u32;
        if evade {
            self.is_fully_evaded = true;
        }
    }

    /// Event closing the window over this damage
    pub fn close(&self) -> SysEvent {
        SysEvent::TokenResponseClosed {
            pending_damage_id: self.id.clone(),
            final_damage: if self.is_fully_evaded { 0 } else { self.current_damage },
            fully_evaded: self.is_fully_evaded,
            source_player_id: self.source_player_id.clone(),
            target_player_id: self.target_player_id.clone(),
            source_ability_id: self.source_ability_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseWindowState {
    pub is_open: bool,
    /// Command types allowed on top of the response-window categories
    pub allowed_commands: Vec<String>,
    /// Event types that close the window when folded
    pub response_advance_events: Vec<String>,
    pub pending_damage: Option<PendingDamage>,
}

/// Owns `sys.response`
#[derive(Debug, Clone, Default)]
pub struct ResponseWindowSystem;

impl ResponseWindowSystem {
    pub fn new() -> Self {
        Self
    }
}

impl<G: Game> System<G> for ResponseWindowSystem {
    fn name(&self) -> &'static str {
        "response_window"
    }

    fn before_command(
        &self,
        ctx: &SystemContext<'_, G>,
        state: &MatchState<G>,
        command: &CommandOf<G>,
        _random: &mut dyn RandomSource,
    ) -> Result<Gate<G>> {
        let window = &state.sys.response;
        let is_pass = matches!(command.as_system(), Some(SysCommand::ResponsePass));
        let pending = match (&window.pending_damage, window.is_open) {
            (Some(pending), true) => pending,
            _ if is_pass => {
                return Ok(Gate::Reject(Rejection::new(
                    codes::RESPONSE_NOT_OPEN,
                    "no response window is open",
                )))
            }
            _ => return Ok(Gate::Continue),
        };

        if matches!(command.as_system(), Some(SysCommand::Undo)) {
            return Ok(Gate::Continue);
        }
        if command.player_id != pending.responder_id {
            return Ok(Gate::Reject(Rejection::new(
                codes::RESPONSE_NOT_RESPONDER,
                format!("waiting for {} to respond", pending.responder_id),
            )));
        }
        if is_pass {
            return Ok(Gate::Handled(vec![EventBody::System(pending.close())]));
        }

        let command_type = command.command_type();
        let whitelisted = window.allowed_commands.iter().any(|t| t == command_type);
        if whitelisted || ctx.categories.allowed_in_response_window(command_type) {
            Ok(Gate::Continue)
        } else {
            Ok(Gate::Reject(Rejection::new(
                codes::RESPONSE_CATEGORY_BLOCKED,
                format!("{command_type} cannot be used while a response window is open"),
            )))
        }
    }

    fn reduce(
        &self,
        _ctx: &SystemContext<'_, G>,
        _core: &G::Core,
        sys: &mut SystemState<G>,
        event: &EventOf<G>,
    ) {
        let window = &mut sys.response;
        match event.as_system() {
            Some(SysEvent::TokenResponseRequested {
                pending_damage,
                allowed_commands,
                response_advance_events,
            }) => {
                window.is_open = true;
                window.pending_damage = Some(pending_damage.clone());
                window.allowed_commands = allowed_commands.clone();
                window.response_advance_events = response_advance_events.clone();
            }
            Some(SysEvent::TokenUsed {
                damage_modifier,
                evade,
                ..
            }) if window.is_open => {
                if let Some(pending) = window.pending_damage.as_mut() {
                    pending.apply_token(*damage_modifier, *evade);
                }
            }
            Some(SysEvent::TokenResponseClosed { .. }) => {
                *window = ResponseWindowState::default();
            }
            _ => {}
        }
    }

    fn after_event(
        &self,
        _ctx: &SystemContext<'_, G>,
        state: &MatchState<G>,
        event: &EventOf<G>,
    ) -> Vec<SysEvent> {
        if let Some(SysEvent::TokenResponseClosed {
            final_damage,
            fully_evaded,
            source_player_id,
            target_player_id,
            source_ability_id,
            pending_damage_id,
        }) = event.as_system()
        {
            if *fully_evaded || *final_damage == 0 {
                debug!(pending = %pending_damage_id, "pending damage resolved without damage");
                return Vec::new();
            }
            return vec![SysEvent::DamageDealt {
                source_player_id: source_player_id.clone(),
                target_player_id: target_player_id.clone(),
                amount: *final_damage,
                source_ability_id: source_ability_id.clone(),
            }];
        }

        let window = &state.sys.response;
        let Some(pending) = window.pending_damage.as_ref().filter(|_| window.is_open) else {
            return Vec::new();
        };
        let evaded = pending.is_fully_evaded
            && matches!(event.as_system(), Some(SysEvent::TokenUsed { .. }));
        let advanced = window
            .response_advance_events
            .iter()
            .any(|t| t == event.event_type());
        if evaded || advanced {
            vec![pending.close()]
        } else {
            Vec::new()
        }
    }
}
