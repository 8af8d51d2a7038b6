//! Damage calculation and shield consumption
//!
//! [`DamageCalculation`] assembles base damage, attacker token bonuses,
//! defender status reductions and caller-supplied modifiers into a
//! [`DamageResult`] with a step-by-step breakdown for the action log.
//! Shield collection is off by default and only affects the preview; the
//! domain reducer consumes shields exactly once through [`ShieldPool::absorb`]
//! when it folds `DAMAGE_DEALT`.

use super::modifier::{apply_modifiers, ModifierDef, ModifierKind, ModifierStack};
use crate::event::SysEvent;
use crate::identity::PlayerId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

const BASE_ID: &str = "__base__";
const SHIELD_ID: &str = "__shield__";

const BASE_PRIORITY: i32 = 0;
const TOKEN_PRIORITY: i32 = 10;
const STATUS_PRIORITY: i32 = 20;
const SHIELD_PRIORITY: i32 = 100;

/// Static definition of a token or status effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenDefinition {
    pub id: String,
    pub name: String,
    /// Extra damage per stack when held by the attacker
    #[serde(default)]
    pub damage_bonus: Option<i32>,
    /// Damage prevented per stack when held by the defender
    #[serde(default)]
    pub damage_reduction: Option<i32>,
    /// Added to pending damage when spent in a response window
    #[serde(default)]
    pub response_modifier: Option<i32>,
    /// Spending it in a response window evades the damage entirely
    #[serde(default)]
    pub evades: bool,
}

impl TokenDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            damage_bonus: None,
            damage_reduction: None,
            response_modifier: None,
            evades: false,
        }
    }
}

/// Token definitions by id, built once at start-up
pub type TokenTable = IndexMap<String, TokenDefinition>;

/// What a damage calculation needs to read from a domain's core
pub trait DamageSources {
    /// Token stacks held by a player, in a stable order
    fn tokens(&self, player: &PlayerId) -> Vec<(String, u32)>;

    /// Status effect stacks on a player, in a stable order
    fn status_effects(&self, player: &PlayerId) -> Vec<(String, u32)>;

    /// Sum of the player's active damage shields
    fn shield_total(&self, player: &PlayerId) -> u32;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownStep {
    pub kind: ModifierKind,
    pub value: f64,
    pub source_id: String,
    pub source_name: Option<String>,
    /// Value after this step, rounded
    pub running_total: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageBreakdown {
    pub base_value: u32,
    pub base_source_id: String,
    pub steps: Vec<BreakdownStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageResult {
    pub base_damage: u32,
    pub final_damage: u32,
    pub breakdown: DamageBreakdown,
}

/// Builder for one damage instance
pub struct DamageCalculation<'a, S: DamageSources + ?Sized> {
    sources: &'a S,
    tokens: &'a TokenTable,
    source_player_id: PlayerId,
    source_ability_id: Option<String>,
    target_player_id: PlayerId,
    base_damage: u32,
    collect_tokens: bool,
    collect_status: bool,
    collect_shields: bool,
    additional: Vec<ModifierDef>,
}

impl<'a, S: DamageSources + ?Sized> DamageCalculation<'a, S> {
    pub fn new(
        sources: &'a S,
        tokens: &'a TokenTable,
        source_player_id: impl Into<PlayerId>,
        target_player_id: impl Into<PlayerId>,
        base_damage: u32,
    ) -> Self {
        Self {
            sources,
            tokens,
            source_player_id: source_player_id.into(),
            source_ability_id: None,
            target_player_id: target_player_id.into(),
            base_damage,
            collect_tokens: true,
            collect_status: true,
            collect_shields: false,
            additional: Vec::new(),
        }
    }

    pub fn ability(mut self, ability_id: impl Into<String>) -> Self {
        self.source_ability_id = Some(ability_id.into());
        self
    }

    pub fn collect_tokens(mut self, enabled: bool) -> Self {
        self.collect_tokens = enabled;
        self
    }

    pub fn collect_status(mut self, enabled: bool) -> Self {
        self.collect_status = enabled;
        self
    }

    /// Include the defender's shields in the preview. Never enable this for
    /// damage that is going to be dealt: the reducer applies shields itself.
    pub fn preview_shields(mut self, enabled: bool) -> Self {
        self.collect_shields = enabled;
        self
    }

    pub fn modifier(mut self, modifier: ModifierDef) -> Self {
        self.additional.push(modifier);
        self
    }

    fn stack(&self) -> ModifierStack {
        let mut stack = ModifierStack::new();
        let base_source = self.source_ability_id.as_deref().unwrap_or("unknown");
        stack.add(
            ModifierDef::flat(BASE_ID, self.base_damage as f64, BASE_PRIORITY)
                .from_source(base_source)
                .described("Base damage"),
        );

        if self.collect_tokens {
            for (token_id, stacks) in self.sources.tokens(&self.source_player_id) {
                let Some(def) = self.tokens.get(&token_id) else {
                    continue;
                };
                let Some(bonus) = def.damage_bonus.filter(|_| stacks > 0) else {
                    continue;
                };
                stack.add(
                    ModifierDef::flat(
                        format!("token-{token_id}"),
                        (bonus as i64 * stacks as i64) as f64,
                        TOKEN_PRIORITY,
                    )
                    .from_source(token_id.as_str())
                    .described(def.name.as_str()),
                );
            }
        }

        if self.collect_status {
            for (status_id, stacks) in self.sources.status_effects(&self.target_player_id) {
                let Some(def) = self.tokens.get(&status_id) else {
                    continue;
                };
                let Some(reduction) = def.damage_reduction.filter(|_| stacks > 0) else {
                    continue;
                };
                stack.add(
                    ModifierDef::flat(
                        format!("status-{status_id}"),
                        -((reduction as i64 * stacks as i64) as f64),
                        STATUS_PRIORITY,
                    )
                    .from_source(status_id.as_str())
                    .described(def.name.as_str()),
                );
            }
        }

        if self.collect_shields {
            let total = self.sources.shield_total(&self.target_player_id);
            if total > 0 {
                stack.add(
                    ModifierDef::flat(SHIELD_ID, -(total as f64), SHIELD_PRIORITY)
                        .from_source("shield")
                        .described("Shield reduction"),
                );
            }
        }

        for modifier in &self.additional {
            stack.add(modifier.clone());
        }
        stack
    }

    /// Compute the final damage and its breakdown
    pub fn resolve(&self) -> DamageResult {
        let stack = self.stack();
        let result = apply_modifiers(&stack, 0.0);

        let mut running = 0.0;
        let mut steps = Vec::new();
        for id in &result.applied_ids {
            let Some(def) = stack.get(id) else {
                continue;
            };
            if def.id == BASE_ID {
                running = def.value;
                continue;
            }
            running = match def.kind {
                ModifierKind::Flat => running + def.value,
                ModifierKind::Percent => running * (1.0 + def.value / 100.0),
            };
            steps.push(BreakdownStep {
                kind: def.kind,
                value: def.value,
                source_id: def.source.clone(),
                source_name: def.description.clone(),
                running_total: running.round() as i64,
            });
        }

        DamageResult {
            base_damage: self.base_damage,
            final_damage: result.final_value.round().max(0.0) as u32,
            breakdown: DamageBreakdown {
                base_value: self.base_damage,
                base_source_id: self
                    .source_ability_id
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
                steps,
            },
        }
    }

    /// The `DAMAGE_DEALT` event for this calculation
    pub fn to_event(&self) -> SysEvent {
        SysEvent::DamageDealt {
            source_player_id: Some(self.source_player_id.clone()),
            target_player_id: self.target_player_id.clone(),
            amount: self.resolve().final_damage,
            source_ability_id: self.source_ability_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageShield {
    pub value: u32,
    pub source_id: Option<String>,
}

/// A player's active damage shields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShieldPool {
    shields: Vec<DamageShield>,
}

impl ShieldPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: u32, source_id: Option<String>) {
        self.shields.push(DamageShield { value, source_id });
    }

    pub fn total(&self) -> u32 {
        self.shields.iter().map(|s| s.value).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shields.is_empty()
    }

    pub fn shields(&self) -> &[DamageShield] {
        &self.shields
    }

    /// Absorb incoming damage and return what gets through.
    ///
    /// Shields are single-use: any positive damage consumes all of them,
    /// even when they exceed the damage. Zero damage leaves them in place.
    pub fn absorb(&mut self, damage: u32) -> u32 {
        if damage == 0 || self.shields.is_empty() {
            return damage;
        }
        let total = self.total();
        self.shields.clear();
        damage.saturating_sub(total)
    }
}
