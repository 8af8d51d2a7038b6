//! Ability activation constraints
//!
//! Abilities declare their preconditions as data; domains build a
//! [`ConstraintContext`] from their core and call
//! [`check_ability_constraints`] from `validate`. A failed check is an
//! ordinary rejection, while a custom constraint naming an unregistered
//! handler is a configuration error.

use crate::domain::Rejection;
use crate::error::{Error, Result};
use crate::value::{Value, ValueMap};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Spend `count` of a per-turn action allowance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCost {
    pub action_type: String,
    #[serde(default = "one")]
    pub count: u32,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityStateConstraint {
    pub not_moved: bool,
    pub not_attacked: bool,
    pub not_used_ability: bool,
    /// Fields of the entity state that must equal the given values
    pub custom: ValueMap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceRequirement {
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub exact: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageLimit {
    pub per_turn: Option<u32>,
    pub per_battle: Option<u32>,
    pub per_game: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomConstraint {
    pub handler: String,
    #[serde(default)]
    pub params: ValueMap,
}

/// Everything an ability requires; all parts must hold
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilityConstraints {
    pub action_cost: Option<ActionCost>,
    pub entity_state: Option<EntityStateConstraint>,
    pub resource: IndexMap<String, ResourceRequirement>,
    pub usage_limit: Option<UsageLimit>,
    pub custom: Vec<CustomConstraint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageCounts {
    pub per_turn: u32,
    pub per_battle: u32,
    pub per_game: u32,
}

/// Snapshot of the state a constraint check reads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintContext {
    pub action_counts: IndexMap<String, u32>,
    /// Missing limit means unlimited
    pub action_limits: IndexMap<String, u32>,
    /// `hasMoved`, `hasAttacked`, `hasUsedAbility` plus custom fields
    pub entity_state: ValueMap,
    pub resources: IndexMap<String, i64>,
    pub usage_counts: UsageCounts,
    /// Domain-specific extras for custom handlers
    pub extra: ValueMap,
}

impl ConstraintContext {
    fn flag(&self, key: &str) -> bool {
        self.entity_state
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Why a constraint check failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintFailure {
    /// Dotted path of the failing constraint, e.g. `resource.charge.min`
    pub constraint: String,
    pub message: String,
}

impl ConstraintFailure {
    pub fn new(constraint: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            constraint: constraint.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConstraintFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.constraint)
    }
}

impl From<ConstraintFailure> for Rejection {
    fn from(failure: ConstraintFailure) -> Self {
        Rejection::new(format!("constraint.{}", failure.constraint), failure.message)
    }
}

pub type ConstraintCheck = std::result::Result<(), ConstraintFailure>;

type Handler = Box<dyn Fn(&ValueMap, &ConstraintContext) -> ConstraintCheck + Send + Sync>;

/// Immutable table of custom constraint handlers
#[derive(Default)]
pub struct ConstraintRegistry {
    handlers: IndexMap<String, Handler>,
}

impl ConstraintRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(
        mut self,
        name: impl Into<String>,
        handler: impl Fn(&ValueMap, &ConstraintContext) -> ConstraintCheck + Send + Sync + 'static,
    ) -> Self {
        self.handlers.insert(name.into(), Box::new(handler));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }
}

impl fmt::Debug for ConstraintRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintRegistry")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn check_action_cost(cost: &ActionCost, ctx: &ConstraintContext) -> ConstraintCheck {
    let Some(limit) = ctx.action_limits.get(&cost.action_type) else {
        return Ok(());
    };
    let used = ctx.action_counts.get(&cost.action_type).copied().unwrap_or(0);
    if used + cost.count > *limit {
        return Err(ConstraintFailure::new(
            "actionCost",
            format!("no {} actions left this turn", cost.action_type),
        ));
    }
    Ok(())
}

fn check_entity_state(constraint: &EntityStateConstraint, ctx: &ConstraintContext) -> ConstraintCheck {
    let flags = [
        (constraint.not_moved, "hasMoved", "notMoved", "already moved this turn"),
        (constraint.not_attacked, "hasAttacked", "notAttacked", "already attacked this turn"),
        (
            constraint.not_used_ability,
            "hasUsedAbility",
            "notUsedAbility",
            "already used an ability this turn",
        ),
    ];
    for (required, key, name, message) in flags {
        if required && ctx.flag(key) {
            return Err(ConstraintFailure::new(format!("entityState.{name}"), message));
        }
    }
    for (field, expected) in &constraint.custom {
        if ctx.entity_state.get(field) != Some(expected) {
            return Err(ConstraintFailure::new(
                format!("entityState.custom.{field}"),
                format!("entity state {field} does not match"),
            ));
        }
    }
    Ok(())
}

fn check_resources(
    requirements: &IndexMap<String, ResourceRequirement>,
    ctx: &ConstraintContext,
) -> ConstraintCheck {
    for (resource, req) in requirements {
        let current = ctx.resources.get(resource).copied().unwrap_or(0);
        if let Some(exact) = req.exact.filter(|e| current != *e) {
            return Err(ConstraintFailure::new(
                format!("resource.{resource}.exact"),
                format!("{resource} must be exactly {exact}"),
            ));
        }
        if let Some(min) = req.min.filter(|m| current < *m) {
            return Err(ConstraintFailure::new(
                format!("resource.{resource}.min"),
                format!("not enough {resource} (need {min})"),
            ));
        }
        if let Some(max) = req.max.filter(|m| current > *m) {
            return Err(ConstraintFailure::new(
                format!("resource.{resource}.max"),
                format!("too much {resource} (at most {max})"),
            ));
        }
    }
    Ok(())
}

fn check_usage(limit: &UsageLimit, ctx: &ConstraintContext) -> ConstraintCheck {
    let counts = &ctx.usage_counts;
    let windows = [
        (limit.per_turn, counts.per_turn, "perTurn", "turn"),
        (limit.per_battle, counts.per_battle, "perBattle", "battle"),
        (limit.per_game, counts.per_game, "perGame", "game"),
    ];
    for (max, used, name, scope) in windows {
        if let Some(max) = max.filter(|m| used >= *m) {
            return Err(ConstraintFailure::new(
                format!("usageLimit.{name}"),
                format!("can be used at most {max} times per {scope}"),
            ));
        }
    }
    Ok(())
}

/// Check every declared constraint in order: action cost, entity state,
/// resources, usage limits, custom handlers.
///
/// The outer `Result` fails only when a custom constraint cannot be
/// evaluated; the inner one carries the first failing constraint.
pub fn check_ability_constraints(
    constraints: &AbilityConstraints,
    ctx: &ConstraintContext,
    registry: Option<&ConstraintRegistry>,
) -> Result<ConstraintCheck> {
    let builtin = || -> ConstraintCheck {
        if let Some(cost) = &constraints.action_cost {
            check_action_cost(cost, ctx)?;
        }
        if let Some(state) = &constraints.entity_state {
            check_entity_state(state, ctx)?;
        }
        check_resources(&constraints.resource, ctx)?;
        if let Some(limit) = &constraints.usage_limit {
            check_usage(limit, ctx)?;
        }
        Ok(())
    };
    if let Err(failure) = builtin() {
        return Ok(Err(failure));
    }

    for custom in &constraints.custom {
        let registry =
            registry.ok_or_else(|| Error::MissingConstraintRegistry(custom.handler.clone()))?;
        let handler = registry
            .handlers
            .get(&custom.handler)
            .ok_or_else(|| Error::UnknownConstraintHandler(custom.handler.clone()))?;
        if let Err(failure) = handler(&custom.params, ctx) {
            return Ok(Err(failure));
        }
    }
    Ok(Ok(()))
}
