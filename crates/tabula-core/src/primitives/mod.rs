//! Reusable rule primitives consumed by domain code
//!
//! None of these touch match state on their own. Damage calculation in
//! particular is a preview: shields are only ever consumed by the domain
//! reducer through [`ShieldPool::absorb`].

pub mod constraints;
pub mod damage;
pub mod modifier;

pub use constraints::{
    check_ability_constraints, AbilityConstraints, ConstraintContext, ConstraintFailure,
    ConstraintRegistry,
};
pub use damage::{
    DamageBreakdown, DamageCalculation, DamageResult, DamageShield, DamageSources, ShieldPool,
    TokenDefinition, TokenTable,
};
pub use modifier::{apply_modifiers, ModifierDef, ModifierKind, ModifierResult, ModifierStack};
