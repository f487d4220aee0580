//! Declarative validation and workflow engine.
//!
//! Module services call [`RuleEngine::validate`] before persisting an
//! entity and drive document lifecycle through [`Workflow`] transitions.
//! Rules come either from validators registered at boot or from
//! per-module rule documents; entities are introspected generically via
//! their `serde` representation, so no entity type writes bespoke
//! validation plumbing.

mod document;
mod engine;
mod error;
pub mod validators;
mod workflow;

pub use document::{FieldRule, ModuleRules, RuleDocument};
pub use engine::RuleEngine;
pub use error::RuleError;
pub use validators::Validator;
pub use workflow::{StateMachineDef, TransitionDef, Workflow};
