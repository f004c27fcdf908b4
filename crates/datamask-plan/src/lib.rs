//! Declarative masking plans: JSON model, JSON Schema, validation and
//! compilation into a [`JsonMasker`](datamask_engine::JsonMasker).

pub mod compile;
pub mod errors;
pub mod model;
pub mod schema;
pub mod validate;

pub use compile::{compile_plan, compile_plan_with};
pub use errors::{IssueSeverity, PlanError, Result, ValidationIssue, ValidationReport};
pub use model::{Binding, MaskPlan, PLAN_VERSION, RuleSpec, SeedMode, SeedSpec};
pub use schema::{plan_json_schema, plan_json_schema_value};
pub use validate::{ValidatedPlan, validate_plan, validate_plan_json, validate_plan_semantics};
