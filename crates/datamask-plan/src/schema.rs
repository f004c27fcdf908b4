use schemars::schema::RootSchema;
use schemars::schema_for;
use serde_json::Value;

use crate::errors::PlanError;
use crate::model::MaskPlan;

/// Emit the JSON Schema for `mask.plan.json`.
pub fn plan_json_schema() -> RootSchema {
    schema_for!(MaskPlan)
}

/// The plan JSON Schema as a JSON value, ready for [`validate_plan_json`](crate::validate_plan_json).
pub fn plan_json_schema_value() -> Result<Value, PlanError> {
    Ok(serde_json::to_value(plan_json_schema())?)
}
