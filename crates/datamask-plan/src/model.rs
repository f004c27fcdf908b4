use datamask_core::PropertySchema;
use datamask_engine::CoverageMode;
use datamask_rules::SeedChoice;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Plan format version understood by this crate.
pub const PLAN_VERSION: &str = "0.1";

/// Declarative masking plan for JSON records.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct MaskPlan {
    /// Plan format version.
    pub plan_version: String,
    /// Policy for properties without bindings.
    #[serde(default)]
    pub coverage: CoverageMode,
    /// Salt for `"per_value"` rule seeds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Declared shape of the records, in output order.
    pub properties: Vec<PropertySchema>,
    /// Rules bound to properties.
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

/// Ordered rule chain for one property.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Binding {
    /// Property selector (exact name or unique case-insensitive match).
    pub property: String,
    pub rules: Vec<RuleSpec>,
}

/// One catalog rule with its params and optional seed.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    /// Catalog rule id (ex.: `text.mask`).
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Pending seed set before this rule is added. It is taken by this rule
    /// if it is seed-aware, otherwise by the next seed-aware rule of the
    /// binding. Omit for no seed; `null` is rejected.
    #[serde(
        default,
        deserialize_with = "explicit_seed",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(with = "Option<SeedSpec>")]
    pub seed: Option<Option<SeedSpec>>,
}

/// Seed of a rule: a fixed integer or a seed derived from each value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum SeedSpec {
    Fixed(i64),
    Derived(SeedMode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SeedMode {
    PerValue,
}

impl SeedSpec {
    pub fn choice(self, plan_seed: Option<u64>) -> SeedChoice {
        match self {
            SeedSpec::Fixed(seed) => SeedChoice::Fixed(seed),
            SeedSpec::Derived(SeedMode::PerValue) => SeedChoice::PerValue {
                salt: plan_seed.unwrap_or_default(),
            },
        }
    }
}

/// Distinguishes an explicit `null` (`Some(None)`) from an omitted key (`None`).
fn explicit_seed<'de, D>(deserializer: D) -> Result<Option<Option<SeedSpec>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<SeedSpec>::deserialize(deserializer).map(Some)
}

impl MaskPlan {
    pub fn property(&self, name: &str) -> Option<&PropertySchema> {
        self.properties.iter().find(|property| property.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(value: Value) -> RuleSpec {
        serde_json::from_value(value).expect("rule spec")
    }

    #[test]
    fn seed_distinguishes_missing_null_and_values() {
        assert_eq!(rule(json!({"id": "text.scramble"})).seed, None);
        assert_eq!(rule(json!({"id": "text.scramble", "seed": null})).seed, Some(None));
        assert_eq!(
            rule(json!({"id": "text.scramble", "seed": 5})).seed,
            Some(Some(SeedSpec::Fixed(5)))
        );
        assert_eq!(
            rule(json!({"id": "text.scramble", "seed": "per_value"})).seed,
            Some(Some(SeedSpec::Derived(SeedMode::PerValue)))
        );
    }

    #[test]
    fn per_value_uses_plan_seed_as_salt() {
        assert_eq!(
            SeedSpec::Derived(SeedMode::PerValue).choice(Some(9)),
            SeedChoice::PerValue { salt: 9 }
        );
        assert_eq!(SeedSpec::Fixed(-3).choice(Some(9)), SeedChoice::Fixed(-3));
    }

    #[test]
    fn coverage_defaults_to_exclude() {
        let plan: MaskPlan = serde_json::from_value(json!({
            "plan_version": "0.1",
            "properties": [{"name": "email", "kind": "text"}]
        }))
        .expect("plan");
        assert_eq!(plan.coverage, CoverageMode::Exclude);
        assert!(plan.bindings.is_empty());
        assert!(plan.properties[0].nullable);
    }
}
