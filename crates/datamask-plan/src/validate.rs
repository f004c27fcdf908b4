use std::collections::{HashMap, HashSet};

use datamask_core::{PropertySchema, TypeConverterRegistry, ValueKind};
use datamask_rules::RuleCatalog;
use jsonschema::JSONSchema;
use serde_json::Value;

use crate::errors::{IssueSeverity, PlanError, ValidationIssue, ValidationReport};
use crate::model::{Binding, MaskPlan, PLAN_VERSION};

/// Validated plan with accumulated warnings.
#[derive(Debug, Clone)]
pub struct ValidatedPlan {
    pub plan: MaskPlan,
    pub warnings: Vec<ValidationIssue>,
}

/// Validate a plan JSON document against the plan JSON Schema.
pub fn validate_plan_json(
    plan_json: &Value,
    plan_schema: &Value,
) -> Result<ValidationReport, PlanError> {
    let compiled =
        JSONSchema::compile(plan_schema).map_err(|err| PlanError::Schema(err.to_string()))?;

    let mut report = ValidationReport::default();

    if let Err(errors) = compiled.validate(plan_json) {
        for error in errors {
            let path = normalized_json_pointer(&error.instance_path.to_string());
            report.push_error(ValidationIssue::new(
                IssueSeverity::Error,
                "schema_violation",
                path,
                error.to_string(),
                None,
            ));
        }
    }

    Ok(report)
}

/// Check a parsed plan against the rule catalog and converter registry.
pub fn validate_plan_semantics(
    plan: &MaskPlan,
    catalog: &RuleCatalog,
    converters: &TypeConverterRegistry,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    if plan.plan_version != PLAN_VERSION {
        report.push_error(
            ValidationIssue::error(
                "unsupported_plan_version",
                "/plan_version",
                format!("plan_version '{}' is not supported", plan.plan_version),
            )
            .with_hint(format!("use plan_version \"{PLAN_VERSION}\"")),
        );
    }

    validate_properties(&plan.properties, &mut report);

    let mut bound: HashMap<&str, usize> = HashMap::new();
    for (index, binding) in plan.bindings.iter().enumerate() {
        let Some(property) = lookup_property(&plan.properties, binding, index, &mut report) else {
            continue;
        };
        if let Some(previous) = bound.insert(property.name.as_str(), index) {
            report.push_warning(ValidationIssue::warning(
                "rebound_property",
                format!("/bindings/{index}/property"),
                format!(
                    "property '{}' is already bound at /bindings/{previous}; the last binding wins",
                    property.name
                ),
            ));
        }
        validate_binding(binding, index, property, catalog, converters, &mut report);
    }

    report
}

/// Validate the plan end-to-end, returning structured issues on failure.
pub fn validate_plan(
    plan_json: &Value,
    plan_schema: &Value,
    catalog: &RuleCatalog,
) -> Result<ValidatedPlan, ValidationReport> {
    let structural = match validate_plan_json(plan_json, plan_schema) {
        Ok(report) => report,
        Err(err) => {
            let mut report = ValidationReport::default();
            report.push_error(ValidationIssue::error(
                "schema_validation_error",
                "/",
                err.to_string(),
            ));
            return Err(report);
        }
    };

    if !structural.is_ok() {
        return Err(structural);
    }

    let plan: MaskPlan = match serde_json::from_value(plan_json.clone()) {
        Ok(plan) => plan,
        Err(err) => {
            let mut report = ValidationReport::default();
            report.push_error(ValidationIssue::error("invalid_plan_json", "/", err.to_string()));
            return Err(report);
        }
    };

    let semantic = validate_plan_semantics(&plan, catalog, &TypeConverterRegistry::global());
    if !semantic.is_ok() {
        return Err(semantic);
    }

    Ok(ValidatedPlan {
        plan,
        warnings: semantic.warnings,
    })
}

fn validate_properties(properties: &[PropertySchema], report: &mut ValidationReport) {
    if properties.is_empty() {
        report.push_warning(ValidationIssue::warning(
            "empty_properties",
            "/properties",
            "plan declares no properties; every masked record will be empty",
        ));
    }
    let mut seen = HashSet::new();
    for (index, property) in properties.iter().enumerate() {
        if property.name.is_empty() {
            report.push_error(ValidationIssue::error(
                "empty_property_name",
                format!("/properties/{index}/name"),
                "property name must not be empty",
            ));
        }
        if !seen.insert(property.name.as_str()) {
            report.push_error(ValidationIssue::error(
                "duplicate_property",
                format!("/properties/{index}/name"),
                format!("property '{}' is declared more than once", property.name),
            ));
        }
    }
}

/// Same resolution as the masker builder, with distinct codes for unknown
/// and ambiguous selectors.
fn lookup_property<'a>(
    properties: &'a [PropertySchema],
    binding: &Binding,
    index: usize,
    report: &mut ValidationReport,
) -> Option<&'a PropertySchema> {
    let path = format!("/bindings/{index}/property");
    let selector = binding.property.as_str();

    let property = match properties.iter().find(|property| property.name == selector) {
        Some(property) => property,
        None => {
            let matches: Vec<_> = properties
                .iter()
                .filter(|property| property.name.eq_ignore_ascii_case(selector))
                .collect();
            match matches.as_slice() {
                [property] => *property,
                [] => {
                    report.push_error(
                        ValidationIssue::error(
                            "unknown_property",
                            path,
                            format!("property '{selector}' is not declared"),
                        )
                        .with_hint("declare it under /properties or fix the selector"),
                    );
                    return None;
                }
                _ => {
                    report.push_error(ValidationIssue::error(
                        "ambiguous_property",
                        path,
                        format!(
                            "selector '{selector}' matches {} properties ignoring case",
                            matches.len()
                        ),
                    ));
                    return None;
                }
            }
        }
    };

    if property.read_only {
        report.push_error(ValidationIssue::error(
            "read_only_property",
            path,
            format!("property '{}' is read-only", property.name),
        ));
        return None;
    }
    Some(property)
}

fn validate_binding(
    binding: &Binding,
    index: usize,
    property: &PropertySchema,
    catalog: &RuleCatalog,
    converters: &TypeConverterRegistry,
    report: &mut ValidationReport,
) {
    if binding.rules.is_empty() {
        report.push_error(ValidationIssue::error(
            "empty_rules",
            format!("/bindings/{index}/rules"),
            "binding has no rules",
        ));
        return;
    }

    let mut chain_kind: Option<ValueKind> = None;
    let mut pending_seed: Option<usize> = None;

    for (position, spec) in binding.rules.iter().enumerate() {
        let path = format!("/bindings/{index}/rules/{position}");

        match spec.seed {
            Some(None) => report.push_error(ValidationIssue::error(
                "null_seed",
                format!("{path}/seed"),
                "seed must not be null",
            )),
            Some(Some(_)) => {
                if pending_seed.is_some() {
                    report.push_warning(ValidationIssue::warning(
                        "replaced_seed",
                        format!("{path}/seed"),
                        "seed replaces a pending seed that no rule used",
                    ));
                }
                pending_seed = Some(position);
            }
            None => {}
        }

        let Some(descriptor) = catalog.descriptor(&spec.id) else {
            report.push_error(
                ValidationIssue::error(
                    "unknown_rule",
                    format!("{path}/id"),
                    format!("rule id '{}' is not in the catalog", spec.id),
                )
                .with_hint("run `datamask rules` to list the available ids"),
            );
            continue;
        };
        if descriptor.seeded {
            pending_seed = None;
        }

        let hint = chain_kind.unwrap_or(property.kind);
        let kind = match catalog.resolve_kind(&spec.id, Some(hint)) {
            Ok(kind) => kind,
            Err(err) => {
                report.push_error(ValidationIssue::error("invalid_rule", format!("{path}/id"), err.to_string()));
                continue;
            }
        };

        match chain_kind {
            None => {
                chain_kind = Some(kind);
                if !converters.supports(property.kind, kind) {
                    report.push_error(ValidationIssue::error(
                        "no_converter",
                        format!("{path}/id"),
                        format!(
                            "rule '{}' works on {kind} but property '{}' is {}",
                            spec.id, property.name, property.kind
                        ),
                    ));
                }
            }
            Some(expected) if expected != kind => {
                report.push_error(ValidationIssue::error(
                    "mixed_rule_kinds",
                    format!("{path}/id"),
                    format!(
                        "rule '{}' works on {kind} but the chain works on {expected}",
                        spec.id
                    ),
                ));
                continue;
            }
            Some(_) => {}
        }

        if let Err(err) = catalog.create(&spec.id, spec.params.as_ref(), Some(kind)) {
            report.push_error(ValidationIssue::error(
                "invalid_params",
                format!("{path}/params"),
                err.to_string(),
            ));
        }
    }

    if let Some(position) = pending_seed {
        report.push_warning(ValidationIssue::warning(
            "unused_seed",
            format!("/bindings/{index}/rules/{position}/seed"),
            "no seed-aware rule follows this seed",
        ));
    }
}

fn normalized_json_pointer(pointer: &str) -> String {
    if pointer.is_empty() {
        "/".to_string()
    } else {
        pointer.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plan(bindings: Value) -> MaskPlan {
        serde_json::from_value(json!({
            "plan_version": "0.1",
            "properties": [
                {"name": "email", "kind": "text"},
                {"name": "age", "kind": "int"},
                {"name": "active", "kind": "bool"},
                {"name": "id", "kind": "text", "read_only": true}
            ],
            "bindings": bindings
        }))
        .expect("plan")
    }

    fn check(bindings: Value) -> ValidationReport {
        validate_plan_semantics(
            &plan(bindings),
            &RuleCatalog::new(),
            &TypeConverterRegistry::with_builtins(),
        )
    }

    #[test]
    fn accepts_text_rule_on_int_property() {
        let report = check(json!([
            {"property": "Age", "rules": [{"id": "text.scramble", "seed": 4}]}
        ]));
        assert!(report.is_ok(), "{:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn reports_binding_errors_with_pointers() {
        let report = check(json!([
            {"property": "phone", "rules": [{"id": "text.redact"}]},
            {"property": "id", "rules": [{"id": "text.redact"}]},
            {"property": "active", "rules": [{"id": "text.redact"}]},
            {"property": "email", "rules": []}
        ]));
        let codes: Vec<_> = report.errors.iter().map(|issue| (issue.code.as_str(), issue.path.as_str())).collect();
        assert_eq!(
            codes,
            [
                ("unknown_property", "/bindings/0/property"),
                ("read_only_property", "/bindings/1/property"),
                ("no_converter", "/bindings/2/rules/0/id"),
                ("empty_rules", "/bindings/3/rules"),
            ]
        );
    }

    #[test]
    fn reports_rule_errors() {
        let report = check(json!([
            {"property": "email", "rules": [
                {"id": "text.nope"},
                {"id": "text.mask", "params": {"keep_start": "two"}},
                {"id": "date.shift", "params": {"max_days": 3}},
                {"id": "text.scramble", "seed": null}
            ]}
        ]));
        assert!(report.has_code("unknown_rule"));
        assert!(report.has_code("invalid_params"));
        assert!(report.has_code("mixed_rule_kinds"));
        assert!(report.has_code("null_seed"));
    }

    #[test]
    fn warns_on_rebinding_and_unused_seed() {
        let report = check(json!([
            {"property": "email", "rules": [{"id": "text.redact"}]},
            {"property": "email", "rules": [{"id": "text.truncate", "params": {"max_len": 3}, "seed": 1}]}
        ]));
        assert!(report.is_ok(), "{:?}", report.errors);
        assert!(report.has_code("rebound_property"));
        assert!(report.has_code("unused_seed"));
    }

    #[test]
    fn rejects_duplicate_properties_and_versions() {
        let mut plan = plan(json!([]));
        plan.plan_version = "9".to_string();
        plan.properties.push(PropertySchema::new("email", ValueKind::Text));
        let report = validate_plan_semantics(
            &plan,
            &RuleCatalog::new(),
            &TypeConverterRegistry::with_builtins(),
        );
        assert!(report.has_code("unsupported_plan_version"));
        assert!(report.has_code("duplicate_property"));
    }
}
