use std::fs;
use std::path::{Path, PathBuf};

use datamask_core::JsonRecord;
use datamask_plan::{
    MaskPlan, PlanError, compile_plan, plan_json_schema_value, validate_plan, validate_plan_json,
};
use datamask_rules::RuleCatalog;
use serde_json::{Value, json};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn load_json(path: &Path) -> Value {
    let contents =
        fs::read_to_string(path).unwrap_or_else(|_| panic!("missing json at {}", path.display()));
    serde_json::from_str(&contents).expect("parse json")
}

fn plan_schema() -> Value {
    plan_json_schema_value().expect("plan schema")
}

#[test]
fn customers_plan_validates_against_schema() {
    let plan_json = load_json(&fixture("customers.plan.json"));

    let structural = validate_plan_json(&plan_json, &plan_schema()).expect("validate plan json schema");
    assert!(structural.errors.is_empty(), "structural errors found: {:?}", structural.errors);

    let validated = validate_plan(&plan_json, &plan_schema(), &RuleCatalog::new())
        .expect("plan validation should succeed");
    assert!(validated.warnings.is_empty(), "unexpected warnings: {:?}", validated.warnings);
    assert_eq!(validated.plan.bindings.len(), 7);
}

#[test]
fn schema_rejects_structural_mistakes() {
    let plan_json = json!({
        "plan_version": "0.1",
        "coverage": "sometimes",
        "properties": [{"name": "email", "kind": "varchar"}],
        "bindings": [{"property": "email"}]
    });
    let report = validate_plan_json(&plan_json, &plan_schema()).expect("schema compiles");
    assert!(!report.is_ok());
    assert!(report.errors.iter().all(|issue| issue.code == "schema_violation"));
    assert!(report.errors.iter().any(|issue| issue.path.starts_with("/properties/0")));
}

#[test]
fn semantic_errors_come_back_as_a_report() {
    let plan_json = json!({
        "plan_version": "0.1",
        "properties": [
            {"name": "email", "kind": "text"},
            {"name": "age", "kind": "int"}
        ],
        "bindings": [
            {"property": "mail", "rules": [{"id": "text.redact"}]},
            {"property": "email", "rules": [{"id": "text.shuffle"}]},
            {"property": "age", "rules": [
                {"id": "numeric.noise", "params": {"max": 2}},
                {"id": "text.redact"}
            ]},
            {"property": "email", "rules": [{"id": "text.scramble", "seed": null}]}
        ]
    });
    let report = validate_plan(&plan_json, &plan_schema(), &RuleCatalog::new())
        .expect_err("invalid plan");
    assert!(report.has_code("unknown_property"));
    assert!(report.has_code("unknown_rule"));
    assert!(report.has_code("mixed_rule_kinds"));
    assert!(report.has_code("null_seed"));
    assert!(
        report
            .errors
            .iter()
            .any(|issue| issue.path == "/bindings/1/rules/0/id")
    );
}

#[test]
fn compile_refuses_invalid_plans() {
    let plan: MaskPlan = serde_json::from_value(json!({
        "plan_version": "0.1",
        "properties": [{"name": "active", "kind": "bool"}],
        "bindings": [{"property": "active", "rules": [{"id": "text.redact"}]}]
    }))
    .expect("plan");
    let err = compile_plan(&plan, &RuleCatalog::new()).expect_err("bool has no text converter");
    match err {
        PlanError::Invalid(report) => assert!(report.has_code("no_converter")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn compiled_plan_masks_customer_records() {
    let plan: MaskPlan =
        serde_json::from_value(load_json(&fixture("customers.plan.json"))).expect("plan");
    let masker = compile_plan(&plan, &RuleCatalog::new()).expect("compile");

    let records: Vec<JsonRecord> = load_json(&fixture("customers.records.json"))
        .as_array()
        .expect("array of records")
        .iter()
        .map(|value| JsonRecord::from_value(value.clone()).expect("object"))
        .collect();
    let results = masker.mask_all(&records).expect("mask");
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|result| result.is_success()), "{results:?}");

    let first: Value = serde_json::from_str(results[0].masked_data()).expect("json");
    let second: Value = serde_json::from_str(results[1].masked_data()).expect("json");

    assert_eq!(first["id"], json!(""));
    assert_eq!(first["name"], json!("[name]"));
    assert_eq!(first["email"], json!("m*********a@example.com"));
    assert_eq!(first["cpf"], json!("###.###.###-09"));
    assert_eq!(first["birth_date"], json!("1987-01-01"));
    assert_eq!(first["active"], json!(false));

    let age = first["age"].as_i64().expect("age stays an integer");
    assert!((34..=40).contains(&age), "age {age}");
    assert_eq!(first["age"], second["age"], "equal inputs mask alike with per_value seeds");

    let salary = first["salary"].as_f64().expect("salary is a number");
    assert_eq!(salary % 100.0, 0.0);

    assert_eq!(second["email"], Value::Null);
    assert_eq!(second["last_login"], Value::Null);
    assert_eq!(second["cpf"], json!("###.###.###-00"));

    let again = masker.mask_all(&records).expect("mask again");
    assert_eq!(again, results, "seeded plans are reproducible");
}
