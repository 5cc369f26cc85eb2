//! End-to-end evaluation tests against the sample personal loan policy

use std::sync::Arc;
use std::thread;

use loangraph_policy::prelude::*;
use serde_json::{json, Value};

const SAMPLE_POLICY: &str = include_str!("fixtures/sample_policy.json");

fn sample_engine() -> PolicyEngine {
    PolicyEngine::from_json(SAMPLE_POLICY).expect("sample policy should load")
}

fn salaried_applicant(monthly_income: u64) -> Value {
    json!({
        "applicant": {
            "age": 28,
            "employment_type": "SALARIED",
            "monthly_income": monthly_income,
            "credit_score": 745
        }
    })
}

#[test]
fn test_eligible_salaried_applicant() {
    let result = sample_engine().evaluate(&salaried_applicant(55000)).unwrap();

    assert_eq!(result.final_decision, "ELIGIBLE");
    assert_eq!(result.reason, None);

    let log = result.execution_log.join("\n");
    assert!(log.contains("Age Check"));
    assert!(log.contains("Credit Score Check"));
    assert!(log.contains("Branch taken: Salaried"));
    assert!(log.contains("Reached terminal: eligible (ELIGIBLE)"));
    assert_eq!(result.execution_log.last().unwrap(), "FINAL DECISION: ELIGIBLE");
}

#[test]
fn test_low_income_rejected() {
    let result = sample_engine().evaluate(&salaried_applicant(20000)).unwrap();

    assert_eq!(result.final_decision, "REJECTED");
    assert_eq!(result.reason.as_deref(), Some("Income < 30K"));

    let log = result.execution_log.join("\n");
    assert!(log.contains("Income Check"));
    assert!(log.contains("Income < 30K"));
    assert!(!log.contains("Bureau Checks"));
    assert!(!log.contains("Credit Score Check"));
}

#[test]
fn test_self_employed_branch() {
    let applicant = json!({
        "applicant": {
            "age": 45,
            "employment_type": "SELF_EMPLOYED",
            "business_vintage_years": 5,
            "annual_income": 900000,
            "credit_score": 710,
            "fraud_flag": false
        }
    });

    let result = sample_engine().evaluate(&applicant).unwrap();
    let log = result.execution_log.join("\n");

    assert_eq!(result.final_decision, "ELIGIBLE");
    assert!(log.contains("Branch taken: Self Employed"));
    assert!(log.contains("Business Vintage Check"));
    assert!(!log.contains("Evaluating rule: income_check"));
}

#[test]
fn test_missing_vintage_rejects_with_incompatible_note() {
    let applicant = json!({
        "applicant": {
            "age": 45,
            "employment_type": "SELF_EMPLOYED",
            "business_vintage_years": null,
            "credit_score": 710
        }
    });

    let result = sample_engine().evaluate(&applicant).unwrap();

    assert!(result.is_rejected());
    assert_eq!(result.reason.as_deref(), Some("Business vintage < 3 years"));
    assert!(result
        .execution_log
        .iter()
        .any(|line| line.contains("Incompatible comparison on 'applicant.business_vintage_years'")));
}

#[test]
fn test_fraud_flag_rejects_in_second_chain() {
    let mut applicant = salaried_applicant(55000);
    applicant["applicant"]["fraud_flag"] = json!(true);

    let result = sample_engine().evaluate(&applicant).unwrap();
    assert_eq!(result.reason.as_deref(), Some("Fraud flag raised"));
    assert!(result.execution_log.iter().any(|line| line == "=== Executing chain: Bureau Checks ==="));
}

#[test]
fn test_dangling_next_rule_is_warning() {
    let policy = r#"{
        "id": "dangling",
        "name": "Dangling Reference",
        "chains": [{
            "id": "c1",
            "name": "Only",
            "rulesets": [{
                "id": "rs1",
                "name": "Rules",
                "rules": [{
                    "id": "start",
                    "name": "Start",
                    "conditions": [],
                    "action": {"on_true": {"next_rules": ["does_not_exist"]}}
                }]
            }]
        }],
        "terminal_nodes": [{"id": "ok", "decision": "APPROVED"}]
    }"#;

    let result = PolicyEngine::from_json(policy)
        .unwrap()
        .evaluate(&json!({}))
        .unwrap();

    assert_eq!(result.final_decision, "APPROVED");
    assert!(result
        .execution_log
        .iter()
        .any(|line| line.contains("Missing rule") && line.contains("does_not_exist")));
}

#[test]
fn test_repeated_runs_do_not_accumulate() {
    let engine = sample_engine();
    let applicant = salaried_applicant(55000);

    let first = engine.evaluate(&applicant).unwrap();
    let second = engine.evaluate(&applicant).unwrap();

    assert_eq!(first.execution_log.len(), second.execution_log.len());
    assert_eq!(first, second);
}

#[test]
fn test_concurrent_evaluations_share_graph() {
    let engine = Arc::new(sample_engine());

    let handles: Vec<_> = [55000, 20000, 31000, 10000]
        .into_iter()
        .map(|income| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.evaluate(&salaried_applicant(income)).unwrap())
        })
        .collect();

    let decisions: Vec<String> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap().final_decision)
        .collect();

    assert_eq!(decisions, vec!["ELIGIBLE", "REJECTED", "ELIGIBLE", "REJECTED"]);
}

#[test]
fn test_unknown_operator_is_not_a_decision() {
    let policy = SAMPLE_POLICY.replace(
        r#""operator": ">=", "value": 700"#,
        r#""operator": "gte", "value": 700"#,
    );
    let engine = PolicyEngine::from_json(&policy).unwrap();

    let failure = engine.evaluate(&salaried_applicant(55000)).unwrap_err();
    assert!(failure.to_string().contains("unknown operator 'gte'"));
    assert!(failure
        .execution_log
        .iter()
        .any(|line| line.contains("Credit Score Check")));
    assert!(!failure.execution_log.iter().any(|line| line.starts_with("FINAL DECISION")));
}

#[test]
fn test_schema_errors_are_load_failures() {
    let err = PolicyEngine::from_json(r#"{"id": "p"}"#).unwrap_err();
    assert!(err.is_load_error());

    let overlapping = SAMPLE_POLICY.replace(
        r#""on_true": { "next_rules": ["fraud_check"] }"#,
        r#""on_true": { "next_rules": ["fraud_check"], "next_ruleset": "bureau" }"#,
    );
    assert!(PolicyEngine::from_json(&overlapping).is_err());
}
