//! Runs the `loangraph` binary against the sample policy

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::{json, Value};
use tempfile::TempDir;

fn sample_policy() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../loangraph-policy/tests/fixtures/sample_policy.json")
}

/// Run the binary from an empty directory so no stray config is picked up
fn run(dir: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_loangraph"))
        .args(args)
        .current_dir(dir.path())
        .env_remove("RUST_LOG")
        .output()
        .expect("binary should run")
}

fn write(dir: &TempDir, name: &str, content: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path.to_str().unwrap().to_string()
}

fn applicant(monthly_income: u64) -> Value {
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
fn test_evaluate_prints_decision() {
    let dir = tempfile::tempdir().unwrap();
    let policy = sample_policy();
    let applicant = write(&dir, "applicant.json", &applicant(55000).to_string());

    let output = run(
        &dir,
        &["evaluate", "--policy", policy.to_str().unwrap(), "--applicant", &applicant],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let result: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["final_decision"], "ELIGIBLE");
    assert_eq!(result["reason"], Value::Null);
    assert_eq!(
        result["execution_log"].as_array().unwrap().last().unwrap(),
        "FINAL DECISION: ELIGIBLE"
    );
}

#[test]
fn test_evaluate_unknown_operator_fails_with_partial_log() {
    let dir = tempfile::tempdir().unwrap();
    let text = std::fs::read_to_string(sample_policy())
        .unwrap()
        .replacen("\">=\", \"value\": 21", "\"gte\", \"value\": 21", 1);
    let policy = write(&dir, "policy.json", &text);
    let applicant = write(&dir, "applicant.json", &applicant(55000).to_string());

    let output = run(&dir, &["evaluate", "--policy", &policy, "--applicant", &applicant]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Evaluating rule: age_check"));
    assert!(stderr.contains("gte"));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_batch_keeps_input_order_and_writes_audit() {
    let dir = tempfile::tempdir().unwrap();
    let policy = sample_policy();
    let applicants = format!(
        "{}\n\n{}\n{}\n",
        applicant(55000),
        applicant(20000),
        applicant(31000)
    );
    let applicants = write(&dir, "applicants.jsonl", &applicants);
    let audit = dir.path().join("audit.jsonl");

    let output = run(
        &dir,
        &[
            "batch",
            "--policy",
            policy.to_str().unwrap(),
            "--applicants",
            &applicants,
            "--concurrency",
            "2",
            "--audit",
            audit.to_str().unwrap(),
        ],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let results: Vec<Value> = String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["line"], 1);
    assert_eq!(results[0]["final_decision"], "ELIGIBLE");
    assert_eq!(results[1]["line"], 3);
    assert_eq!(results[1]["final_decision"], "REJECTED");
    assert_eq!(results[1]["reason"], "Income < 30K");
    assert_eq!(results[2]["line"], 4);
    assert_eq!(results[2]["final_decision"], "ELIGIBLE");

    let trail = std::fs::read_to_string(audit).unwrap();
    let records: Vec<Value> = trail.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["policy_id"], "personal_loan_v1");
    assert_eq!(records[0]["previous_hash"], Value::Null);
    assert_eq!(records[1]["previous_hash"], records[0]["hash"]);
}

#[test]
fn test_visualize_exports_graph() {
    let dir = tempfile::tempdir().unwrap();
    let policy = sample_policy();

    let output = run(&dir, &["visualize", "--policy", policy.to_str().unwrap()]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let graph: Value = serde_json::from_slice(&output.stdout).unwrap();
    let nodes = graph["nodes"].as_array().unwrap();
    assert_eq!(nodes[0]["id"], "eligible");
    assert_eq!(nodes[0]["group"], "Terminal");
    assert!(graph["links"]
        .as_array()
        .unwrap()
        .iter()
        .any(|link| link["source"] == "age_check" && link["target"] == "employment_check"));
}

#[test]
fn test_validate_strict_rejects_dangling_reference() {
    let dir = tempfile::tempdir().unwrap();
    let text = std::fs::read_to_string(sample_policy())
        .unwrap()
        .replacen("[\"annual_income_check\"]", "[\"annual_income\"]", 1);
    let policy = write(&dir, "policy.json", &text);

    let lenient = run(&dir, &["validate", "--policy", &policy]);
    assert!(lenient.status.success());
    let stdout = String::from_utf8_lossy(&lenient.stdout);
    assert!(stdout.contains("next rule 'annual_income' does not exist"));
    assert!(stdout.contains("1 warnings"));

    let strict = run(&dir, &["validate", "--policy", &policy, "--strict"]);
    assert!(!strict.status.success());
}

#[test]
fn test_config_file_supplies_policy() {
    let dir = tempfile::tempdir().unwrap();
    let policy = sample_policy();
    write(
        &dir,
        "loangraph.yaml",
        &format!("policy_path: {}\n", policy.to_str().unwrap()),
    );

    let output = run(&dir, &["validate"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("policy 'personal_loan_v1'"));
}

#[test]
fn test_audit_trail_chains_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let policy = sample_policy();
    write(
        &dir,
        "loangraph.yaml",
        &format!(
            "policy_path: {}\naudit:\n  enabled: true\n  path: audit.jsonl\n",
            policy.to_str().unwrap()
        ),
    );
    let single = write(&dir, "applicant.json", &applicant(55000).to_string());
    let many = write(
        &dir,
        "applicants.jsonl",
        &format!("{}\n{}\n", applicant(20000), applicant(40000)),
    );

    for args in [
        ["evaluate", "--applicant", single.as_str()],
        ["evaluate", "--applicant", single.as_str()],
        ["batch", "--applicants", many.as_str()],
    ] {
        let output = run(&dir, &args);
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    }

    let audit = dir.path().join("audit.jsonl");
    let trail = std::fs::read_to_string(&audit).unwrap();
    let records: Vec<Value> = trail.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
    assert_eq!(records.len(), 4);
    assert_eq!(records[0]["previous_hash"], Value::Null);
    for pair in records.windows(2) {
        assert_eq!(pair[1]["previous_hash"], pair[0]["hash"]);
    }
    assert_eq!(records[2]["final_decision"], "REJECTED");

    // an edited trail is not extended
    std::fs::write(&audit, trail.replacen("REJECTED", "ELIGIBLE", 1)).unwrap();
    let output = run(&dir, &["evaluate", "--applicant", &single]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed verification"));
    assert_eq!(std::fs::read_to_string(&audit).unwrap().lines().count(), 4);
}
