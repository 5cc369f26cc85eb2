//! Subcommand handlers

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use loangraph_core::{DecisionResult, Error, EvaluationFailure};
use loangraph_policy::{ensure_clean, lint, to_visual_graph, PolicyEngine, PolicyGraph};
use loangraph_telemetry::DecisionAuditTrail;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::CliConfig;

/// Evaluate one applicant and print the decision to stdout
pub async fn evaluate(config: &CliConfig, applicant_path: &Path) -> Result<()> {
    let engine = load_engine(config)?;

    let text = tokio::fs::read_to_string(applicant_path)
        .await
        .with_context(|| format!("reading applicant {}", applicant_path.display()))?;
    let applicant: Value = serde_json::from_str(&text)
        .with_context(|| format!("parsing applicant {}", applicant_path.display()))?;

    let outcome = engine.evaluate(&applicant);

    if let Some(mut trail) = open_audit(config)? {
        match &outcome {
            Ok(result) => trail.record_decision(engine.graph().id(), result),
            Err(failure) => trail.record_failure(engine.graph().id(), failure),
        };
        write_audit(config, &mut trail)?;
    }

    match outcome {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(failure) => {
            for line in &failure.execution_log {
                eprintln!("{}", line);
            }
            Err(failure.into())
        }
    }
}

/// One line of batch output
#[derive(Debug, Serialize)]
struct BatchRecord {
    /// 1-based line number in the applicants file
    line: usize,

    #[serde(flatten)]
    outcome: BatchOutcome,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum BatchOutcome {
    Decision(DecisionResult),
    Failed {
        error: String,
        execution_log: Vec<String>,
    },
}

/// Evaluate every applicant in a JSON-lines file
///
/// Evaluations run on the blocking pool, at most `batch.concurrency` at a
/// time. Results are written in input order.
pub async fn batch(config: &CliConfig, applicants_path: &Path, output: Option<&Path>) -> Result<()> {
    let engine = load_engine(config)?;
    let mut trail = open_audit(config)?;
    let started = Instant::now();

    let text = tokio::fs::read_to_string(applicants_path)
        .await
        .with_context(|| format!("reading applicants {}", applicants_path.display()))?;

    let mut applicants = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let applicant: Value = serde_json::from_str(line)
            .with_context(|| format!("parsing applicant on line {}", idx + 1))?;
        applicants.push((idx + 1, applicant));
    }

    info!(
        applicants = applicants.len(),
        concurrency = config.batch.concurrency,
        "Starting batch evaluation"
    );

    let semaphore = Arc::new(Semaphore::new(config.batch.concurrency));
    let mut handles = Vec::with_capacity(applicants.len());

    for (line, applicant) in applicants {
        let permit = Arc::clone(&semaphore).acquire_owned().await?;
        let engine = engine.clone();

        handles.push((
            line,
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                engine.evaluate(&applicant)
            }),
        ));
    }

    let mut records = Vec::with_capacity(handles.len());
    let mut rejected = 0usize;
    let mut failed = 0usize;

    for (line, handle) in handles {
        let evaluated = handle.await.map_err(|e| {
            Error::internal(format!("evaluation task for line {} failed: {}", line, e))
        })?;
        let outcome = match evaluated {
            Ok(result) => {
                if let Some(trail) = trail.as_mut() {
                    trail.record_decision(engine.graph().id(), &result);
                }
                if result.is_rejected() {
                    rejected += 1;
                }
                BatchOutcome::Decision(result)
            }
            Err(failure) => {
                if let Some(trail) = trail.as_mut() {
                    trail.record_failure(engine.graph().id(), &failure);
                }
                warn!(line, error = %failure.error, "Applicant evaluation failed");
                failed += 1;
                failed_outcome(failure)
            }
        };
        records.push(BatchRecord { line, outcome });
    }

    let mut out = String::new();
    for record in &records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    write_output(output, &out)?;

    if let Some(mut trail) = trail {
        write_audit(config, &mut trail)?;
    }

    info!(
        evaluated = records.len(),
        rejected,
        failed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Batch evaluation complete"
    );
    Ok(())
}

fn failed_outcome(failure: EvaluationFailure) -> BatchOutcome {
    BatchOutcome::Failed {
        error: failure.error.to_string(),
        execution_log: failure.execution_log,
    }
}

/// Export the policy as a node/link graph
pub fn visualize(config: &CliConfig, output: Option<&Path>) -> Result<()> {
    let graph = load_graph(config)?;
    let visual = to_visual_graph(&graph);

    info!(
        nodes = visual.nodes.len(),
        links = visual.links.len(),
        "Policy graph exported"
    );

    let mut json = serde_json::to_string_pretty(&visual)?;
    json.push('\n');
    write_output(output, &json)
}

/// Report authoring problems and a short summary of the policy
pub fn validate(config: &CliConfig) -> Result<()> {
    let graph = load_graph(config)?;
    let warnings = lint(&graph);

    for warning in &warnings {
        println!("warning: {}", warning);
    }

    println!(
        "policy '{}' ({}): {} chains, {} rules, {} terminal nodes, {} warnings",
        graph.id(),
        graph.name(),
        graph.chains().len(),
        graph.rule_count(),
        graph.terminal_nodes().len(),
        warnings.len()
    );

    if config.strict && !warnings.is_empty() {
        anyhow::bail!("policy '{}' has {} warnings", graph.id(), warnings.len());
    }
    Ok(())
}

fn load_graph(config: &CliConfig) -> Result<PolicyGraph> {
    let graph = PolicyGraph::from_file(&config.policy_path)
        .with_context(|| format!("loading policy {}", config.policy_path))?;

    info!(
        policy = %graph.id(),
        chains = graph.chains().len(),
        rules = graph.rule_count(),
        "Policy loaded"
    );
    Ok(graph)
}

fn load_engine(config: &CliConfig) -> Result<PolicyEngine> {
    let graph = load_graph(config)?;

    if config.strict {
        ensure_clean(&graph)?;
    } else {
        for warning in lint(&graph) {
            warn!(policy = %graph.id(), "{}", warning);
        }
    }

    Ok(PolicyEngine::new(graph).with_decision_mode(config.decision_mode))
}

/// Existing audit trail to extend, when auditing is enabled
///
/// Refuses to extend a file whose chain no longer verifies.
fn open_audit(config: &CliConfig) -> Result<Option<DecisionAuditTrail>> {
    if !config.audit.enabled {
        return Ok(None);
    }

    let trail = DecisionAuditTrail::open(&config.audit.path)
        .with_context(|| format!("reading audit trail {}", config.audit.path))?;
    if !trail.verify() {
        anyhow::bail!("audit trail {} failed verification", config.audit.path);
    }
    Ok(Some(trail))
}

fn write_audit(config: &CliConfig, trail: &mut DecisionAuditTrail) -> Result<()> {
    let appended = trail.pending();
    trail
        .write_json_lines(&config.audit.path)
        .with_context(|| format!("writing audit trail {}", config.audit.path))?;
    debug!(path = %config.audit.path, appended, total = trail.len(), "Audit trail written");
    Ok(())
}

fn write_output(output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, content)
            .with_context(|| format!("writing {}", path.display()))?,
        None => std::io::stdout().lock().write_all(content.as_bytes())?,
    }
    Ok(())
}
