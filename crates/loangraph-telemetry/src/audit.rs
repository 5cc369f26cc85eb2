//! Cryptographic decision audit trail

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use loangraph_core::{DecisionResult, EvaluationFailure, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

/// Audit trail with hash-chained decision records for tamper detection
///
/// A trail opened from a JSON-lines file continues that file's chain: new
/// records link to the last stored hash, and writing appends only the
/// records the file does not hold yet.
#[derive(Debug, Default)]
pub struct DecisionAuditTrail {
    records: Vec<DecisionRecord>,
    chain_hash: Option<String>,
    /// Records already present in the backing file
    persisted: usize,
}

impl DecisionAuditTrail {
    /// Create a new audit trail
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a trail from JSON lines, continuing its chain
    pub fn from_json_lines(text: &str) -> Result<Self> {
        let mut records = Vec::new();
        for line in text.lines().filter(|line| !line.trim().is_empty()) {
            records.push(serde_json::from_str::<DecisionRecord>(line)?);
        }

        let chain_hash = records.last().and_then(|record| record.hash.clone());
        let persisted = records.len();
        Ok(Self {
            records,
            chain_hash,
            persisted,
        })
    }

    /// Load the trail stored at `path`, or start an empty one if the file does not exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }

        let trail = Self::from_json_lines(&fs::read_to_string(path)?)?;
        debug!(path = %path.display(), records = trail.len(), "Audit trail loaded");
        Ok(trail)
    }

    /// Append a completed decision
    pub fn record_decision(&mut self, policy_id: &str, result: &DecisionResult) -> &DecisionRecord {
        self.append(DecisionRecord::new(
            policy_id,
            AuditOutcome::Decision {
                final_decision: result.final_decision.clone(),
                reason: result.reason.clone(),
            },
            result.execution_log.len(),
        ))
    }

    /// Append an aborted evaluation
    pub fn record_failure(&mut self, policy_id: &str, failure: &EvaluationFailure) -> &DecisionRecord {
        self.append(DecisionRecord::new(
            policy_id,
            AuditOutcome::Error {
                message: failure.error.to_string(),
            },
            failure.execution_log.len(),
        ))
    }

    fn append(&mut self, mut record: DecisionRecord) -> &DecisionRecord {
        record.previous_hash = self.chain_hash.clone();

        let hash = compute_hash(&record);
        record.hash = Some(hash.clone());
        debug!(evaluation_id = %record.evaluation_id, hash = %hash, "Audit record appended");

        self.chain_hash = Some(hash);
        self.records.push(record);
        // just pushed
        &self.records[self.records.len() - 1]
    }

    /// Verify the integrity of the trail
    pub fn verify(&self) -> bool {
        let mut prev_hash: Option<String> = None;

        for record in &self.records {
            if record.previous_hash != prev_hash {
                return false;
            }

            let computed = compute_hash(record);
            if record.hash.as_ref() != Some(&computed) {
                return false;
            }

            prev_hash = record.hash.clone();
        }

        true
    }

    /// All records in append order
    pub fn records(&self) -> &[DecisionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serialize the trail as JSON lines
    pub fn to_json_lines(&self) -> Result<String> {
        let mut out = String::new();
        for record in &self.records {
            out.push_str(&serde_json::to_string(record)?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Append records not yet stored to a JSON-lines file, creating it if needed
    ///
    /// Use on a trail obtained from [`DecisionAuditTrail::open`] for the same
    /// path, so the file stays a single chain.
    pub fn write_json_lines(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let mut out = String::new();
        for record in &self.records[self.persisted..] {
            out.push_str(&serde_json::to_string(record)?);
            out.push('\n');
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(out.as_bytes())?;
        self.persisted = self.records.len();
        Ok(())
    }

    /// Records not yet written to the backing file
    pub fn pending(&self) -> usize {
        self.records.len() - self.persisted
    }
}

/// What an audited evaluation produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum AuditOutcome {
    Decision {
        final_decision: String,
        reason: Option<String>,
    },
    Error {
        message: String,
    },
}

/// A single audited evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Unique id of the evaluation
    pub evaluation_id: String,

    /// Policy the applicant was evaluated against
    pub policy_id: String,

    #[serde(flatten)]
    pub outcome: AuditOutcome,

    /// Number of execution log lines produced
    pub log_lines: usize,

    pub timestamp: DateTime<Utc>,

    /// Hash of this record
    pub hash: Option<String>,

    /// Hash of the previous record (for chaining)
    pub previous_hash: Option<String>,
}

impl DecisionRecord {
    fn new(policy_id: &str, outcome: AuditOutcome, log_lines: usize) -> Self {
        Self {
            evaluation_id: Uuid::new_v4().to_string(),
            policy_id: policy_id.to_string(),
            outcome,
            log_lines,
            timestamp: Utc::now(),
            hash: None,
            previous_hash: None,
        }
    }
}

/// Hash of a record, excluding its own hash field
fn compute_hash(record: &DecisionRecord) -> String {
    let mut hasher = Sha256::new();

    hasher.update(record.evaluation_id.as_bytes());
    hasher.update(record.policy_id.as_bytes());
    match &record.outcome {
        AuditOutcome::Decision {
            final_decision,
            reason,
        } => {
            hasher.update(final_decision.as_bytes());
            if let Some(reason) = reason {
                hasher.update(reason.as_bytes());
            }
        }
        AuditOutcome::Error { message } => hasher.update(message.as_bytes()),
    }
    hasher.update(record.log_lines.to_le_bytes());
    hasher.update(record.timestamp.to_rfc3339().as_bytes());
    if let Some(ref prev) = record.previous_hash {
        hasher.update(prev.as_bytes());
    }

    format!("{:x}", hasher.finalize())
}
