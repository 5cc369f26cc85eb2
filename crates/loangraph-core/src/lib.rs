//! LoanGraph Core
//!
//! Core types and error handling shared across LoanGraph components.
//!
//! This crate provides:
//! - The error type and result alias used by every library crate
//! - Evaluation output types (decision result, chain status)
//! - The per-evaluation execution log
//! - Metric names shared by the engine and the binary

pub mod error;
pub mod instrumentation;
pub mod types;

pub use error::{Error, Result};
pub use types::{
    ChainStatus, DecisionResult, EvaluationFailure, ExecutionLog, DEFAULT_FAIL_REASON, REJECTED,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{ChainStatus, DecisionResult, EvaluationFailure, ExecutionLog};
}
