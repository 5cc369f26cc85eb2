//! LoanGraph Telemetry
//!
//! Audit functionality for LoanGraph evaluations.
//!
//! Provides a hash-chained trail of decisions so that a stored sequence of
//! evaluations can be checked for tampering.

pub mod audit;

pub use audit::{AuditOutcome, DecisionAuditTrail, DecisionRecord};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::audit::{AuditOutcome, DecisionAuditTrail, DecisionRecord};
}
