//! Error types for LoanGraph

/// Result type alias using LoanGraph's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for LoanGraph operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or structurally incomplete policy text
    #[error("schema error: {0}")]
    Schema(String),

    /// Condition operator outside the supported set
    #[error("unknown operator '{operator}' in condition on field '{field}'")]
    UnknownOperator {
        /// The operator token as written in the policy
        operator: String,
        /// Field path of the offending condition
        field: String,
    },

    /// Policy rejected by the linter in strict mode
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new schema error
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    /// Create a new unknown-operator error
    pub fn unknown_operator(operator: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownOperator {
            operator: operator.into(),
            field: field.into(),
        }
    }

    /// Create a new invalid-policy error
    pub fn invalid_policy(msg: impl Into<String>) -> Self {
        Self::InvalidPolicy(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error was raised while loading a policy, before any evaluation
    pub fn is_load_error(&self) -> bool {
        matches!(self, Self::Schema(_) | Self::InvalidPolicy(_))
    }
}
