//! Error types for vaultkeeper

use thiserror::Error;

/// Result type alias using VaultkeeperError
pub type Result<T> = std::result::Result<T, VaultkeeperError>;

/// Error type alias for convenience
pub type Error = VaultkeeperError;

/// Exit codes for CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const NOT_FOUND: i32 = 2;
    pub const INVALID_INPUT: i32 = 3;
    pub const REFUSED: i32 = 4;
    pub const INTERNAL_BUG: i32 = 70;
}

/// Main error type for vaultkeeper
#[derive(Debug, Error)]
pub enum VaultkeeperError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A required table or column is missing or unreadable
    #[error("Data access error on table '{table}': {reason}")]
    DataAccess { table: String, reason: String },

    /// A reference landed in more than one ownership class, or in none.
    /// Set-based classification makes this unreachable; seeing it is a bug.
    #[error("Classification inconsistency for owner reference {reference}: {classes}")]
    ClassificationInconsistency { reference: i64, classes: String },

    /// The database rejected a generated statement
    #[error("Execution of '{action}' failed: {message}")]
    Execution { action: String, message: String },

    #[error("Action {index} cannot be executed: {reason}")]
    ActionNotExecutable { index: usize, reason: String },

    #[error("Action not found: {0}")]
    ActionNotFound(usize),

    #[error("Confirmation rejected: {0}")]
    ConfirmationRejected(String),

    #[error("Cleanup is blocked: {0} active characters show signs of cleanup damage")]
    CleanupBlocked(usize),

    #[error("Plan is stale: {0}")]
    StalePlan(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl VaultkeeperError {
    /// Build a data access error for a table
    pub fn data_access(table: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataAccess {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ActionNotFound(_) => exit_codes::NOT_FOUND,
            Self::InvalidInput(_) | Self::Config(_) => exit_codes::INVALID_INPUT,
            Self::ActionNotExecutable { .. }
            | Self::ConfirmationRejected(_)
            | Self::CleanupBlocked(_)
            | Self::StalePlan(_) => exit_codes::REFUSED,
            Self::ClassificationInconsistency { .. } => exit_codes::INTERNAL_BUG,
            _ => exit_codes::GENERAL_ERROR,
        }
    }
}
