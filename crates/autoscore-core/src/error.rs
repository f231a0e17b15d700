//! AutoScore error taxonomy.
//!
//! Management operations surface `Validation` before anything is persisted;
//! unknown rule ids on update/delete/toggle are reported as a boolean `false`
//! by the service rather than as `NotFound` bubbling to the caller.
//! Scheduling and execution errors are caught per rule and logged, never
//! propagated across rules.

use thiserror::Error;

/// All errors produced by the AutoScore engine.
#[derive(Debug, Error)]
pub enum AutoScoreError {
    /// Malformed trigger/action value, rejected before a rule is saved.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown rule id.
    #[error("Rule not found: {0}")]
    NotFound(u64),

    /// Rule document could not be persisted (both file and settings fallback).
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// An action or trigger check failed during a rule firing.
    #[error("Execution error: {0}")]
    Execution(String),

    /// Management operation attempted without the required permission.
    #[error("Permission denied")]
    PermissionDenied,

    /// Configuration problem.
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, AutoScoreError>;
