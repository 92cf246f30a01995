//! Typed error hierarchy for jobstatus.
//!
//! Two top-level enums cover the two layers:
//! - `StatusError`: derived-status engine input failures
//! - `TrackerError`: tracker API, auth and storage failures

use thiserror::Error;

/// Errors raised while interpreting raw status or date values.
///
/// The engine's fail-closed entry points never surface these to callers;
/// they are logged and mapped to a neutral classification instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    #[error("Invalid date '{value}': expected YYYY-MM-DD")]
    InvalidDate { value: String },

    #[error("Invalid {kind} status '{value}'")]
    InvalidStatus { kind: &'static str, value: String },
}

/// Errors from the tracker API and storage subsystem.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Project {id} not found")]
    ProjectNotFound { id: i64 },

    #[error("Unit {id} not found")]
    UnitNotFound { id: i64 },

    #[error("Stage {id} not found")]
    StageNotFound { id: i64 },

    #[error("Task {id} not found")]
    TaskNotFound { id: i64 },

    #[error("Assignee {0} not found")]
    AssigneeNotFound(String),

    #[error("User {0} not found")]
    UserNotFound(String),

    #[error("Access token required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("{0} access required")]
    Forbidden(&'static str),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("{0} already exists")]
    Conflict(String),

    #[error(transparent)]
    Status(#[from] StatusError),

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
