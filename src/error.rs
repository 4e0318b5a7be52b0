//! Error types for worklog
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad input, missing record, timer state conflict)
//! - 3: Blocked by policy (actor not allowed to touch the record)
//! - 4: Operation failed (hierarchy corruption, I/O, lock contention)

use std::path::PathBuf;
use thiserror::Error;

use crate::model::{EntryId, ProjectId, TaskId, UserId};

/// Exit codes for the wl CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const POLICY_BLOCKED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for worklog operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No worklog found from {0}")]
    NotInitialized(PathBuf),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Time entry not found: {0}")]
    TimeEntryNotFound(EntryId),

    #[error("Project not found: {0}")]
    ProjectNotFound(ProjectId),

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Timer is already running for task {task_id} (entry {entry_id})")]
    AlreadyRunning { task_id: TaskId, entry_id: EntryId },

    #[error("No running timer found for task {0}")]
    NoRunningEntry(TaskId),

    // Policy blocks (exit code 3)
    #[error("Access denied: {actor} may not {action}")]
    Unauthorized { actor: String, action: String },

    // Operation failures (exit code 4)
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    pub(crate) fn unauthorized(actor: impl Into<String>, action: impl Into<String>) -> Self {
        Error::Unauthorized {
            actor: actor.into(),
            action: action.into(),
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::InvalidArgument(_)
            | Error::InvalidConfig(_)
            | Error::NotInitialized(_)
            | Error::TaskNotFound(_)
            | Error::TimeEntryNotFound(_)
            | Error::ProjectNotFound(_)
            | Error::UserNotFound(_)
            | Error::AlreadyRunning { .. }
            | Error::NoRunningEntry(_) => exit_codes::USER_ERROR,

            // Policy blocks
            Error::Unauthorized { .. } => exit_codes::POLICY_BLOCKED,

            // Operation failures
            Error::DataIntegrity(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Stable machine-readable name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Unauthorized { .. } => "unauthorized",
            Error::AlreadyRunning { .. } => "already_running",
            Error::NoRunningEntry(_) => "no_running_entry",
            Error::TaskNotFound(_)
            | Error::TimeEntryNotFound(_)
            | Error::ProjectNotFound(_)
            | Error::UserNotFound(_) => "not_found",
            Error::DataIntegrity(_) => "data_integrity",
            Error::InvalidArgument(_) => "validation",
            Error::InvalidConfig(_) => "invalid_config",
            Error::NotInitialized(_) => "not_initialized",
            Error::LockFailed(_) => "lock_failed",
            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::OperationFailed(_) => "operation_failed",
        }
    }

    /// Structured details for JSON error output
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::AlreadyRunning { task_id, entry_id } => Some(serde_json::json!({
                "task_id": task_id,
                "entry_id": entry_id,
            })),
            Error::NoRunningEntry(task_id) => Some(serde_json::json!({ "task_id": task_id })),
            Error::Unauthorized { actor, action } => Some(serde_json::json!({
                "actor": actor,
                "action": action,
            })),
            Error::TaskNotFound(id) => Some(serde_json::json!({ "task_id": id })),
            Error::TimeEntryNotFound(id) => Some(serde_json::json!({ "entry_id": id })),
            Error::ProjectNotFound(id) => Some(serde_json::json!({ "project_id": id })),
            Error::UserNotFound(id) => Some(serde_json::json!({ "user_id": id })),
            Error::LockFailed(path) | Error::NotInitialized(path) => Some(serde_json::json!({
                "path": path.to_string_lossy(),
            })),
            _ => None,
        }
    }
}

/// Result type alias for worklog operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error body of the JSON output envelope
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub message: String,
    pub code: i32,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            message: err.to_string(),
            code: err.exit_code(),
            kind: err.kind(),
            details: err.details(),
        }
    }
}
