use thiserror::Error;

/// Errors raised when an invocation-style action cannot be resolved
/// against the registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvocationError {
    #[error("unknown invocation target: {target}")]
    UnknownTarget { target: String },

    #[error("target {target} has no registered method {method}")]
    UnknownMethod { target: String, method: String },

    #[error("invalid arguments for {target}::{method}: {reason}")]
    InvalidArgs {
        target: String,
        method: String,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum ScheduleError {
    /// A required collaborator was missing at boot. Fatal to startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A cron expression could not be parsed. Fatal to the specific
    /// `is_due`/`next_run` call, never to the polling loop.
    #[error("malformed cron field '{field}' in expression '{expression}'")]
    Format { field: String, expression: String },

    #[error(transparent)]
    Invocation(#[from] InvocationError),

    /// The action raised, or could not be started at all.
    #[error("task execution failed: {0}")]
    Execution(String),

    /// Process-local callables have no wire representation.
    #[error("task {0} holds a process-local callable and cannot be serialized")]
    NonPortableAction(String),

    #[error("driver error: {0}")]
    Driver(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ScheduleError>;
