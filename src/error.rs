//! Error types for the entity lifecycle dispatch system.
//!
//! None of these errors reach the component that triggered a dispatch under the
//! default configuration. Handler and snapshot failures are contained at the
//! point of invocation and surface only through logs and [`DispatchReceipt`]s.
//!
//! [`DispatchReceipt`]: crate::events::DispatchReceipt

use thiserror::Error;

/// Umbrella error for the crate
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

pub type LifecycleResult<T> = std::result::Result<T, LifecycleError>;

/// Failure raised by a handler callback
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Handler rejected or could not process the event
    #[error("Handler execution failed: {0}")]
    ExecutionFailed(String),

    /// An external collaborator used by the handler failed
    #[error("Collaborator '{collaborator}' failed: {reason}")]
    Collaborator { collaborator: String, reason: String },

    /// Handler panicked (caught by the dispatcher)
    #[error("Handler panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HandlerError {
    pub fn execution_failed(reason: impl Into<String>) -> Self {
        HandlerError::ExecutionFailed(reason.into())
    }

    pub fn collaborator(collaborator: impl Into<String>, reason: impl ToString) -> Self {
        HandlerError::Collaborator {
            collaborator: collaborator.into(),
            reason: reason.to_string(),
        }
    }
}

pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Errors returned from a dispatch call
///
/// Only produced when the dispatcher is configured with
/// [`SyncFailurePolicy::Propagate`](crate::config::SyncFailurePolicy::Propagate).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("Sync handler '{handler}' failed on {event} for {entity_type}: {reason}")]
    SyncHandlerFailed {
        handler: String,
        event: String,
        entity_type: String,
        reason: String,
    },
}

pub type DispatchResult<T> = std::result::Result<T, DispatchError>;

/// Errors from the async execution pool
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("Execution pool '{pool_id}' is shut down")]
    ShutDown { pool_id: String },

    #[error("Execution pool '{pool_id}' queue is full (capacity {capacity})")]
    QueueFull { pool_id: String, capacity: usize },

    #[error("Execution pool '{pool_id}' requires a running tokio runtime")]
    NoRuntime { pool_id: String },
}

/// Errors producing an isolated payload copy
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Snapshot of {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigurationError {
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigurationError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
