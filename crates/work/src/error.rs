//! Application-layer errors.

use chance_core::{ActionId, CoreError, GoalId};
use chance_storage::StorageError;
use crate::decompose::DecomposeError;

/// Result alias for the application layer.
pub type Result<T> = std::result::Result<T, WorkError>;

/// Errors surfaced by the goal manager.
#[derive(Debug, thiserror::Error)]
pub enum WorkError {
    /// No goal with this id
    #[error("Goal not found: {0}")]
    GoalNotFound(GoalId),

    /// No action with this id
    #[error("Action not found: {0}")]
    ActionNotFound(ActionId),

    /// Data rejected before reaching the engine
    #[error(transparent)]
    InvalidActionData(#[from] CoreError),

    /// Storage failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Decomposition failed after retries
    #[error("Decomposition failed: {0}")]
    Decompose(#[from] DecomposeError),

    /// Bad configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
}
