//! Completion events - the append-only log of attempts on actions.

use crate::error::CoreError;
use crate::id::{ActionId, EventId, GoalId};
use crate::Time;
use serde::{Deserialize, Serialize};

/// An event records the outcome of one attempt at an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionEvent {
    /// Unique identifier
    pub id: EventId,

    /// The action attempted
    pub action_id: ActionId,

    /// The goal owning the action
    pub goal_id: GoalId,

    /// Outcome
    pub status: CompletionStatus,

    /// When it happened
    pub timestamp: Time,

    /// Why it failed, if it did
    #[serde(default)]
    pub failure_reason: Option<String>,
}

impl CompletionEvent {
    /// Create a new event stamped with the current time.
    pub fn new(
        id: EventId,
        action_id: ActionId,
        goal_id: GoalId,
        status: CompletionStatus,
    ) -> Self {
        Self {
            id,
            action_id,
            goal_id,
            status,
            timestamp: chrono::Utc::now(),
            failure_reason: None,
        }
    }

    /// Attach a failure reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }

    /// Override the timestamp.
    pub fn at(mut self, timestamp: Time) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Outcome of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    /// Completed
    Done,
    /// Attempted and failed
    Failed,
    /// Could not be attempted
    Blocked,
}

impl CompletionStatus {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::Done => "done",
            CompletionStatus::Failed => "failed",
            CompletionStatus::Blocked => "blocked",
        }
    }
}

impl std::fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CompletionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "done" => Ok(CompletionStatus::Done),
            "failed" => Ok(CompletionStatus::Failed),
            "blocked" => Ok(CompletionStatus::Blocked),
            _ => Err(CoreError::InvalidValue {
                field: "completion status",
                value: s.to_string(),
            }),
        }
    }
}
