//! Goal model - a user-defined outcome composed of actions.

use serde::{Deserialize, Serialize};
use crate::error::CoreError;
use crate::id::GoalId;
use crate::Time;

/// A goal is the outcome the user wants to reach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    /// Unique identifier
    pub id: GoalId,

    /// Free-text description
    pub description: String,

    /// Whether the outcome is measurable
    #[serde(default = "default_true")]
    pub measurable: bool,

    /// Optional deadline
    #[serde(default)]
    pub time_bound: Option<Time>,

    /// Goal status
    pub status: GoalStatus,

    /// When created
    pub created_at: Time,
}

fn default_true() -> bool {
    true
}

impl Goal {
    /// Create a new active goal.
    pub fn new(id: GoalId, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            measurable: true,
            time_bound: None,
            status: GoalStatus::Active,
            created_at: chrono::Utc::now(),
        }
    }
}

/// Goal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    /// Goal is being worked on
    Active,
    /// Goal reached
    Completed,
    /// Goal is stuck
    Blocked,
    /// Goal was dropped (soft delete)
    Cancelled,
}

impl GoalStatus {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Active => "active",
            GoalStatus::Completed => "completed",
            GoalStatus::Blocked => "blocked",
            GoalStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GoalStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(GoalStatus::Active),
            "completed" => Ok(GoalStatus::Completed),
            "blocked" => Ok(GoalStatus::Blocked),
            "cancelled" => Ok(GoalStatus::Cancelled),
            _ => Err(CoreError::InvalidValue {
                field: "goal status",
                value: s.to_string(),
            }),
        }
    }
}
