//! Action model - the atomic, time-boxed unit of work toward a goal.

use serde::{Deserialize, Serialize};
use crate::error::{CoreError, Result};
use crate::id::{ActionId, GoalId};

/// An action is one concrete step of a goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Unique identifier
    pub id: ActionId,

    /// Owning goal
    pub goal_id: GoalId,

    /// What to do
    pub description: String,

    /// Estimated duration in minutes
    pub duration_min: u32,

    /// Energy the action demands
    pub energy_level: EnergyLevel,

    /// Whether the action cannot be split further
    #[serde(default = "default_true")]
    pub atomic: bool,

    /// Current status
    pub status: ActionStatus,

    /// Higher is more urgent
    #[serde(default)]
    pub priority: i32,

    /// Actions that must be done first
    #[serde(default)]
    pub dependencies: Vec<ActionId>,
}

fn default_true() -> bool {
    true
}

impl Action {
    /// Create a pending action with no dependencies.
    pub fn new(
        id: ActionId,
        goal_id: GoalId,
        description: impl Into<String>,
        duration_min: u32,
        energy_level: EnergyLevel,
    ) -> Self {
        Self {
            id,
            goal_id,
            description: description.into(),
            duration_min,
            energy_level,
            atomic: true,
            status: ActionStatus::Pending,
            priority: 0,
            dependencies: Vec::new(),
        }
    }

    /// Set priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set status.
    pub fn with_status(mut self, status: ActionStatus) -> Self {
        self.status = status;
        self
    }

    /// Set dependencies.
    pub fn with_dependencies(mut self, dependencies: Vec<ActionId>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Check the structural constraints the selector relies on.
    pub fn validate(&self) -> Result<()> {
        if self.duration_min == 0 {
            return Err(CoreError::invalid_action(format!(
                "action {} has a zero duration",
                self.id
            )));
        }
        if self.dependencies.contains(&self.id) {
            return Err(CoreError::invalid_action(format!(
                "action {} depends on itself",
                self.id
            )));
        }
        Ok(())
    }
}

/// Action status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Waiting on dependencies
    Pending,
    /// Can be started
    Available,
    /// Being worked on
    InProgress,
    /// Finished
    Done,
    /// Stuck on something outside the dependency graph
    Blocked,
}

impl ActionStatus {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Pending => "pending",
            ActionStatus::Available => "available",
            ActionStatus::InProgress => "in_progress",
            ActionStatus::Done => "done",
            ActionStatus::Blocked => "blocked",
        }
    }

    /// Done and blocked actions never surface as next steps.
    pub fn is_excluded(&self) -> bool {
        matches!(self, ActionStatus::Done | ActionStatus::Blocked)
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "pending" => Ok(ActionStatus::Pending),
            "available" => Ok(ActionStatus::Available),
            "in_progress" => Ok(ActionStatus::InProgress),
            "done" => Ok(ActionStatus::Done),
            "blocked" => Ok(ActionStatus::Blocked),
            _ => Err(CoreError::InvalidValue {
                field: "action status",
                value: s.to_string(),
            }),
        }
    }
}

/// Energy an action requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyLevel {
    /// Can be done tired
    Low,
    /// Normal focus
    Medium,
    /// Needs full focus
    High,
}

impl EnergyLevel {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EnergyLevel::Low => "low",
            EnergyLevel::Medium => "medium",
            EnergyLevel::High => "high",
        }
    }
}

impl std::fmt::Display for EnergyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EnergyLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(EnergyLevel::Low),
            "medium" => Ok(EnergyLevel::Medium),
            "high" => Ok(EnergyLevel::High),
            _ => Err(CoreError::InvalidValue {
                field: "energy level",
                value: s.to_string(),
            }),
        }
    }
}

/// Parse an encoded dependency list.
///
/// Accepts a JSON array of integers (`[1, 2]`), a comma-separated list
/// (`1,2`) or an empty string. Anything else is [`CoreError::InvalidActionData`].
pub fn parse_dependency_list(raw: &str) -> Result<Vec<ActionId>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    if raw.starts_with('[') {
        let ids: Vec<u64> = serde_json::from_str(raw).map_err(|e| {
            CoreError::invalid_action(format!("malformed dependency list '{}': {}", raw, e))
        })?;
        return Ok(ids.into_iter().map(ActionId::new).collect());
    }

    raw.split(',')
        .map(|part| {
            part.parse::<ActionId>().map_err(|_| {
                CoreError::invalid_action(format!(
                    "malformed dependency '{}' in list '{}'",
                    part.trim(),
                    raw
                ))
            })
        })
        .collect()
}
