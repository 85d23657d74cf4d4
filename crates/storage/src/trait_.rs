//! Storage trait abstraction.

use async_trait::async_trait;
use chance_core::{
    Action, ActionId, ActionStatus, Breakpoint, CompletionEvent, CompletionStatus, Goal, GoalId,
    Time,
};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Entity kinds that receive integer identifiers from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Goals
    Goal,
    /// Actions
    Action,
    /// Completion events
    Event,
    /// Breakpoints
    Breakpoint,
}

impl EntityKind {
    /// Directory / counter name for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Goal => "goals",
            EntityKind::Action => "actions",
            EntityKind::Event => "events",
            EntityKind::Breakpoint => "breakpoints",
        }
    }
}

/// Filter for listing actions.
#[derive(Debug, Clone, Default)]
pub struct ActionFilter {
    /// Only actions of this goal
    pub goal_id: Option<GoalId>,
    /// Only actions in one of these statuses
    pub status: Option<Vec<ActionStatus>>,
}

impl ActionFilter {
    /// All actions of one goal.
    pub fn for_goal(goal_id: GoalId) -> Self {
        Self {
            goal_id: Some(goal_id),
            ..Default::default()
        }
    }

    /// Whether an action passes the filter.
    pub fn matches(&self, action: &Action) -> bool {
        if let Some(goal_id) = self.goal_id {
            if action.goal_id != goal_id {
                return false;
            }
        }
        if let Some(statuses) = &self.status {
            if !statuses.contains(&action.status) {
                return false;
            }
        }
        true
    }
}

/// Filter for listing completion events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Only events of this goal
    pub goal_id: Option<GoalId>,
    /// Only events of this action
    pub action_id: Option<ActionId>,
    /// Only events with this outcome
    pub status: Option<CompletionStatus>,
    /// Only events at or after this instant
    pub since: Option<Time>,
}

impl EventFilter {
    /// All events of one action.
    pub fn for_action(action_id: ActionId) -> Self {
        Self {
            action_id: Some(action_id),
            ..Default::default()
        }
    }

    /// Whether an event passes the filter.
    pub fn matches(&self, event: &CompletionEvent) -> bool {
        self.goal_id.map_or(true, |id| event.goal_id == id)
            && self.action_id.map_or(true, |id| event.action_id == id)
            && self.status.map_or(true, |s| event.status == s)
            && self.since.map_or(true, |t| event.timestamp >= t)
    }
}

/// Filter for listing breakpoints.
#[derive(Debug, Clone, Default)]
pub struct BreakpointFilter {
    /// Only breakpoints of this action
    pub action_id: Option<ActionId>,
    /// Only breakpoints detected at or after this instant
    pub since: Option<Time>,
}

impl BreakpointFilter {
    /// Whether a breakpoint passes the filter.
    pub fn matches(&self, breakpoint: &Breakpoint) -> bool {
        self.action_id.map_or(true, |id| breakpoint.action_id == id)
            && self.since.map_or(true, |t| breakpoint.detected_at >= t)
    }
}

/// Storage abstraction for Chance data.
///
/// This trait allows different storage backends to be plugged in. Callers
/// read a snapshot through it and hand plain values to the engine.
#[async_trait]
pub trait Storage: Send + Sync {
    // === Identity ===

    /// Allocate the next integer identifier for an entity kind.
    async fn allocate_id(&mut self, kind: EntityKind) -> Result<u64>;

    // === Goal operations ===

    /// Save a goal (create or update).
    async fn save_goal(&mut self, goal: &Goal) -> Result<()>;

    /// Load a goal by ID.
    async fn load_goal(&self, id: GoalId) -> Result<Option<Goal>>;

    /// List all goals ordered by id.
    async fn list_goals(&self) -> Result<Vec<Goal>>;

    /// Delete a goal record. Its actions are left alone.
    async fn delete_goal(&mut self, id: GoalId) -> Result<()>;

    // === Action operations ===

    /// Save an action (create or update).
    async fn save_action(&mut self, action: &Action) -> Result<()>;

    /// Load an action by ID.
    async fn load_action(&self, id: ActionId) -> Result<Option<Action>>;

    /// List actions matching the filter, ordered by id.
    async fn list_actions(&self, filter: &ActionFilter) -> Result<Vec<Action>>;

    /// Delete an action.
    async fn delete_action(&mut self, id: ActionId) -> Result<()>;

    // === Event operations ===

    /// Append a completion event.
    async fn save_event(&mut self, event: &CompletionEvent) -> Result<()>;

    /// List events matching the filter, oldest timestamp first (ties by id).
    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<CompletionEvent>>;

    // === Breakpoint operations ===

    /// Save a breakpoint.
    async fn save_breakpoint(&mut self, breakpoint: &Breakpoint) -> Result<()>;

    /// List breakpoints matching the filter, ordered by id.
    async fn list_breakpoints(&self, filter: &BreakpointFilter) -> Result<Vec<Breakpoint>>;

    /// Delete every breakpoint of an action, returning how many were removed.
    async fn delete_breakpoints(&mut self, action_id: ActionId) -> Result<usize>;

    // === Transaction support ===

    /// Commit pending changes with a message.
    async fn commit(&mut self, message: &str) -> Result<()>;

    /// Discard the pending marker.
    ///
    /// Backends are not required to undo writes; callers that need a clean
    /// slate delete what they wrote before rolling back.
    async fn rollback(&mut self) -> Result<()>;
}
