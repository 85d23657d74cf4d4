//! Goal progress tracking.

use chance_core::{Action, ActionStatus};
use chance_execution::select_ready;
use serde::{Deserialize, Serialize};

/// Progress of one goal, computed from its actions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalProgress {
    /// Actions under the goal
    pub total: usize,
    /// Done actions
    pub done: usize,
    /// Blocked actions
    pub blocked: usize,
    /// Actions that could be started now
    pub ready: usize,
    /// Percentage complete (0-100)
    pub percentage: f32,
}

/// Calculate goal progress from a snapshot of its actions.
pub fn goal_progress(actions: &[Action]) -> GoalProgress {
    let total = actions.len();
    let done = actions.iter().filter(|a| a.status == ActionStatus::Done).count();
    let blocked = actions.iter().filter(|a| a.status == ActionStatus::Blocked).count();

    let percentage = if total > 0 {
        (done as f32 / total as f32) * 100.0
    } else {
        0.0
    };

    GoalProgress {
        total,
        done,
        blocked,
        ready: select_ready(actions).len(),
        percentage,
    }
}
