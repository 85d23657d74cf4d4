//! Minimal Executable Step selection.

use crate::dependency::{ActionIndex, DependencyResolver};
use chance_core::{Action, ActionId, EnergyLevel};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A ready action, as handed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyActionView {
    /// The action
    pub action_id: ActionId,
    /// What to do
    pub description: String,
    /// Estimated minutes
    pub duration_min: u32,
    /// Energy required
    pub energy_level: EnergyLevel,
    /// Higher is more urgent
    pub priority: i32,
    /// Always true for now; reserved for manual-start states
    pub available_now: bool,
}

impl From<&Action> for ReadyActionView {
    fn from(action: &Action) -> Self {
        Self {
            action_id: action.id,
            description: action.description.clone(),
            duration_min: action.duration_min,
            energy_level: action.energy_level,
            priority: action.priority,
            available_now: true,
        }
    }
}

/// Compute the ranked set of actions that can be worked on now.
///
/// Done and blocked actions are dropped, as is every action with a
/// dependency that is missing from `actions` or not done. The rest are
/// stably sorted by priority (descending) then duration (ascending).
pub fn select_ready(actions: &[Action]) -> Vec<ReadyActionView> {
    let index = ActionIndex::new(actions);
    let resolver = DependencyResolver::new();

    let mut ready: Vec<&Action> = actions
        .iter()
        .filter(|a| !a.status.is_excluded())
        .filter(|a| resolver.is_satisfied(a, &index))
        .collect();

    ready.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.duration_min.cmp(&b.duration_min))
    });

    debug!(total = actions.len(), ready = ready.len(), "selected ready actions");
    ready.into_iter().map(ReadyActionView::from).collect()
}

/// Strategy for choosing next steps from a snapshot.
pub trait ActionSelector: Send + Sync {
    /// Select ready actions from a snapshot, best first.
    fn select(&self, actions: &[Action]) -> Vec<ReadyActionView>;
}

/// Default selector: [`select_ready`] with an optional cut-off.
#[derive(Debug, Clone, Default)]
pub struct MesSelector {
    /// Keep at most this many results
    limit: Option<usize>,
    /// Drop results below this priority
    min_priority: Option<i32>,
}

impl MesSelector {
    /// Create a selector with no limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `limit` results.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set minimum priority.
    pub fn with_min_priority(mut self, min_priority: i32) -> Self {
        self.min_priority = Some(min_priority);
        self
    }

    /// Apply the cut-offs to an already ranked list.
    pub fn narrow(&self, mut ready: Vec<ReadyActionView>) -> Vec<ReadyActionView> {
        if let Some(min) = self.min_priority {
            ready.retain(|view| view.priority >= min);
        }
        if let Some(limit) = self.limit {
            ready.truncate(limit);
        }
        ready
    }
}

impl ActionSelector for MesSelector {
    fn select(&self, actions: &[Action]) -> Vec<ReadyActionView> {
        self.narrow(select_ready(actions))
    }
}
