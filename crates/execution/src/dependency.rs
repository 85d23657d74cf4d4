//! Dependency resolution for actions.
//!
//! Dependencies are checked one level deep against the current status of
//! the referenced actions. There is no transitive walk, so cyclic
//! references cannot loop: each member of an undone cycle is simply blocked.

use chance_core::{Action, ActionId, ActionStatus};
use std::collections::HashMap;

/// Result of dependency resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// All dependencies satisfied
    Ready,
    /// Blocked by these dependencies, in declaration order
    Blocked(Vec<ActionId>),
}

impl Resolution {
    /// Whether the action may run.
    pub fn is_ready(&self) -> bool {
        matches!(self, Resolution::Ready)
    }
}

/// Lookup of actions by id within one snapshot.
///
/// On duplicate ids the first occurrence wins.
pub struct ActionIndex<'a> {
    by_id: HashMap<ActionId, &'a Action>,
}

impl<'a> ActionIndex<'a> {
    /// Index a snapshot.
    pub fn new(actions: &'a [Action]) -> Self {
        let mut by_id = HashMap::with_capacity(actions.len());
        for action in actions {
            by_id.entry(action.id).or_insert(action);
        }
        Self { by_id }
    }

    /// Find an action in the snapshot.
    pub fn get(&self, id: ActionId) -> Option<&'a Action> {
        self.by_id.get(&id).copied()
    }
}

/// Resolves action dependencies against a snapshot.
pub struct DependencyResolver;

impl DependencyResolver {
    /// Create a new resolver.
    pub fn new() -> Self {
        Self
    }

    /// Check if an action's dependencies are satisfied.
    ///
    /// A dependency is met only when it is present in the index and done.
    /// Dangling references count as unmet.
    pub fn check(&self, action: &Action, index: &ActionIndex<'_>) -> Resolution {
        let unmet: Vec<ActionId> = action
            .dependencies
            .iter()
            .copied()
            .filter(|dep_id| {
                !matches!(
                    index.get(*dep_id).map(|dep| dep.status),
                    Some(ActionStatus::Done)
                )
            })
            .collect();

        if unmet.is_empty() {
            Resolution::Ready
        } else {
            Resolution::Blocked(unmet)
        }
    }

    /// Whether every dependency is met. Stops at the first unmet one.
    pub fn is_satisfied(&self, action: &Action, index: &ActionIndex<'_>) -> bool {
        action.dependencies.iter().all(|dep_id| {
            matches!(
                index.get(*dep_id).map(|dep| dep.status),
                Some(ActionStatus::Done)
            )
        })
    }
}

impl Default for DependencyResolver {
    fn default() -> Self {
        Self::new()
    }
}
