//! Breakpoint detection.
//!
//! Groups failed completion events per action and classifies every action
//! that failed at least [`FAILURE_THRESHOLD`] times by the cause named in its
//! first failure reason.

use chance_core::{
    ActionId, Breakpoint, BreakpointId, BreakpointPattern, CompletionEvent, CompletionStatus, Time,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Failures needed before an action counts as a breakpoint.
pub const FAILURE_THRESHOLD: usize = 2;

/// A breakpoint found in an event snapshot, not yet stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakpointCandidate {
    /// The failing action
    pub action_id: ActionId,
    /// Number of failed events
    pub failure_count: usize,
    /// Classified from the first failure reason
    pub pattern: BreakpointPattern,
    /// Every failure reason in input order, missing ones included
    pub reasons: Vec<Option<String>>,
}

impl BreakpointCandidate {
    /// Turn the candidate into a stored record.
    pub fn into_breakpoint(self, id: BreakpointId, detected_at: Time) -> Breakpoint {
        Breakpoint {
            id,
            action_id: self.action_id,
            failure_count: self.failure_count,
            pattern: self.pattern,
            reasons: self.reasons,
            detected_at,
        }
    }
}

/// Classify a failure reason.
///
/// Missing or empty reasons are `time`. Otherwise the first keyword found in
/// the order `energy`, `clarity`, `external` decides, falling back to `time`.
pub fn classify_pattern(reason: Option<&str>) -> BreakpointPattern {
    let Some(reason) = reason.filter(|r| !r.is_empty()) else {
        return BreakpointPattern::Time;
    };

    if reason.contains("energy") {
        BreakpointPattern::Energy
    } else if reason.contains("clarity") {
        BreakpointPattern::Clarity
    } else if reason.contains("external") {
        BreakpointPattern::External
    } else {
        BreakpointPattern::Time
    }
}

/// Detect breakpoints in a snapshot of completion events.
///
/// Output follows the order in which each action's first failure appears
/// in `events`.
pub fn detect_breakpoints(events: &[CompletionEvent]) -> Vec<BreakpointCandidate> {
    let mut order: Vec<ActionId> = Vec::new();
    let mut failures: HashMap<ActionId, Vec<&CompletionEvent>> = HashMap::new();

    for event in events.iter().filter(|e| e.status == CompletionStatus::Failed) {
        failures
            .entry(event.action_id)
            .or_insert_with(|| {
                order.push(event.action_id);
                Vec::new()
            })
            .push(event);
    }

    let candidates: Vec<BreakpointCandidate> = order
        .into_iter()
        .filter_map(|action_id| {
            let group = failures.remove(&action_id)?;
            if group.len() < FAILURE_THRESHOLD {
                return None;
            }

            let pattern = classify_pattern(group[0].failure_reason.as_deref());
            Some(BreakpointCandidate {
                action_id,
                failure_count: group.len(),
                pattern,
                reasons: group.iter().map(|e| e.failure_reason.clone()).collect(),
            })
        })
        .collect();

    debug!(events = events.len(), breakpoints = candidates.len(), "detected breakpoints");
    candidates
}
