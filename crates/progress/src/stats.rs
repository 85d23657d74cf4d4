//! Aggregate statistics over goals, events and breakpoints.
//!
//! Every function takes `now` explicitly so reports are reproducible.

use chance_core::{
    ActionId, Breakpoint, BreakpointPattern, CompletionEvent, CompletionStatus, Goal, GoalStatus,
    Time,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Default failures within the window before an action is reported as parasitic.
pub const PARASITIC_MIN_FAILURES: usize = 3;

/// Recent activity summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Done events within the window
    pub done_in_window: usize,
    /// Goals currently blocked
    pub stuck_goals: usize,
    /// Failed events within the window, per reason
    pub failure_reasons: BTreeMap<String, usize>,
}

/// Actions that keep failing and the causes of recent breakpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParasiticReport {
    /// Breakpoints detected within the window, per pattern
    pub breakpoint_patterns: BTreeMap<BreakpointPattern, usize>,
    /// Actions failing at least the minimum number of times within the window
    pub negative_utility_actions: Vec<ActionFailures>,
}

/// Failure count of one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionFailures {
    /// The action
    pub action_id: ActionId,
    /// Failed events counted
    pub failure_count: usize,
}

/// Share of all events that ended up in breakpoints of one pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRisk {
    /// Pattern
    pub pattern: BreakpointPattern,
    /// Breakpoints with this pattern
    pub count: usize,
    /// `count / total_events * 100`, two decimals
    pub risk_percentage: f64,
}

/// Start of the window ending at `now`, or `None` when it reaches past the
/// earliest representable time.
pub fn window_start(now: Time, window: Duration) -> Option<Time> {
    now.checked_sub_signed(window)
}

fn in_window(timestamp: Time, now: Time, window: Duration) -> bool {
    window_start(now, window).map_or(true, |start| timestamp >= start)
}

/// Summarize recent activity.
pub fn summarize(
    goals: &[Goal],
    events: &[CompletionEvent],
    now: Time,
    window: Duration,
) -> Summary {
    let mut summary = Summary {
        stuck_goals: goals.iter().filter(|g| g.status == GoalStatus::Blocked).count(),
        ..Default::default()
    };

    for event in events.iter().filter(|e| in_window(e.timestamp, now, window)) {
        match event.status {
            CompletionStatus::Done => summary.done_in_window += 1,
            CompletionStatus::Failed => {
                if let Some(reason) = event.failure_reason.as_deref() {
                    *summary.failure_reasons.entry(reason.to_string()).or_insert(0) += 1;
                }
            }
            CompletionStatus::Blocked => {}
        }
    }

    summary
}

/// Report recent breakpoint causes and actions that keep failing.
pub fn parasitic(
    breakpoints: &[Breakpoint],
    events: &[CompletionEvent],
    now: Time,
    window: Duration,
    min_failures: usize,
) -> ParasiticReport {
    let mut report = ParasiticReport::default();

    for breakpoint in breakpoints.iter().filter(|b| in_window(b.detected_at, now, window)) {
        *report.breakpoint_patterns.entry(breakpoint.pattern).or_insert(0) += 1;
    }

    let mut order: Vec<ActionId> = Vec::new();
    let mut counts: HashMap<ActionId, usize> = HashMap::new();
    for event in events
        .iter()
        .filter(|e| e.status == CompletionStatus::Failed && in_window(e.timestamp, now, window))
    {
        let count = counts.entry(event.action_id).or_insert_with(|| {
            order.push(event.action_id);
            0
        });
        *count += 1;
    }

    report.negative_utility_actions = order
        .into_iter()
        .filter_map(|action_id| {
            let failure_count = counts.get(&action_id).copied().unwrap_or(0);
            (failure_count >= min_failures).then_some(ActionFailures {
                action_id,
                failure_count,
            })
        })
        .collect();

    report
}

/// Rank breakpoint patterns by how often they occur relative to all events.
pub fn predict(breakpoints: &[Breakpoint], total_events: usize) -> Vec<PatternRisk> {
    let denominator = total_events.max(1) as f64;

    let mut risks: Vec<PatternRisk> = BreakpointPattern::ALL
        .iter()
        .filter_map(|pattern| {
            let count = breakpoints.iter().filter(|b| b.pattern == *pattern).count();
            if count == 0 {
                return None;
            }
            let raw = count as f64 / denominator * 100.0;
            Some(PatternRisk {
                pattern: *pattern,
                count,
                risk_percentage: (raw * 100.0).round() / 100.0,
            })
        })
        .collect();

    risks.sort_by(|a, b| b.risk_percentage.total_cmp(&a.risk_percentage));
    risks
}
