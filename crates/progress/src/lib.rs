//! Progress Tracking
//!
//! Breakpoint detection, goal progress, and aggregate statistics.

#![warn(missing_docs)]

pub mod breakpoint;
pub mod tracker;
pub mod stats;

pub use breakpoint::{classify_pattern, detect_breakpoints, BreakpointCandidate, FAILURE_THRESHOLD};
pub use tracker::{goal_progress, GoalProgress};
pub use stats::{
    parasitic, predict, summarize, window_start, ActionFailures, ParasiticReport, PatternRisk,
    Summary, PARASITIC_MIN_FAILURES,
};
