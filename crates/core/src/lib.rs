//! Chance core data models.
//!
//! This crate defines the goals, actions, completion events and breakpoints
//! shared by the readiness selector, the breakpoint detector and the
//! application layer around them.

#![warn(missing_docs)]

// Core identities
mod id;
mod error;

// Goals and their actions
mod goal;
mod action;

// Completion log and derived records
mod event;
mod breakpoint;

// Re-exports
pub use id::*;
pub use error::{CoreError, Result};

pub use goal::{Goal, GoalStatus};
pub use action::{parse_dependency_list, Action, ActionStatus, EnergyLevel};
pub use event::{CompletionEvent, CompletionStatus};
pub use breakpoint::{Breakpoint, BreakpointPattern};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
