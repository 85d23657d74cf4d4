//! Work Management (Layer 2)
//!
//! Goal lifecycle, event logging, and the collaborators around them.

#![warn(missing_docs)]

pub mod manager;
pub mod decompose;
pub mod middleware;
pub mod cache;
pub mod config;
pub mod error;

pub use manager::{
    BasicGoalManager, EventEntry, GoalDetail, GoalManager, GoalSpec, GoalUpdate, LoggedEvent,
    NewAction,
};
pub use decompose::{
    validate_plan, ActionDraft, DecomposeError, Decomposer, SingleStepDecomposer, StaticDecomposer,
};
pub use middleware::{compose, default_layers, DecomposerLayer, RetryLayer, TracingLayer};
pub use cache::TtlCache;
pub use config::{BreakpointPolicy, WorkConfig, CONFIG_FILE, MAX_STATS_WINDOW_DAYS};
pub use error::{Result, WorkError};
