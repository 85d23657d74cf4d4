//! Breakpoint model - a recurring-failure cluster on one action.

use serde::{Deserialize, Serialize};
use crate::error::CoreError;
use crate::id::{ActionId, BreakpointId};
use crate::Time;

/// A stored breakpoint. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    /// Unique identifier
    pub id: BreakpointId,

    /// The failing action
    pub action_id: ActionId,

    /// Failures seen when detected
    pub failure_count: usize,

    /// Classified root cause
    pub pattern: BreakpointPattern,

    /// Failure reasons in event order, missing ones included
    pub reasons: Vec<Option<String>>,

    /// When detected
    pub detected_at: Time,
}

/// Root-cause pattern of a breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakpointPattern {
    /// Not enough time, also the fallback
    Time,
    /// Not enough energy
    Energy,
    /// The action was unclear
    Clarity,
    /// Something outside the user's control
    External,
}

impl BreakpointPattern {
    /// Every pattern, in declaration order.
    pub const ALL: [BreakpointPattern; 4] = [
        BreakpointPattern::Time,
        BreakpointPattern::Energy,
        BreakpointPattern::Clarity,
        BreakpointPattern::External,
    ];

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakpointPattern::Time => "time",
            BreakpointPattern::Energy => "energy",
            BreakpointPattern::Clarity => "clarity",
            BreakpointPattern::External => "external",
        }
    }
}

impl std::fmt::Display for BreakpointPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BreakpointPattern {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "time" => Ok(BreakpointPattern::Time),
            "energy" => Ok(BreakpointPattern::Energy),
            "clarity" => Ok(BreakpointPattern::Clarity),
            "external" => Ok(BreakpointPattern::External),
            _ => Err(CoreError::InvalidValue {
                field: "breakpoint pattern",
                value: s.to_string(),
            }),
        }
    }
}
