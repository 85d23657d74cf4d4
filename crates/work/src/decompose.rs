//! Goal decomposition collaborators.
//!
//! A decomposer turns a free-text goal into an ordered plan of action
//! drafts. Real implementations call out to a language model; the ones here
//! are offline.

use async_trait::async_trait;
use chance_core::{CoreError, EnergyLevel};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors from a decomposition backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DecomposeError {
    /// The backend could not be reached or failed
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend answered with something unusable
    #[error("invalid plan: {0}")]
    InvalidPlan(String),
}

fn default_priority() -> i32 {
    5
}

/// One step of a proposed plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDraft {
    /// What to do
    pub description: String,
    /// Estimated minutes
    pub duration_min: u32,
    /// Energy required
    pub energy_level: EnergyLevel,
    /// Urgency
    #[serde(default = "default_priority")]
    pub priority: i32,
    /// 0-based positions of other drafts in the same plan
    #[serde(default)]
    pub depends_on: Vec<usize>,
}

impl ActionDraft {
    /// Create a draft with default priority and no dependencies.
    pub fn new(
        description: impl Into<String>,
        duration_min: u32,
        energy_level: EnergyLevel,
    ) -> Self {
        Self {
            description: description.into(),
            duration_min,
            energy_level,
            priority: default_priority(),
            depends_on: Vec::new(),
        }
    }

    /// Set dependencies by plan position.
    pub fn after(mut self, depends_on: Vec<usize>) -> Self {
        self.depends_on = depends_on;
        self
    }
}

/// Check that every dependency in a plan points at another draft of it.
pub fn validate_plan(drafts: &[ActionDraft]) -> Result<(), CoreError> {
    for (position, draft) in drafts.iter().enumerate() {
        if draft.duration_min == 0 {
            return Err(CoreError::invalid_action(format!(
                "step {} has a zero duration",
                position
            )));
        }
        for dep in &draft.depends_on {
            if *dep >= drafts.len() || *dep == position {
                return Err(CoreError::invalid_action(format!(
                    "step {} depends on step {}, which is not another step of the plan",
                    position, dep
                )));
            }
        }
    }
    Ok(())
}

/// Converts a goal description into action drafts.
#[async_trait]
pub trait Decomposer: Send + Sync {
    /// Decompose a goal.
    async fn decompose(&self, goal: &str) -> Result<Vec<ActionDraft>, DecomposeError>;
}

/// Offline fallback: a single medium-energy half-hour step.
#[derive(Debug, Clone, Default)]
pub struct SingleStepDecomposer;

#[async_trait]
impl Decomposer for SingleStepDecomposer {
    async fn decompose(&self, goal: &str) -> Result<Vec<ActionDraft>, DecomposeError> {
        Ok(vec![ActionDraft::new(
            format!("Step 1 for: {}", goal),
            30,
            EnergyLevel::Medium,
        )])
    }
}

/// Returns a prepared plan regardless of the goal text.
#[derive(Debug, Clone)]
pub struct StaticDecomposer {
    plan: Vec<ActionDraft>,
}

impl StaticDecomposer {
    /// Use this plan.
    pub fn new(plan: Vec<ActionDraft>) -> Self {
        Self { plan }
    }

    /// Read a JSON array of drafts from a file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, DecomposeError> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DecomposeError::Unavailable(format!("{}: {}", path.display(), e)))?;
        let plan = serde_json::from_str(&json)
            .map_err(|e| DecomposeError::InvalidPlan(format!("{}: {}", path.display(), e)))?;
        Ok(Self { plan })
    }
}

#[async_trait]
impl Decomposer for StaticDecomposer {
    async fn decompose(&self, _goal: &str) -> Result<Vec<ActionDraft>, DecomposeError> {
        Ok(self.plan.clone())
    }
}
