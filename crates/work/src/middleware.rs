//! Cross-cutting behaviour for decomposers, composed as explicit layers.
//!
//! A layer takes a decomposer and returns a decomposer. [`compose`] folds a
//! list of layers over a base implementation, first layer innermost.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use crate::config::WorkConfig;
use crate::decompose::{ActionDraft, DecomposeError, Decomposer};

/// Transforms one decomposer into another.
pub trait DecomposerLayer: Send + Sync {
    /// Wrap `inner`.
    fn layer(&self, inner: Arc<dyn Decomposer>) -> Arc<dyn Decomposer>;
}

/// Apply `layers` to `base` in order.
pub fn compose(
    base: Arc<dyn Decomposer>,
    layers: &[Box<dyn DecomposerLayer>],
) -> Arc<dyn Decomposer> {
    layers.iter().fold(base, |inner, layer| layer.layer(inner))
}

/// The standard stack: retries per configuration, logged from the outside.
pub fn default_layers(config: &WorkConfig) -> Vec<Box<dyn DecomposerLayer>> {
    vec![
        Box::new(RetryLayer::new(config.retry_attempts, config.retry_delay())),
        Box::new(TracingLayer),
    ]
}

/// Retries decompositions that failed with [`DecomposeError::Unavailable`],
/// pausing between tries. An invalid plan is returned at once.
#[derive(Debug, Clone)]
pub struct RetryLayer {
    attempts: u32,
    delay: Duration,
}

impl RetryLayer {
    /// Try up to `attempts` times (at least once), pausing `delay` between tries.
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }
}

impl DecomposerLayer for RetryLayer {
    fn layer(&self, inner: Arc<dyn Decomposer>) -> Arc<dyn Decomposer> {
        Arc::new(Retry {
            inner,
            attempts: self.attempts,
            delay: self.delay,
        })
    }
}

struct Retry {
    inner: Arc<dyn Decomposer>,
    attempts: u32,
    delay: Duration,
}

#[async_trait]
impl Decomposer for Retry {
    async fn decompose(&self, goal: &str) -> Result<Vec<ActionDraft>, DecomposeError> {
        let mut attempt = 1;
        loop {
            match self.inner.decompose(goal).await {
                Ok(plan) => return Ok(plan),
                Err(e @ DecomposeError::Unavailable(_)) if attempt < self.attempts => {
                    warn!(
                        attempt,
                        max = self.attempts,
                        error = %e,
                        "decomposition failed, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(attempts = attempt, error = %e, "decomposition failed");
                    return Err(e);
                }
            }
        }
    }
}

/// Logs every decomposition and its outcome.
#[derive(Debug, Clone, Default)]
pub struct TracingLayer;

impl DecomposerLayer for TracingLayer {
    fn layer(&self, inner: Arc<dyn Decomposer>) -> Arc<dyn Decomposer> {
        Arc::new(Traced { inner })
    }
}

struct Traced {
    inner: Arc<dyn Decomposer>,
}

#[async_trait]
impl Decomposer for Traced {
    async fn decompose(&self, goal: &str) -> Result<Vec<ActionDraft>, DecomposeError> {
        debug!(goal, "decomposing goal");
        let result = self.inner.decompose(goal).await;
        match &result {
            Ok(plan) => debug!(steps = plan.len(), "decomposition finished"),
            Err(e) => debug!(error = %e, "decomposition returned an error"),
        }
        result
    }
}
