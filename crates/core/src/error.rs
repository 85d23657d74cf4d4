//! Errors raised while validating data before it reaches the engine.

/// Result alias for core validation.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Data-integrity errors detected at the boundary of the core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// Action data that cannot be handed to the readiness selector.
    #[error("invalid action data: {reason}")]
    InvalidActionData {
        /// What was wrong with the data
        reason: String,
    },

    /// A string that does not name any variant of an enumerated field.
    #[error("invalid value '{value}' for {field}")]
    InvalidValue {
        /// Field being parsed
        field: &'static str,
        /// The rejected input
        value: String,
    },
}

impl CoreError {
    /// Shorthand for [`CoreError::InvalidActionData`].
    pub fn invalid_action(reason: impl Into<String>) -> Self {
        Self::InvalidActionData {
            reason: reason.into(),
        }
    }
}
