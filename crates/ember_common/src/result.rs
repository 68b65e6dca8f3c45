//! Errors that indicate a bug in Ember itself.

/// An invariant the analyzer or builder should have guaranteed did not hold.
///
/// Problems with a user's design are reported through the error enums of
/// the crates that detect them; this type only wraps broken internal state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("internal error: {message}")]
pub struct InternalError {
    /// What was found to be inconsistent.
    pub message: String,
}

impl InternalError {
    /// Creates an internal error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
