use thiserror::Error;

/// A callback failure that carries a numeric code for the agent.
///
/// When a failing callback's error chain contains one, the error status gets an
/// `ErrorClarification` sub-status with this code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ErrorWithClarification {
    pub code: i32,
    pub message: String,
}

impl ErrorWithClarification {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Find a clarification anywhere in the error chain
pub(crate) fn find_clarification(err: &anyhow::Error) -> Option<&ErrorWithClarification> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ErrorWithClarification>())
}
