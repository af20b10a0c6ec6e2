use thiserror::Error;

/// Failure taxonomy for feed operations.
///
/// `Stale` never reaches callers of the coordinator: a mutation against a
/// post that has vanished, locally or server-side (deleted by its author
/// mid-flight), is absorbed as a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// The request never reached the server, or timed out before confirming.
    /// The optimistic effect has been rolled back; the viewer decides whether
    /// to retry.
    #[error("network failure: {0}")]
    Network(String),

    /// The server explicitly refused the write. Not retried automatically.
    #[error("write rejected by server ({status}): {reason}")]
    Rejected { status: u16, reason: String },

    /// The mutation targets a post id that no longer exists locally.
    #[error("reference to a post that no longer exists")]
    Stale,
}

impl FeedError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FeedError::Network(_))
    }
}
