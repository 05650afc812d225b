use crate::{
    envelope::{ResponseSummary, Termination},
    state::RequestSnapshot,
    transport::TransportError,
};

/// Boxed error returned by user-supplied strategy functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum ResubmitError {
    /// The final attempt produced a transport error.
    ///
    /// Carries the accumulated request state so callers keep the whole retry
    /// history even on failure.
    #[error("transport error after {} retries: {source}", .request.retry.retries)]
    Transport {
        /// Raw error of the last attempt.
        source: TransportError,
        /// Redacted request state at the time the error surfaced.
        request: Box<RequestSnapshot>,
        /// Redacted summary of the last attempt.
        summary: ResponseSummary,
        /// Why the attempt loop stopped.
        termination: Termination,
    },
    /// A user-supplied strategy function failed.
    #[error("retry strategy `{strategy}` failed: {source}")]
    Strategy {
        /// Name of the strategy whose function failed.
        strategy: String,
        /// Error returned by that function.
        source: BoxError,
    },
    /// Request URL could not be parsed for cookie matching.
    #[error("invalid request url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ResubmitError {
    /// Returns the request snapshot attached to a transport failure.
    pub fn request(&self) -> Option<&RequestSnapshot> {
        match self {
            Self::Transport { request, .. } => Some(request),
            _ => None,
        }
    }
}
