//! Error types for the request client.

use thiserror::Error;

use crate::response::ResponseEnvelope;

/// Result type alias for request operations
pub type RequestResult<T> = Result<T, RequestError>;

/// Transport-level failure classification.
///
/// A failure means the call ended without a usable status code. Cancellation
/// is observed as [`FailureKind::Abort`], not as a distinct code path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The in-flight call was aborted through its cancellation handle.
    Abort,
    /// The transport-enforced timeout elapsed before a terminal response.
    Timeout,
    /// The connection failed outright (DNS, refused, reset, protocol).
    Error,
}

impl FailureKind {
    /// Returns the lowercase wire/name form of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Abort => "abort",
            FailureKind::Timeout => "timeout",
            FailureKind::Error => "error",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for the request client.
///
/// Status errors and transport failures carry the full [`ResponseEnvelope`]
/// so callers can distinguish cancellation from genuine network failure and
/// inspect whatever status/headers were available at settlement.
#[derive(Error, Debug, Clone)]
pub enum RequestError {
    /// Configuration error (missing/invalid URL or method, bad client setup).
    ///
    /// Pre-flight by definition: a configuration error never reaches a
    /// transport.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration issue
        message: String,
    },

    /// A real response arrived with a status outside the success range and
    /// `resolve_on_error` was disabled.
    #[error("request settled with error status {}", .envelope.status.unwrap_or(0))]
    Status {
        /// The normalized response outcome
        envelope: Box<ResponseEnvelope>,
    },

    /// The call ended without a usable response (abort, timeout, network).
    #[error("transport failure: {kind}")]
    Transport {
        /// Failure classification
        kind: FailureKind,
        /// Best-effort envelope built from whatever context was available
        envelope: Box<ResponseEnvelope>,
    },

    /// An interceptor subscriber failed; the remaining chain for that hook
    /// point was not run.
    #[error("interceptor error: {message}")]
    Interceptor {
        /// Error reported by the subscriber
        message: String,
    },
}

impl RequestError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        RequestError::Configuration {
            message: message.into(),
        }
    }

    /// Wraps a subscriber error surfaced by an interceptor chain.
    pub fn interceptor(error: crate::subscription::SubscriberError) -> Self {
        RequestError::Interceptor {
            message: error.to_string(),
        }
    }

    /// Returns the failure kind for transport failures.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            RequestError::Transport { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Returns the response envelope attached to this error, if any.
    pub fn envelope(&self) -> Option<&ResponseEnvelope> {
        match self {
            RequestError::Status { envelope } | RequestError::Transport { envelope, .. } => {
                Some(envelope)
            }
            _ => None,
        }
    }

    /// Returns true if this is a status-range error (a real response).
    pub fn is_status(&self) -> bool {
        matches!(self, RequestError::Status { .. })
    }
}

impl From<url::ParseError> for RequestError {
    fn from(error: url::ParseError) -> Self {
        RequestError::Configuration {
            message: format!("invalid URL: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_kind_names() {
        assert_eq!(FailureKind::Abort.as_str(), "abort");
        assert_eq!(FailureKind::Timeout.to_string(), "timeout");
        assert_eq!(FailureKind::Error.as_str(), "error");
    }

    #[test]
    fn url_parse_error_is_configuration() {
        let error: RequestError = "::not a url::".parse::<url::Url>().unwrap_err().into();
        assert!(matches!(error, RequestError::Configuration { .. }));
    }
}
