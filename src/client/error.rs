// ABOUTME: Classified errors surfaced by the registry client.
// ABOUTME: Callers branch on ErrorKind instead of matching on messages.

use hyper::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid registry address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("{0}. Are you trying to connect to a TLS-enabled registry without TLS?")]
    LikelyTlsMismatch(String),

    #[error("not found")]
    NotFound,

    #[error("request failed with status {status}")]
    RequestFailed { status: StatusCode },

    #[error("malformed response: {0}")]
    MalformedResponse(#[from] serde_json::Error),
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection string could not be parsed.
    InvalidAddress,
    /// Request could not be constructed (bad path or header).
    InvalidRequest,
    /// Dial or transport level failure.
    ConnectionFailed,
    /// Connection failure that looks like a plaintext client talking to a TLS server.
    LikelyTlsMismatch,
    /// The registry answered 404.
    NotFound,
    /// The registry answered with another 4xx or 5xx status.
    RequestFailed,
    /// A successful response body was not the expected JSON.
    MalformedResponse,
}

impl ClientError {
    pub(crate) fn invalid_address(address: &str, reason: impl Into<String>) -> Self {
        ClientError::InvalidAddress {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::InvalidAddress { .. } => ErrorKind::InvalidAddress,
            ClientError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            ClientError::ConnectionFailed(_) => ErrorKind::ConnectionFailed,
            ClientError::LikelyTlsMismatch(_) => ErrorKind::LikelyTlsMismatch,
            ClientError::NotFound => ErrorKind::NotFound,
            ClientError::RequestFailed { .. } => ErrorKind::RequestFailed,
            ClientError::MalformedResponse(_) => ErrorKind::MalformedResponse,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound)
    }

    /// HTTP status of a failed request, if the registry answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::NotFound => Some(StatusCode::NOT_FOUND),
            ClientError::RequestFailed { status } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_distinguished_from_request_failure() {
        let not_found = ClientError::NotFound;
        let failed = ClientError::RequestFailed {
            status: StatusCode::INTERNAL_SERVER_ERROR,
        };

        assert!(not_found.is_not_found());
        assert!(!failed.is_not_found());
        assert_eq!(not_found.kind(), ErrorKind::NotFound);
        assert_eq!(failed.kind(), ErrorKind::RequestFailed);
    }

    #[test]
    fn status_is_reported_for_http_failures_only() {
        let failed = ClientError::RequestFailed {
            status: StatusCode::UNAUTHORIZED,
        };
        assert_eq!(failed.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(ClientError::NotFound.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(
            ClientError::ConnectionFailed("reset".to_string()).status(),
            None
        );
    }

    #[test]
    fn tls_mismatch_message_suggests_cause() {
        let err = ClientError::LikelyTlsMismatch("connection closed".to_string());
        let message = err.to_string();
        assert!(message.starts_with("connection closed."));
        assert!(message.contains("TLS-enabled registry without TLS"));
    }
}
