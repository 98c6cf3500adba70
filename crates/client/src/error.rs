//! Error types for the CRM clients.

use oppnote_core::SyncError;
use thiserror::Error;

/// Errors that can occur when talking to the CRM or auth services.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection error (network failure, DNS resolution, timeout, etc.).
    #[error("connection error: {0}")]
    Connection(String),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Reason phrase, followed by the response body when there is one.
        message: String,
    },

    /// The GraphQL endpoint answered with errors or without data.
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// Response deserialization error.
    #[error("failed to deserialize response: {0}")]
    Deserialization(String),

    /// Client configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The caller passed an argument the service would reject.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Returns `true` if this error is retryable.
    ///
    /// Connection errors and HTTP 5xx errors return `true`. Nothing in this
    /// crate retries; the flag is informational.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Http { status, .. } => *status >= 500,
            Self::GraphQl(_)
            | Self::Deserialization(_)
            | Self::Configuration(_)
            | Self::InvalidInput(_) => false,
        }
    }

    /// Returns `true` if the bearer token was rejected.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Http { status: 401 | 403, .. })
    }

    /// The HTTP status, if the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Map into the sync taxonomy.
    ///
    /// Rejected tokens become [`SyncError::AuthorizationExpired`]; every other
    /// non-success status is handed to `on_status`, which picks the variant
    /// for the operation at hand.
    pub fn into_sync_error(self, on_status: impl FnOnce(u16, String) -> SyncError) -> SyncError {
        match self {
            Self::Http { status, message } if status == 401 || status == 403 => {
                SyncError::AuthorizationExpired(format!("HTTP {status}: {message}"))
            }
            Self::Http { status, message } => on_status(status, message),
            Self::Connection(msg) => SyncError::Connection(msg),
            Self::GraphQl(msg) | Self::Deserialization(msg) => SyncError::Deserialization(msg),
            Self::Configuration(msg) | Self::InvalidInput(msg) => SyncError::Validation(msg),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Deserialization(e.to_string())
        } else if e.is_builder() {
            Self::Configuration(e.to_string())
        } else {
            Self::Connection(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> Error {
        Error::Http {
            status,
            message: "Reason".to_string(),
        }
    }

    #[test]
    fn connection_and_5xx_are_retryable() {
        assert!(Error::Connection("timeout".to_string()).is_retryable());
        assert!(http(500).is_retryable());
        assert!(http(503).is_retryable());
        assert!(!http(400).is_retryable());
        assert!(!http(404).is_retryable());
        assert!(!Error::Deserialization("bad".to_string()).is_retryable());
    }

    #[test]
    fn unauthorized_statuses() {
        assert!(http(401).is_unauthorized());
        assert!(http(403).is_unauthorized());
        assert!(!http(404).is_unauthorized());
        assert_eq!(http(418).status(), Some(418));
        assert_eq!(Error::Connection("x".to_string()).status(), None);
    }

    #[test]
    fn rejected_token_maps_to_authorization_expired() {
        let err = http(401).into_sync_error(|status, message| SyncError::UploadRejected {
            status,
            message,
        });
        assert_eq!(
            err,
            SyncError::AuthorizationExpired("HTTP 401: Reason".to_string())
        );
    }

    #[test]
    fn other_statuses_use_the_operation_mapping() {
        let err = http(500).into_sync_error(|status, message| SyncError::UpdateRejected {
            status,
            message,
        });
        assert!(matches!(err, SyncError::UpdateRejected { status: 500, .. }));

        let err = Error::Connection("refused".to_string())
            .into_sync_error(|_, _| unreachable!("not an HTTP status"));
        assert_eq!(err, SyncError::Connection("refused".to_string()));
    }
}
