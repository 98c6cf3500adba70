use thiserror::Error;

/// Errors that can terminate a sync run.
///
/// Every remote failure carries the underlying cause text so that an operator
/// can tell a network or authorization problem apart from a data problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// A precondition was not met. No remote call was attempted.
    #[error("{0}")]
    Validation(String),

    /// The mail host could not supply an attachment's content.
    #[error("failed to get attachment {attachment_id}: {reason}")]
    AttachmentUnavailable {
        /// Host identifier of the attachment.
        attachment_id: String,
        /// Host-reported reason.
        reason: String,
    },

    /// The attachment payload is not decodable base64, or decodes to nothing.
    #[error("attachment {file_name} has an invalid encoding: {reason}")]
    InvalidAttachmentEncoding {
        /// File name of the offending attachment.
        file_name: String,
        /// Decoder message.
        reason: String,
    },

    /// The file service answered an upload with a non-success status.
    #[error("failed to upload file: HTTP {status}: {message}")]
    UploadRejected {
        /// HTTP status code.
        status: u16,
        /// Status reason or response body.
        message: String,
    },

    /// The opportunity directory answered with a non-success status.
    #[error("opportunity directory unavailable: HTTP {status}: {message}")]
    DirectoryUnavailable {
        /// HTTP status code.
        status: u16,
        /// Status reason or response body.
        message: String,
    },

    /// The opportunity id no longer resolves.
    #[error("opportunity not found: {0}")]
    NotFound(String),

    /// The opportunity update was refused.
    #[error("failed to update opportunity: HTTP {status}: {message}")]
    UpdateRejected {
        /// HTTP status code.
        status: u16,
        /// Status reason or response body.
        message: String,
    },

    /// The bearer token was rejected by a remote call.
    #[error("authorization expired: {0}")]
    AuthorizationExpired(String),

    /// A transport-level failure (DNS, TLS, refused connection, timeout).
    #[error("connection error: {0}")]
    Connection(String),

    /// A remote service returned a body that could not be understood.
    #[error("invalid response: {0}")]
    Deserialization(String),
}

impl SyncError {
    /// Shorthand for a [`SyncError::Validation`] error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Returns `true` if the run failed before any remote call.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns `true` for network and authorization failures, as opposed to
    /// problems with the data itself.
    pub fn is_transport_or_auth(&self) -> bool {
        match self {
            Self::Connection(_) | Self::AuthorizationExpired(_) => true,
            Self::UploadRejected { status, .. }
            | Self::DirectoryUnavailable { status, .. }
            | Self::UpdateRejected { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
