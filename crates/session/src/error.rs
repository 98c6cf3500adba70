use oppnote_core::SyncError;
use thiserror::Error;

/// Errors that can occur while persisting or enriching a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The durable backend could not be read or written.
    #[error("session storage error: {0}")]
    Storage(String),

    /// The session could not be serialized.
    #[error("session serialization error: {0}")]
    Serialization(String),

    /// The user directory lookup failed.
    #[error("user lookup failed: {0}")]
    Lookup(#[from] SyncError),
}
