//! Collaborator contracts consumed by the orchestrator.
//!
//! Each trait is object-safe (via [`macro@async_trait`]) so the orchestrator can
//! hold its collaborators behind `Arc<dyn _>` and tests can substitute
//! doubles.

use async_trait::async_trait;
use oppnote_core::{
    AttachmentContent, AttachmentRef, EmailSender, Opportunity, OpportunitySummary, Session,
    StoredFile, SyncError,
};
use serde_json::Value;

/// The message being filed, as exposed by the mail host.
///
/// Each read is independent: a failing body read must not prevent attachment
/// reads and vice versa.
#[async_trait]
pub trait MailContext: Send + Sync {
    /// Snapshot of the message's attachments. Empty if it has none.
    fn list_attachments(&self) -> Vec<AttachmentRef>;

    /// Fetch one attachment's content. Single-shot; no retry.
    ///
    /// Fails with [`SyncError::AttachmentUnavailable`] when the host reports
    /// a failure.
    async fn fetch_content(&self, attachment_id: &str) -> Result<AttachmentContent, SyncError>;

    /// Plain-text body of the message.
    async fn body_text(&self) -> Result<String, SyncError>;

    /// Sender of the message.
    async fn sender(&self) -> Result<EmailSender, SyncError>;

    /// Subject of the message, `None` if it has none.
    async fn subject(&self) -> Result<Option<String>, SyncError>;
}

/// Uploads attachment content to the remote file store.
#[async_trait]
pub trait FileUploader: Send + Sync {
    /// Decode `content` and store it as a file owned by `opportunity_id`.
    ///
    /// Decoding happens before any network traffic, so a corrupt payload
    /// fails with [`SyncError::InvalidAttachmentEncoding`] without contacting
    /// the file service.
    async fn upload(
        &self,
        session: &Session,
        attachment: &AttachmentRef,
        content: &AttachmentContent,
        opportunity_id: &str,
    ) -> Result<StoredFile, SyncError>;
}

/// Reads and writes opportunity records.
#[async_trait]
pub trait OpportunityDirectory: Send + Sync {
    /// Opportunities visible to the session.
    async fn list(&self, session: &Session) -> Result<Vec<OpportunitySummary>, SyncError>;

    /// Full record, including its content-block history.
    async fn get_detail(&self, session: &Session, id: &str) -> Result<Opportunity, SyncError>;

    /// Overwrite the content-block history. Last write wins.
    async fn replace_content_blocks(
        &self,
        session: &Session,
        id: &str,
        blocks: Vec<Value>,
    ) -> Result<Opportunity, SyncError>;
}
