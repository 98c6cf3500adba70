//! A message read from a local JSON manifest.
//!
//! ```json
//! {
//!   "subject": "RE: Fleet renewal",
//!   "from": { "name": "Jane Doe", "address": "jane@acme.example" },
//!   "body": "Please find the quote attached.",
//!   "attachments": [
//!     { "name": "quote.pdf", "path": "quote.pdf" },
//!     { "id": "logo", "name": "logo.png", "path": "img/logo.png", "isInline": true }
//!   ]
//! }
//! ```
//!
//! Relative attachment paths are resolved against the manifest's directory.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use oppnote_core::{AttachmentContent, AttachmentRef, EmailSender, SyncError};
use oppnote_sync::MailContext;
use serde::Deserialize;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    from: Option<Sender>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    attachments: Vec<ManifestAttachment>,
}

#[derive(Debug, Deserialize)]
struct Sender {
    #[serde(default)]
    name: String,
    #[serde(default)]
    address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestAttachment {
    #[serde(default)]
    id: Option<String>,
    name: String,
    path: PathBuf,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    is_inline: bool,
}

/// [`MailContext`] over a manifest file and the attachment files it lists.
#[derive(Debug)]
pub struct ManifestMailbox {
    subject: Option<String>,
    sender: EmailSender,
    body: String,
    attachments: Vec<(AttachmentRef, PathBuf)>,
}

impl ManifestMailbox {
    /// Read and resolve a manifest.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read message manifest {}", path.display()))?;
        let manifest: Manifest = serde_json::from_str(&raw)
            .with_context(|| format!("invalid message manifest {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(Self::from_manifest(manifest, base).await)
    }

    async fn from_manifest(manifest: Manifest, base: &Path) -> Self {
        let mut attachments = Vec::with_capacity(manifest.attachments.len());
        for (index, entry) in manifest.attachments.into_iter().enumerate() {
            let path = if entry.path.is_absolute() {
                entry.path
            } else {
                base.join(entry.path)
            };
            let size_bytes = tokio::fs::metadata(&path).await.map_or(0, |m| m.len());
            let mime_type = entry.content_type.unwrap_or_else(|| {
                mime_guess::from_path(&entry.name)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_owned()
            });
            let attachment = AttachmentRef {
                id: entry.id.unwrap_or_else(|| (index + 1).to_string()),
                display_name: entry.name,
                size_bytes,
                mime_type,
                is_inline: entry.is_inline,
            };
            attachments.push((attachment, path));
        }

        let sender = manifest
            .from
            .map_or_else(EmailSender::unknown, |s| EmailSender::new(s.name, s.address));

        Self {
            subject: manifest.subject,
            sender,
            body: manifest.body.unwrap_or_default(),
            attachments,
        }
    }
}

#[async_trait]
impl MailContext for ManifestMailbox {
    fn list_attachments(&self) -> Vec<AttachmentRef> {
        self.attachments.iter().map(|(a, _)| a.clone()).collect()
    }

    #[instrument(skip(self))]
    async fn fetch_content(&self, attachment_id: &str) -> Result<AttachmentContent, SyncError> {
        let unavailable = |reason: String| SyncError::AttachmentUnavailable {
            attachment_id: attachment_id.to_owned(),
            reason,
        };

        let (_, path) = self
            .attachments
            .iter()
            .find(|(a, _)| a.id == attachment_id)
            .ok_or_else(|| unavailable("no such attachment".to_owned()))?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| unavailable(format!("{}: {e}", path.display())))?;
        debug!(bytes = bytes.len(), "read attachment");
        Ok(AttachmentContent::new(attachment_id, STANDARD.encode(bytes)))
    }

    async fn body_text(&self) -> Result<String, SyncError> {
        Ok(self.body.clone())
    }

    async fn sender(&self) -> Result<EmailSender, SyncError> {
        Ok(self.sender.clone())
    }

    async fn subject(&self) -> Result<Option<String>, SyncError> {
        Ok(self.subject.clone())
    }
}
