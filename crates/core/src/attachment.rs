use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Metadata about an attachment on the message being filed.
///
/// Identifiers are only stable within a single message session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    /// Host identifier used to fetch the content.
    pub id: String,
    /// File name shown to the user and sent to the file service.
    #[serde(rename = "name")]
    pub display_name: String,
    /// Size in bytes as reported by the host.
    #[serde(rename = "size")]
    pub size_bytes: u64,
    /// MIME content type (e.g. `"application/pdf"`).
    #[serde(rename = "contentType")]
    pub mime_type: String,
    /// `true` for inline parts such as embedded images.
    pub is_inline: bool,
}

/// Raw content of one attachment, base64-encoded by the host.
///
/// Produced on demand and never cached.
#[derive(Clone, PartialEq, Eq)]
pub struct AttachmentContent {
    /// Identifier of the attachment this content belongs to.
    pub attachment_id: String,
    /// Base64 text representing the original bytes.
    pub base64_payload: String,
}

impl AttachmentContent {
    pub fn new(attachment_id: impl Into<String>, base64_payload: impl Into<String>) -> Self {
        Self {
            attachment_id: attachment_id.into(),
            base64_payload: base64_payload.into(),
        }
    }

    /// Decode the payload into the original bytes.
    ///
    /// Line breaks and other ASCII whitespace are ignored, as hosts commonly
    /// wrap long base64 output. Empty content is rejected.
    pub fn decode(&self, file_name: &str) -> Result<Bytes, SyncError> {
        let compact: String = self
            .base64_payload
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();

        let bytes = STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| SyncError::InvalidAttachmentEncoding {
                file_name: file_name.to_owned(),
                reason: e.to_string(),
            })?;

        if bytes.is_empty() {
            return Err(SyncError::InvalidAttachmentEncoding {
                file_name: file_name.to_owned(),
                reason: "attachment is empty".into(),
            });
        }

        Ok(Bytes::from(bytes))
    }
}

impl std::fmt::Debug for AttachmentContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentContent")
            .field("attachment_id", &self.attachment_id)
            .field("payload_len", &self.base64_payload.len())
            .finish()
    }
}
