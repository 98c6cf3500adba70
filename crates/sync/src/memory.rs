//! In-memory collaborators.
//!
//! [`MemoryMailbox`] and [`MemoryCrm`] implement the ports without any I/O.
//! They count every call and can be told to fail, which makes them suitable
//! for exercising the orchestrator's failure paths.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use oppnote_core::{
    AttachmentContent, AttachmentRef, EmailSender, Opportunity, OpportunitySummary, Session,
    StoredFile, SyncError,
};
use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::ports::{FileUploader, MailContext, OpportunityDirectory};

/// A message held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryMailbox {
    attachments: Vec<(AttachmentRef, String)>,
    subject: Option<String>,
    sender: Option<EmailSender>,
    body: Option<String>,
    unavailable: HashSet<String>,
    fetches: AtomicUsize,
}

impl MemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    #[must_use]
    pub fn with_sender(mut self, name: impl Into<String>, address: impl Into<String>) -> Self {
        self.sender = Some(EmailSender::new(name, address));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Add an attachment with the given base64 payload.
    #[must_use]
    pub fn with_attachment(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        base64_payload: impl Into<String>,
    ) -> Self {
        let payload = base64_payload.into();
        let attachment = AttachmentRef {
            id: id.into(),
            display_name: name.into(),
            size_bytes: payload.len() as u64 * 3 / 4,
            mime_type: "application/octet-stream".into(),
            is_inline: false,
        };
        self.attachments.push((attachment, payload));
        self
    }

    /// Make fetching the given attachment fail as if the host evicted it.
    #[must_use]
    pub fn with_unavailable(mut self, id: impl Into<String>) -> Self {
        self.unavailable.insert(id.into());
        self
    }

    /// Number of `fetch_content` calls so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailContext for MemoryMailbox {
    fn list_attachments(&self) -> Vec<AttachmentRef> {
        self.attachments.iter().map(|(a, _)| a.clone()).collect()
    }

    async fn fetch_content(&self, attachment_id: &str) -> Result<AttachmentContent, SyncError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.contains(attachment_id) {
            return Err(SyncError::AttachmentUnavailable {
                attachment_id: attachment_id.to_owned(),
                reason: "attachment is no longer available".into(),
            });
        }
        self.attachments
            .iter()
            .find(|(a, _)| a.id == attachment_id)
            .map(|(_, payload)| AttachmentContent::new(attachment_id, payload.clone()))
            .ok_or_else(|| SyncError::AttachmentUnavailable {
                attachment_id: attachment_id.to_owned(),
                reason: "no such attachment".into(),
            })
    }

    async fn body_text(&self) -> Result<String, SyncError> {
        self.body
            .clone()
            .ok_or_else(|| SyncError::Connection("body not available".into()))
    }

    async fn sender(&self) -> Result<EmailSender, SyncError> {
        self.sender
            .clone()
            .ok_or_else(|| SyncError::Connection("sender not available".into()))
    }

    async fn subject(&self) -> Result<Option<String>, SyncError> {
        Ok(self.subject.clone())
    }
}

/// Call counters for [`MemoryCrm`].
#[derive(Debug, Default)]
pub struct CallCounts {
    pub list: AtomicUsize,
    pub get: AtomicUsize,
    pub replace: AtomicUsize,
    pub upload: AtomicUsize,
}

impl CallCounts {
    /// Total number of calls that reached the remote side.
    pub fn total(&self) -> usize {
        self.list.load(Ordering::SeqCst)
            + self.get.load(Ordering::SeqCst)
            + self.replace.load(Ordering::SeqCst)
            + self.upload.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct Failures {
    upload_names: HashSet<String>,
    replace: bool,
    get: bool,
}

/// An in-memory CRM: opportunity directory plus file store.
#[derive(Debug, Default)]
pub struct MemoryCrm {
    opportunities: Mutex<HashMap<String, Opportunity>>,
    files: Mutex<Vec<StoredFile>>,
    failures: Mutex<Failures>,
    calls: CallCounts,
}

impl MemoryCrm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an opportunity with the given history.
    #[must_use]
    pub fn with_opportunity(self, id: &str, name: &str, history: Vec<Value>) -> Self {
        self.opportunities.lock().insert(
            id.to_owned(),
            Opportunity {
                id: id.to_owned(),
                name: name.to_owned(),
                account: None,
                content_blocks: Some(history),
                extra: Map::new(),
            },
        );
        self
    }

    /// Reject uploads of files with this name.
    pub fn fail_uploads_named(&self, name: impl Into<String>) {
        self.failures.lock().upload_names.insert(name.into());
    }

    /// Reject every content-block update.
    pub fn fail_replace(&self) {
        self.failures.lock().replace = true;
    }

    /// Fail every detail read.
    pub fn fail_get(&self) {
        self.failures.lock().get = true;
    }

    pub fn calls(&self) -> &CallCounts {
        &self.calls
    }

    /// Snapshot of an opportunity, bypassing call counting and failures.
    pub fn snapshot(&self, id: &str) -> Option<Opportunity> {
        self.opportunities.lock().get(id).cloned()
    }

    /// Every file stored so far, including orphans.
    pub fn stored_files(&self) -> Vec<StoredFile> {
        self.files.lock().clone()
    }
}

#[async_trait]
impl FileUploader for MemoryCrm {
    async fn upload(
        &self,
        _session: &Session,
        attachment: &AttachmentRef,
        content: &AttachmentContent,
        opportunity_id: &str,
    ) -> Result<StoredFile, SyncError> {
        let bytes = content.decode(&attachment.display_name)?;
        self.calls.upload.fetch_add(1, Ordering::SeqCst);

        if self
            .failures
            .lock()
            .upload_names
            .contains(&attachment.display_name)
        {
            return Err(SyncError::UploadRejected {
                status: 500,
                message: "Internal Server Error".into(),
            });
        }

        let mut files = self.files.lock();
        let file = StoredFile {
            file_id: format!("file-{}", files.len() + 1),
            file_name: attachment.display_name.clone(),
            file_type: Some(attachment.mime_type.clone()),
            parent_entity_id: Some(opportunity_id.to_owned()),
            size_bytes: Some(bytes.len() as u64),
            created_at: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            extra: Map::new(),
        };
        files.push(file.clone());
        Ok(file)
    }
}

#[async_trait]
impl OpportunityDirectory for MemoryCrm {
    async fn list(&self, _session: &Session) -> Result<Vec<OpportunitySummary>, SyncError> {
        self.calls.list.fetch_add(1, Ordering::SeqCst);
        let mut rows: Vec<_> = self
            .opportunities
            .lock()
            .values()
            .map(Opportunity::summary)
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rows)
    }

    async fn get_detail(&self, _session: &Session, id: &str) -> Result<Opportunity, SyncError> {
        self.calls.get.fetch_add(1, Ordering::SeqCst);
        if self.failures.lock().get {
            return Err(SyncError::DirectoryUnavailable {
                status: 503,
                message: "Service Unavailable".into(),
            });
        }
        self.opportunities
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(id.to_owned()))
    }

    async fn replace_content_blocks(
        &self,
        _session: &Session,
        id: &str,
        blocks: Vec<Value>,
    ) -> Result<Opportunity, SyncError> {
        self.calls.replace.fetch_add(1, Ordering::SeqCst);
        if self.failures.lock().replace {
            return Err(SyncError::UpdateRejected {
                status: 500,
                message: "Internal Server Error".into(),
            });
        }
        let mut opportunities = self.opportunities.lock();
        let opportunity = opportunities
            .get_mut(id)
            .ok_or_else(|| SyncError::UpdateRejected {
                status: 404,
                message: "Not Found".into(),
            })?;
        opportunity.content_blocks = Some(blocks);
        Ok(opportunity.clone())
    }
}
