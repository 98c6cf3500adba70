use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use oppnote_core::{
    AttachmentRef, BlockUser, ContentBlock, EmailSender, NoteComposer, NoteInput, Opportunity,
    Session, StoredFile, SyncError,
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::ports::{FileUploader, MailContext, OpportunityDirectory};

/// Subject used when the message has none.
pub const NO_SUBJECT: &str = "No Subject";

/// Subject used when the host cannot be asked for one.
pub const SUBJECT_UNAVAILABLE: &str = "Email";

/// Where a sync run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    Validating,
    UploadingAttachments,
    Composing,
    Persisting,
    Succeeded,
    Failed,
}

impl SyncPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns `true` while a run is in flight. Callers disable the trigger
    /// for the duration.
    pub fn is_active(self) -> bool {
        !self.is_terminal() && self != Self::Idle
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::UploadingAttachments => "uploading attachments",
            Self::Composing => "composing",
            Self::Persisting => "persisting",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Inputs of one run, captured from the calling surface.
#[derive(Debug, Clone, Default)]
pub struct SyncRequest {
    /// Selected opportunity, if any.
    pub opportunity_id: Option<String>,
    /// Previously fetched detail of the selected opportunity. The run only
    /// operates on this snapshot and never fetches it itself.
    pub detail: Option<Opportunity>,
    /// Selected attachment ids, in the order the user picked them.
    pub attachment_ids: Vec<String>,
    /// Free-text notes.
    pub notes: String,
    /// Email body as edited by the user. `None` reads it from the host.
    pub email_body: Option<String>,
}

impl SyncRequest {
    pub fn new(opportunity_id: impl Into<String>) -> Self {
        Self {
            opportunity_id: Some(opportunity_id.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: Opportunity) -> Self {
        self.detail = Some(detail);
        self
    }

    #[must_use]
    pub fn with_attachments<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attachment_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    #[must_use]
    pub fn with_email_body(mut self, body: impl Into<String>) -> Self {
        self.email_body = Some(body.into());
        self
    }
}

/// A run that added one note to the opportunity.
#[derive(Debug, Clone, Serialize)]
pub struct SyncSuccess {
    /// The note that was prepended.
    pub block: ContentBlock,
    /// Canonical snapshot of the opportunity after the update.
    pub opportunity: Opportunity,
    /// Summary for the operator.
    pub message: String,
}

/// A run that left the opportunity unchanged.
#[derive(Debug, Clone, Serialize)]
pub struct SyncFailure {
    /// Phase in which the run failed.
    pub phase: SyncPhase,
    #[serde(serialize_with = "serialize_display")]
    pub error: SyncError,
    /// Files uploaded by this run before it failed. They stay in the file
    /// store; no compensating delete is issued.
    pub orphaned_files: Vec<StoredFile>,
    /// Message for the operator, including the underlying cause.
    pub message: String,
}

fn serialize_display<S: serde::Serializer>(err: &SyncError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(err)
}

/// Terminal result of a run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    Succeeded(SyncSuccess),
    Failed(SyncFailure),
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Succeeded(s) => &s.message,
            Self::Failed(f) => &f.message,
        }
    }

    pub fn phase(&self) -> SyncPhase {
        match self {
            Self::Succeeded(_) => SyncPhase::Succeeded,
            Self::Failed(_) => SyncPhase::Failed,
        }
    }
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Preconditions that held at the start of a run.
struct Validated<'a> {
    session: &'a Session,
    opportunity_id: &'a str,
    history: &'a [Value],
    attachments: Vec<AttachmentRef>,
    author: BlockUser,
}

/// An upload phase that stopped early, with what it managed to store.
struct Aborted {
    error: SyncError,
    uploaded: Vec<StoredFile>,
}

/// Files an email, with selected attachments, as a note on an opportunity.
///
/// A run moves `Validating → UploadingAttachments → Composing → Persisting`
/// and ends in `Succeeded` or `Failed`. Any failure aborts at the point of
/// failure; the opportunity gains exactly one note or is left untouched.
///
/// Runs are not serialized against each other. The caller must keep at most
/// one run in flight, for example by watching [`subscribe`](Self::subscribe).
pub struct SyncOrchestrator {
    mail: Arc<dyn MailContext>,
    uploader: Arc<dyn FileUploader>,
    directory: Arc<dyn OpportunityDirectory>,
    composer: NoteComposer,
    clock: Clock,
    phase: watch::Sender<SyncPhase>,
}

impl SyncOrchestrator {
    pub fn new(
        mail: Arc<dyn MailContext>,
        uploader: Arc<dyn FileUploader>,
        directory: Arc<dyn OpportunityDirectory>,
    ) -> Self {
        let (phase, _) = watch::channel(SyncPhase::Idle);
        Self {
            mail,
            uploader,
            directory,
            composer: NoteComposer::default(),
            clock: Arc::new(Utc::now),
            phase,
        }
    }

    /// Use a custom note composer (timezone and date format).
    #[must_use]
    pub fn with_composer(mut self, composer: NoteComposer) -> Self {
        self.composer = composer;
        self
    }

    /// Override the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Watch phase transitions.
    pub fn subscribe(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    /// The most recently entered phase.
    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    /// Execute one run to a terminal state.
    #[instrument(
        skip_all,
        fields(
            opportunity_id = request.opportunity_id.as_deref().unwrap_or_default(),
            attachments = request.attachment_ids.len(),
        )
    )]
    pub async fn run(&self, session: Option<&Session>, request: SyncRequest) -> SyncOutcome {
        self.enter(SyncPhase::Validating);
        let validated = match self.validate(session, &request) {
            Ok(v) => v,
            Err(e) => return self.fail(SyncPhase::Validating, e, Vec::new()),
        };

        self.enter(SyncPhase::UploadingAttachments);
        let files = match self.upload_all(&validated).await {
            Ok(files) => files,
            Err(Aborted { error, uploaded }) => {
                return self.fail(SyncPhase::UploadingAttachments, error, uploaded);
            }
        };

        self.enter(SyncPhase::Composing);
        let block = self.compose(&validated, &request, files.clone()).await;

        self.enter(SyncPhase::Persisting);
        match self.persist(&validated, &block).await {
            Ok(opportunity) => self.succeed(block, opportunity),
            Err(e) => self.fail(SyncPhase::Persisting, e, files),
        }
    }

    fn enter(&self, phase: SyncPhase) {
        debug!(%phase, "entering phase");
        self.phase.send_replace(phase);
    }

    fn validate<'a>(
        &self,
        session: Option<&'a Session>,
        request: &'a SyncRequest,
    ) -> Result<Validated<'a>, SyncError> {
        let opportunity_id = request
            .opportunity_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SyncError::validation("Please select an opportunity"))?;

        let (session, user_id) = session
            .and_then(|s| s.resolvable_user_id().map(|id| (s, id)))
            .ok_or_else(|| SyncError::validation("User information not available"))?;

        let detail = request
            .detail
            .as_ref()
            .ok_or_else(|| SyncError::validation("Opportunity details not available"))?;
        let history = detail
            .content_blocks
            .as_deref()
            .ok_or_else(|| SyncError::validation("Opportunity details not available"))?;
        if detail.id != opportunity_id {
            return Err(SyncError::validation(
                "Opportunity details do not match the selected opportunity",
            ));
        }

        let listing = self.mail.list_attachments();
        let mut seen = HashSet::with_capacity(request.attachment_ids.len());
        let mut attachments = Vec::with_capacity(request.attachment_ids.len());
        for id in &request.attachment_ids {
            if !seen.insert(id.as_str()) {
                return Err(SyncError::validation(format!(
                    "Attachment {id} selected more than once"
                )));
            }
            let attachment = listing.iter().find(|a| &a.id == id).ok_or_else(|| {
                SyncError::validation(format!("Attachment {id} is not part of this message"))
            })?;
            // The file service refuses unnamed files.
            if attachment.display_name.trim().is_empty() {
                return Err(SyncError::validation(format!("Attachment {id} has no file name")));
            }
            attachments.push(attachment.clone());
        }

        Ok(Validated {
            session,
            opportunity_id,
            history,
            attachments,
            author: BlockUser {
                id: user_id.to_owned(),
                name: session.user_display_name.clone(),
            },
        })
    }

    /// Fetch and upload every selected attachment, one at a time, in
    /// selection order.
    async fn upload_all(&self, v: &Validated<'_>) -> Result<Vec<StoredFile>, Aborted> {
        let mut uploaded = Vec::with_capacity(v.attachments.len());

        for attachment in &v.attachments {
            debug!(
                attachment_id = %attachment.id,
                name = %attachment.display_name,
                "fetching attachment"
            );
            let content = match self.mail.fetch_content(&attachment.id).await {
                Ok(content) => content,
                Err(error) => return Err(Aborted { error, uploaded }),
            };

            match self
                .uploader
                .upload(v.session, attachment, &content, v.opportunity_id)
                .await
            {
                Ok(file) => {
                    info!(file_id = %file.file_id, name = %file.file_name, "attachment uploaded");
                    uploaded.push(file);
                }
                Err(error) => return Err(Aborted { error, uploaded }),
            }
        }

        Ok(uploaded)
    }

    async fn compose(
        &self,
        v: &Validated<'_>,
        request: &SyncRequest,
        files: Vec<StoredFile>,
    ) -> ContentBlock {
        let subject = match self.mail.subject().await {
            Ok(Some(subject)) if !subject.trim().is_empty() => subject,
            Ok(_) => NO_SUBJECT.to_owned(),
            Err(e) => {
                warn!(error = %e, "could not read subject");
                SUBJECT_UNAVAILABLE.to_owned()
            }
        };

        let sender = self.mail.sender().await.unwrap_or_else(|e| {
            warn!(error = %e, "could not read sender");
            EmailSender::unknown()
        });

        let body = match &request.email_body {
            Some(body) => body.clone(),
            None => self.mail.body_text().await.unwrap_or_else(|e| {
                warn!(error = %e, "could not read email body");
                String::new()
            }),
        };

        let input = NoteInput {
            notes: &request.notes,
            sender: &sender,
            subject: &subject,
            body: &body,
            files,
            created_by: v.author.clone(),
        };
        self.composer.compose(input, (self.clock)())
    }

    async fn persist(
        &self,
        v: &Validated<'_>,
        block: &ContentBlock,
    ) -> Result<Opportunity, SyncError> {
        let merged = block.prepend_to(v.history)?;
        debug!(blocks = merged.len(), "replacing content blocks");

        let updated = self
            .directory
            .replace_content_blocks(v.session, v.opportunity_id, merged)
            .await?;

        // The write is durable at this point; a failed refresh only costs
        // the caller a canonical snapshot.
        match self.directory.get_detail(v.session, v.opportunity_id).await {
            Ok(fresh) => Ok(fresh),
            Err(e) => {
                warn!(error = %e, "could not refresh opportunity after update");
                Ok(updated)
            }
        }
    }

    fn succeed(&self, block: ContentBlock, opportunity: Opportunity) -> SyncOutcome {
        let message = format!(
            "Note with {} attachment(s) added successfully to opportunity!",
            block.files.len()
        );
        info!(block_id = %block.id, files = block.files.len(), "note added");
        self.enter(SyncPhase::Succeeded);
        SyncOutcome::Succeeded(SyncSuccess {
            block,
            opportunity,
            message,
        })
    }

    fn fail(
        &self,
        phase: SyncPhase,
        error: SyncError,
        orphaned_files: Vec<StoredFile>,
    ) -> SyncOutcome {
        if orphaned_files.is_empty() {
            warn!(%phase, error = %error, "sync failed");
        } else {
            let ids: Vec<&str> = orphaned_files.iter().map(|f| f.file_id.as_str()).collect();
            warn!(
                %phase,
                error = %error,
                orphaned = ?ids,
                "sync failed, uploaded files left orphaned"
            );
        }
        self.enter(SyncPhase::Failed);
        let message = format!("Error: {error}");
        SyncOutcome::Failed(SyncFailure {
            phase,
            error,
            orphaned_files,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_activity() {
        assert!(!SyncPhase::Idle.is_active());
        assert!(SyncPhase::Validating.is_active());
        assert!(SyncPhase::UploadingAttachments.is_active());
        assert!(SyncPhase::Composing.is_active());
        assert!(SyncPhase::Persisting.is_active());
        assert!(SyncPhase::Succeeded.is_terminal());
        assert!(SyncPhase::Failed.is_terminal());
        assert!(!SyncPhase::Failed.is_active());
    }

    #[test]
    fn request_builder() {
        let req = SyncRequest::new("opp-1")
            .with_attachments(["a", "b"])
            .with_notes("hi")
            .with_email_body("body");
        assert_eq!(req.opportunity_id.as_deref(), Some("opp-1"));
        assert_eq!(req.attachment_ids, ["a", "b"]);
        assert_eq!(req.notes, "hi");
        assert_eq!(req.email_body.as_deref(), Some("body"));
        assert!(req.detail.is_none());
    }

    #[test]
    fn failure_serializes_error_text() {
        let outcome = SyncOutcome::Failed(SyncFailure {
            phase: SyncPhase::Validating,
            error: SyncError::validation("Please select an opportunity"),
            orphaned_files: Vec::new(),
            message: "Error: Please select an opportunity".into(),
        });
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["phase"], "validating");
        assert_eq!(json["error"], "Please select an opportunity");
    }
}
