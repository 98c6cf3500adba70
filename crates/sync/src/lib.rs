//! The email-to-opportunity sync workflow.
//!
//! [`SyncOrchestrator`] sequences the collaborators defined in [`ports`]:
//! attachment content comes from a [`MailContext`], is stored through a
//! [`FileUploader`], referenced from a freshly composed note, and merged into
//! the opportunity's history through an [`OpportunityDirectory`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use oppnote_sync::memory::{MemoryCrm, MemoryMailbox};
//! use oppnote_sync::{SyncOrchestrator, SyncRequest};
//!
//! # async fn example(session: oppnote_core::Session, detail: oppnote_core::Opportunity) {
//! let mail = Arc::new(MemoryMailbox::new().with_subject("RE: quote"));
//! let crm = Arc::new(MemoryCrm::new());
//! let orchestrator = SyncOrchestrator::new(mail, crm.clone(), crm);
//!
//! let request = SyncRequest::new(detail.id.clone())
//!     .with_detail(detail)
//!     .with_notes("Called customer");
//! let outcome = orchestrator.run(Some(&session), request).await;
//! println!("{}", outcome.message());
//! # }
//! ```

pub mod memory;
pub mod orchestrator;
pub mod ports;

pub use orchestrator::{
    SyncFailure, SyncOrchestrator, SyncOutcome, SyncPhase, SyncRequest, SyncSuccess,
};
pub use ports::{FileUploader, MailContext, OpportunityDirectory};
