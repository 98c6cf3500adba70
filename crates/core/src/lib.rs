//! Core types for filing emails as notes on CRM opportunities.
//!
//! This crate holds the data model shared by every other oppnote crate, the
//! [`SyncError`] taxonomy that a sync run terminates with, and the pure
//! [`NoteComposer`].

pub mod attachment;
pub mod error;
pub mod note;
pub mod opportunity;
pub mod session;

pub use attachment::{AttachmentContent, AttachmentRef};
pub use error::SyncError;
pub use note::{EmailSender, NoteComposer, NoteInput};
pub use opportunity::{
    Account, BlockUser, ContentBlock, NoteData, Opportunity, OpportunityPage, OpportunitySummary,
    StoredFile,
};
pub use session::Session;
