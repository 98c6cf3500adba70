//! Session lifecycle for oppnote.
//!
//! [`SessionStore`] owns the current [`Session`](oppnote_core::Session): it is
//! created on login, enriched with the user's display name, and cleared on
//! logout. Every mutation is written through to a [`SessionBackend`], a single
//! durable key holding the serialized session.

pub mod backend;
pub mod error;
pub mod store;

pub use backend::{FileBackend, MemoryBackend, SessionBackend};
pub use error::SessionError;
pub use store::{SessionStore, UserDirectory};
