use async_trait::async_trait;
use oppnote_core::{Session, SyncError};
use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::backend::SessionBackend;
use crate::error::SessionError;

/// Looks up a user's human-readable name.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Return the display name of `session`'s user, if the directory has one.
    async fn display_name(&self, session: &Session) -> Result<Option<String>, SyncError>;
}

/// Owns the current session and writes every change through to a backend.
///
/// Other components receive sessions by value or reference and never mutate
/// the stored one.
pub struct SessionStore {
    backend: Box<dyn SessionBackend>,
    current: RwLock<Option<Session>>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("current", &*self.current.read())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Open a store, loading any previously persisted session.
    ///
    /// An unreadable or corrupt value is logged and treated as "signed out".
    pub fn open(backend: impl SessionBackend + 'static) -> Self {
        let current = match backend.load() {
            Ok(Some(raw)) => match serde_json::from_str::<Session>(&raw) {
                Ok(session) => {
                    debug!(user_id = %session.user_id, "restored persisted session");
                    Some(session)
                }
                Err(e) => {
                    warn!(error = %e, "ignoring corrupt persisted session");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "could not read persisted session");
                None
            }
        };

        Self {
            backend: Box::new(backend),
            current: RwLock::new(current),
        }
    }

    /// The current session, if signed in.
    pub fn current(&self) -> Option<Session> {
        self.current.read().clone()
    }

    /// Replace the current session and persist it.
    ///
    /// The in-memory session is updated even if persisting fails.
    pub fn set_session(&self, session: Session) -> Result<(), SessionError> {
        let serialized = serde_json::to_string(&session)
            .map_err(|e| SessionError::Serialization(e.to_string()))?;
        *self.current.write() = Some(session);
        self.backend.save(&serialized)
    }

    /// Sign out: drop the session and remove it from durable storage.
    pub fn clear(&self) -> Result<(), SessionError> {
        *self.current.write() = None;
        info!("session cleared");
        self.backend.remove()
    }

    /// Make sure `session` carries a display name.
    ///
    /// Returns it unchanged, without a lookup, when a name is already present.
    /// Otherwise the name is fetched, merged, stored as the current session
    /// and returned.
    #[instrument(skip(self, directory, session), fields(user_id = %session.user_id))]
    pub async fn resolve_display_name(
        &self,
        directory: &dyn UserDirectory,
        session: Session,
    ) -> Result<Session, SessionError> {
        if session
            .user_display_name
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty())
        {
            return Ok(session);
        }

        let Some(name) = directory.display_name(&session).await? else {
            debug!("user directory has no display name");
            return Ok(session);
        };

        let resolved = session.with_display_name(name);
        self.set_session(resolved.clone())?;
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::backend::MemoryBackend;

    fn session() -> Session {
        Session {
            access_token: "tok".into(),
            refresh_token: "ref".into(),
            user_id: "u-1".into(),
            user_display_name: None,
            access_token_expiry: "1700000000".into(),
            refresh_token_expiry: "1800000000".into(),
        }
    }

    struct CountingDirectory {
        calls: AtomicUsize,
        name: Option<String>,
    }

    #[async_trait]
    impl UserDirectory for CountingDirectory {
        async fn display_name(&self, _session: &Session) -> Result<Option<String>, SyncError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.name.clone())
        }
    }

    struct FailingDirectory;

    #[async_trait]
    impl UserDirectory for FailingDirectory {
        async fn display_name(&self, _session: &Session) -> Result<Option<String>, SyncError> {
            Err(SyncError::AuthorizationExpired("HTTP 401".into()))
        }
    }

    #[test]
    fn empty_backend_means_signed_out() {
        let store = SessionStore::open(MemoryBackend::new());
        assert!(store.current().is_none());
    }

    #[test]
    fn corrupt_backend_means_signed_out() {
        let store = SessionStore::open(MemoryBackend::with_value("{not json"));
        assert!(store.current().is_none());
    }

    #[test]
    fn set_and_clear_write_through() {
        let backend = Arc::new(MemoryBackend::new());
        let store = SessionStore::open(Arc::clone(&backend));

        store.set_session(session()).unwrap();
        assert_eq!(store.current(), Some(session()));
        let persisted: Session = serde_json::from_str(&backend.value().unwrap()).unwrap();
        assert_eq!(persisted, session());

        // A fresh store over the same backend sees the session.
        let reopened = SessionStore::open(Arc::clone(&backend));
        assert_eq!(reopened.current(), Some(session()));

        store.clear().unwrap();
        assert!(store.current().is_none());
        assert!(backend.value().is_none());
    }

    #[tokio::test]
    async fn resolve_display_name_fetches_once() {
        let store = SessionStore::open(MemoryBackend::new());
        let directory = CountingDirectory {
            calls: AtomicUsize::new(0),
            name: Some("Ada Lovelace".into()),
        };

        let resolved = store
            .resolve_display_name(&directory, session())
            .await
            .unwrap();
        assert_eq!(resolved.user_display_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(store.current(), Some(resolved.clone()));

        let again = store.resolve_display_name(&directory, resolved).await.unwrap();
        assert_eq!(again.user_display_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(directory.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn resolve_display_name_without_a_name_keeps_session() {
        let store = SessionStore::open(MemoryBackend::new());
        let directory = CountingDirectory {
            calls: AtomicUsize::new(0),
            name: None,
        };
        let out = store
            .resolve_display_name(&directory, session())
            .await
            .unwrap();
        assert_eq!(out, session());
        assert!(store.current().is_none());
    }

    #[tokio::test]
    async fn resolve_display_name_surfaces_lookup_errors() {
        let store = SessionStore::open(MemoryBackend::new());
        let err = store
            .resolve_display_name(&FailingDirectory, session())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Lookup(SyncError::AuthorizationExpired(_))
        ));
    }
}
