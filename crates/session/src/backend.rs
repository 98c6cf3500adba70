use std::io::{ErrorKind, Write as _};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::SessionError;

/// A single durable slot holding the serialized session.
///
/// Implementations must be `Send + Sync`. Values are opaque strings; parsing
/// is the store's concern.
pub trait SessionBackend: Send + Sync {
    /// Read the stored value. Returns `None` if nothing is stored.
    fn load(&self) -> Result<Option<String>, SessionError>;

    /// Overwrite the stored value.
    fn save(&self, value: &str) -> Result<(), SessionError>;

    /// Remove the stored value. Removing an absent value is not an error.
    fn remove(&self) -> Result<(), SessionError>;
}

/// Stores the session as a JSON file.
///
/// The file is replaced atomically and, on Unix, readable by its owner only.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionBackend for FileBackend {
    fn load(&self) -> Result<Option<String>, SessionError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SessionError::Storage(format!(
                "failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    fn save(&self, value: &str) -> Result<(), SessionError> {
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SessionError::Storage(format!("failed to create {}: {e}", parent.display()))
                })?;
                parent
            }
            None => Path::new("."),
        };
        let write_err = |e: std::io::Error| {
            SessionError::Storage(format!("failed to write {}: {e}", self.path.display()))
        };

        // Temp files are created with mode 0600 on Unix.
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(value.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;
        Ok(())
    }

    fn remove(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Storage(format!(
                "failed to remove {}: {e}",
                self.path.display()
            ))),
        }
    }
}

/// In-memory backend, for tests and ephemeral use.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    value: Mutex<Option<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend that already holds `value`.
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(value.into())),
        }
    }

    /// Snapshot of the stored value.
    pub fn value(&self) -> Option<String> {
        self.value.lock().clone()
    }
}

impl SessionBackend for MemoryBackend {
    fn load(&self) -> Result<Option<String>, SessionError> {
        Ok(self.value.lock().clone())
    }

    fn save(&self, value: &str) -> Result<(), SessionError> {
        *self.value.lock() = Some(value.to_owned());
        Ok(())
    }

    fn remove(&self) -> Result<(), SessionError> {
        *self.value.lock() = None;
        Ok(())
    }
}

impl<T: SessionBackend + ?Sized> SessionBackend for std::sync::Arc<T> {
    fn load(&self) -> Result<Option<String>, SessionError> {
        (**self).load()
    }

    fn save(&self, value: &str) -> Result<(), SessionError> {
        (**self).save(value)
    }

    fn remove(&self) -> Result<(), SessionError> {
        (**self).remove()
    }
}
