//! Persistence of the single cached session token.
//!
//! A persisted credential that is missing, too short, or malformed is
//! treated as absent rather than as an error, so the caller simply
//! re-authenticates.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::CredentialStoreError;

/// Persisted content at or below this length is never a usable session.
pub const MIN_CREDENTIAL_LEN: usize = 10;

/// A session-derived bearer token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Returns `true` if the token is blank.
    pub fn is_empty(&self) -> bool {
        self.token.trim().is_empty()
    }

    /// Masked form of the token, safe to print.
    pub fn preview(&self) -> String {
        let token = &self.token;
        if token.len() > 20 && token.is_char_boundary(8) && token.is_char_boundary(token.len() - 8)
        {
            format!("{}...{}", &token[..8], &token[token.len() - 8..])
        } else {
            "********".to_string()
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &self.preview())
            .finish()
    }
}

/// Storage for the process-wide credential.
pub trait CredentialStore: Send + Sync {
    /// Returns the persisted credential, or `None` if there is no usable one.
    fn load(&self) -> Option<Credential>;

    /// Replaces the persisted credential wholesale.
    fn save(&self, credential: &Credential) -> Result<(), CredentialStoreError>;

    /// Removes the persisted credential. Returns `false` if there was none.
    fn clear(&self) -> Result<bool, CredentialStoreError>;
}

/// Credential persisted as a small JSON document: `{"token": "..."}`.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Option<Credential> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No stored credential at {}", self.path.display());
                return None;
            }
            Err(e) => {
                tracing::warn!("Failed to read credential file {}: {}", self.path.display(), e);
                return None;
            }
        };

        if content.len() <= MIN_CREDENTIAL_LEN {
            tracing::debug!("Stored credential at {} is empty", self.path.display());
            return None;
        }

        match serde_json::from_str::<Credential>(&content) {
            Ok(credential) if !credential.is_empty() => Some(credential),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(
                    "Ignoring malformed credential file {}: {}",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    fn save(&self, credential: &Credential) -> Result<(), CredentialStoreError> {
        let dir = self.parent_dir();
        fs::create_dir_all(&dir)?;

        let content = serde_json::to_string(credential)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;

        tracing::debug!("Saved credential to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<bool, CredentialStoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process credential store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credential: Mutex<Option<Credential>>,
    saves: AtomicUsize,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `credential`.
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            credential: Mutex::new(Some(credential)),
            saves: AtomicUsize::new(0),
        }
    }

    /// Number of successful `save` calls.
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Option<Credential> {
        let guard = self.credential.lock().unwrap_or_else(|e| e.into_inner());
        guard.clone().filter(|c| !c.is_empty())
    }

    fn save(&self, credential: &Credential) -> Result<(), CredentialStoreError> {
        let mut guard = self.credential.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(credential.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn clear(&self) -> Result<bool, CredentialStoreError> {
        let mut guard = self.credential.lock().unwrap_or_else(|e| e.into_inner());
        Ok(guard.take().is_some())
    }
}
