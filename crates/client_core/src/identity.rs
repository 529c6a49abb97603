//! Local key-value storage and the current-user lookup built on it.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use shared::domain::CurrentUser;
use tracing::debug;

use crate::error::IdentityError;

pub const USER_KEY: &str = "user";
pub const JWT_KEY: &str = "jwt";

/// Resolves who is submitting bills.
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Result<CurrentUser, IdentityError>;

    fn current_email(&self) -> Result<String, IdentityError> {
        self.current_user()?
            .email
            .filter(|email| !email.is_empty())
            .ok_or(IdentityError::MissingEmail)
    }
}

/// String key-value store, optionally mirrored to a JSON file.
#[derive(Debug, Default)]
pub struct LocalStorage {
    path: Option<PathBuf>,
    entries: RwLock<BTreeMap<String, String>>,
}

impl LocalStorage {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens a file-backed storage. A missing file starts empty.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err),
        };
        debug!(path = %path.display(), "opened local storage");
        Ok(Self {
            path: Some(path),
            entries: RwLock::new(entries),
        })
    }

    pub fn get_item(&self, key: &str) -> Option<String> {
        self.read().get(key).cloned()
    }

    pub fn set_item(&self, key: &str, value: impl Into<String>) -> io::Result<()> {
        let mut entries = self.write();
        entries.insert(key.to_string(), value.into());
        self.flush(&entries)
    }

    pub fn remove_item(&self, key: &str) -> io::Result<()> {
        let mut entries = self.write();
        entries.remove(key);
        self.flush(&entries)
    }

    pub fn clear(&self) -> io::Result<()> {
        let mut entries = self.write();
        entries.clear();
        self.flush(&entries)
    }

    pub fn set_user(&self, user: &CurrentUser) -> io::Result<()> {
        let raw = serde_json::to_string(user)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.set_item(USER_KEY, raw)
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(entries)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, raw)
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, String>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, String>> {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl IdentityProvider for LocalStorage {
    fn current_user(&self) -> Result<CurrentUser, IdentityError> {
        let raw = self.get_item(USER_KEY).ok_or(IdentityError::MissingUser)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Identity fixed at construction, for callers that already know the user.
#[derive(Debug, Clone)]
pub struct StaticIdentity(pub CurrentUser);

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Result<CurrentUser, IdentityError> {
        Ok(self.0.clone())
    }
}
