//! Persistent client storage and the signed-in session.
//!
//! Five string keys are kept: token, user id, role, email and a cached
//! display name. They are written together on login, read on every view
//! mount, and cleared together on logout or on a 401.

use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use crate::{
    domain::{Role, UserId},
    error::ClientError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StorageKey {
    Token,
    UserId,
    UserRole,
    UserEmail,
    UserName,
}

impl StorageKey {
    pub const ALL: [StorageKey; 5] = [
        StorageKey::Token,
        StorageKey::UserId,
        StorageKey::UserRole,
        StorageKey::UserEmail,
        StorageKey::UserName,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::Token => "token",
            StorageKey::UserId => "userId",
            StorageKey::UserRole => "userRole",
            StorageKey::UserEmail => "userEmail",
            StorageKey::UserName => "userName",
        }
    }
}

/// String key-value storage
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: StorageKey) -> Result<Option<String>, ClientError>;

    /// Write every entry in one step
    fn set_many(&self, entries: &[(StorageKey, String)]) -> Result<(), ClientError>;

    /// Remove every key in one step
    fn clear(&self) -> Result<(), ClientError>;
}

/// JSON object file, replaced through a temp file and a rename on every write
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>, ClientError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(storage_error(&self.path, e)),
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|e| storage_error(&self.path, e))
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| storage_error(parent, e))?;
        }

        let json = serde_json::to_string_pretty(map).map_err(|e| storage_error(&self.path, e))?;
        let tmp_path = self.path.with_extension("json.tmp");
        let mut tmp_file = File::create(&tmp_path).map_err(|e| storage_error(&tmp_path, e))?;
        tmp_file
            .write_all(json.as_bytes())
            .and_then(|_| tmp_file.sync_all())
            .map_err(|e| storage_error(&tmp_path, e))?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path).map_err(|e| storage_error(&self.path, e))
    }
}

fn storage_error(path: &Path, error: impl std::fmt::Display) -> ClientError {
    ClientError::Storage(format!("{}: {}", path.display(), error))
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> ClientError {
    ClientError::Storage("storage lock poisoned".to_string())
}

impl KeyValueStore for FileStore {
    fn get(&self, key: StorageKey) -> Result<Option<String>, ClientError> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        Ok(self.read_map()?.remove(key.as_str()))
    }

    fn set_many(&self, entries: &[(StorageKey, String)]) -> Result<(), ClientError> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        let mut map = self.read_map()?;
        for (key, value) in entries {
            map.insert(key.as_str().to_string(), value.clone());
        }
        self.write_map(&map)
    }

    fn clear(&self) -> Result<(), ClientError> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(&self.path, e)),
        }
    }
}

/// In-process storage for tests and one-shot commands
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<StorageKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: StorageKey) -> Result<Option<String>, ClientError> {
        Ok(self.entries.lock().map_err(poisoned)?.get(&key).cloned())
    }

    fn set_many(&self, entries: &[(StorageKey, String)]) -> Result<(), ClientError> {
        let mut map = self.entries.lock().map_err(poisoned)?;
        for (key, value) in entries {
            map.insert(*key, value.clone());
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        self.entries.lock().map_err(poisoned)?.clear();
        Ok(())
    }
}

/// The client's record of an authenticated identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user_id: UserId,
    pub role: Role,
}

/// Session accessors over a [`KeyValueStore`]
#[derive(Clone)]
pub struct SessionStorage {
    store: Arc<dyn KeyValueStore>,
}

impl SessionStorage {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileStore::new(path)))
    }

    /// Current session. Incomplete or unreadable entries count as signed out.
    pub fn session(&self) -> Result<Option<Session>, ClientError> {
        let Some(token) = self.store.get(StorageKey::Token)? else {
            return Ok(None);
        };
        let user_id = self
            .store
            .get(StorageKey::UserId)?
            .and_then(|id| id.parse::<UserId>().ok());
        let role = self
            .store
            .get(StorageKey::UserRole)?
            .and_then(|role| Role::parse(&role));

        match (user_id, role) {
            (Some(user_id), Some(role)) if !token.is_empty() => Ok(Some(Session {
                token,
                user_id,
                role,
            })),
            _ => Ok(None),
        }
    }

    pub fn token(&self) -> Result<Option<String>, ClientError> {
        Ok(self
            .store
            .get(StorageKey::Token)?
            .filter(|token| !token.is_empty()))
    }

    pub fn email(&self) -> Result<Option<String>, ClientError> {
        self.store.get(StorageKey::UserEmail)
    }

    pub fn display_name(&self) -> Result<Option<String>, ClientError> {
        Ok(self
            .store
            .get(StorageKey::UserName)?
            .filter(|name| !name.trim().is_empty()))
    }

    /// Persist a fresh login
    pub fn write_login(&self, session: &Session, email: &str) -> Result<(), ClientError> {
        self.store.set_many(&[
            (StorageKey::Token, session.token.clone()),
            (StorageKey::UserId, session.user_id.to_string()),
            (StorageKey::UserRole, session.role.as_str().to_string()),
            (StorageKey::UserEmail, email.to_string()),
        ])
    }

    pub fn cache_display_name(&self, name: &str) -> Result<(), ClientError> {
        self.store
            .set_many(&[(StorageKey::UserName, name.to_string())])
    }

    pub fn clear(&self) -> Result<(), ClientError> {
        self.store.clear()
    }
}
