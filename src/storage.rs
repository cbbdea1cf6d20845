use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

use crate::models::TokenPair;

/// Storage key for the access token.
pub const ACCESS_TOKEN_KEY: &str = "token";
/// Storage key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("token store io error: {0}")]
    Io(#[from] io::Error),
    #[error("token store is not valid json: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("token store lock poisoned")]
    Poisoned,
}

/// Durable client-side home of the two session tokens.
///
/// `save` writes both entries in one step and `clear` removes both, so a
/// reader never observes one token without the other having been written
/// by the same call.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<TokenPair>, StorageError>;
    fn save(&self, tokens: &TokenPair) -> Result<(), StorageError>;
    fn clear(&self) -> Result<(), StorageError>;
}

type Entries = BTreeMap<String, String>;

fn entries_for(tokens: &TokenPair) -> Entries {
    let mut entries = Entries::new();
    entries.insert(ACCESS_TOKEN_KEY.to_string(), tokens.access.clone());
    entries.insert(REFRESH_TOKEN_KEY.to_string(), tokens.refresh.clone());
    entries
}

/// Only the access token decides whether a session is stored.
fn tokens_from(entries: &Entries) -> Option<TokenPair> {
    let access = entries.get(ACCESS_TOKEN_KEY).filter(|s| !s.is_empty())?;
    Some(TokenPair {
        access: access.clone(),
        refresh: entries.get(REFRESH_TOKEN_KEY).cloned().unwrap_or_default(),
    })
}

/* -------------------------
   File store
--------------------------*/

/// JSON object of key -> string on disk. Writes go through a sibling temp
/// file and a rename.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<Entries, StorageError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Entries::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_entries(&self, entries: &Entries) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<TokenPair>, StorageError> {
        Ok(tokens_from(&self.read_entries()?))
    }

    fn save(&self, tokens: &TokenPair) -> Result<(), StorageError> {
        // keep unrelated keys other tools may have left in the file
        let mut entries = match self.read_entries() {
            Ok(entries) => entries,
            Err(StorageError::Encoding(_)) => Entries::new(),
            Err(e) => return Err(e),
        };
        entries.extend(entries_for(tokens));
        self.write_entries(&entries)
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut entries = match self.read_entries() {
            Ok(entries) => entries,
            // unreadable file holds nothing worth keeping
            Err(StorageError::Encoding(_)) => Entries::new(),
            Err(e) => return Err(e),
        };
        entries.remove(ACCESS_TOKEN_KEY);
        entries.remove(REFRESH_TOKEN_KEY);
        if entries.is_empty() {
            match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        } else {
            self.write_entries(&entries)
        }
    }
}

/* -------------------------
   In-memory store
--------------------------*/

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: Mutex<Entries>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: &TokenPair) -> Self {
        Self {
            entries: Mutex::new(entries_for(tokens)),
        }
    }

    /// Raw entry lookup, as a browser storage `getItem` would.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<TokenPair>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(tokens_from(&entries))
    }

    fn save(&self, tokens: &TokenPair) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.extend(entries_for(tokens));
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.remove(ACCESS_TOKEN_KEY);
        entries.remove(REFRESH_TOKEN_KEY);
        Ok(())
    }
}
