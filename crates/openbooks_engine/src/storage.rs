//! Key/value storage for client state, one JSON blob per key.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::persist::{AtomicFileWriter, PersistError};

pub const HISTORY_KEY: &str = "history";
pub const ACTIVE_KEY: &str = "active";
pub const CONNECTION_KEY: &str = "connection";
pub const VERSION_KEY: &str = "version";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage key {0:?}")]
    InvalidKey(String),
    #[error("invalid JSON under {key:?}: {source}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub trait Storage: Send {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

pub fn read_json<T: DeserializeOwned>(
    storage: &dyn Storage,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match storage.read(key)? {
        Some(text) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| StorageError::Json {
                key: key.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

pub fn write_json<T: Serialize + ?Sized>(
    storage: &mut dyn Storage,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let text = serde_json::to_string(value).map_err(|source| StorageError::Json {
        key: key.to_string(),
        source,
    })?;
    storage.write(key, &text)
}

/// Stores each key as `{dir}/{key}.json`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    writer: AtomicFileWriter,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir),
        }
    }

    pub fn dir(&self) -> &Path {
        self.writer.dir()
    }

    fn file_name(key: &str) -> Result<String, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if valid {
            Ok(format!("{key}.json"))
        } else {
            Err(StorageError::InvalidKey(key.to_string()))
        }
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.dir().join(Self::file_name(key)?);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.writer
            .write(&Self::file_name(key)?, value.as_bytes())
            .map(|_| ())
            .map_err(StorageError::from)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let path = self.dir().join(Self::file_name(key)?);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-memory storage for tests and ephemeral sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: BTreeMap<String, String>,
    fail_writes: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage whose writes and removals always fail. Reads still work.
    pub fn failing() -> Self {
        Self {
            entries: BTreeMap::new(),
            fail_writes: true,
        }
    }

    pub fn set_failing(&mut self, failing: bool) {
        self.fail_writes = failing;
    }

    pub fn with_entry(mut self, key: &str, value: &str) -> Self {
        self.entries.insert(key.to_string(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Unavailable(format!("write to {key:?} refused")));
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Unavailable(format!("remove of {key:?} refused")));
        }
        self.entries.remove(key);
        Ok(())
    }
}
