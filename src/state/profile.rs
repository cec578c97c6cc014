//! Display-name storage.
//!
//! The session never reads the name from a global; callers load it from a
//! [`NameStore`] and pass it in.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Key under which the display name is kept.
pub const NAME_KEY: &str = "name";

#[derive(Debug, thiserror::Error)]
pub enum NameStoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt store {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// String key/value store.
pub trait NameStore {
    fn get(&self, key: &str) -> Result<Option<String>, NameStoreError>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), NameStoreError>;

    /// Stored display name, or empty if none was saved.
    fn display_name(&self) -> Result<String, NameStoreError> {
        Ok(self.get(NAME_KEY)?.unwrap_or_default())
    }

    fn set_display_name(&mut self, name: &str) -> Result<(), NameStoreError> {
        self.set(NAME_KEY, name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryNameStore {
    values: HashMap<String, String>,
}

impl MemoryNameStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NameStore for MemoryNameStore {
    fn get(&self, key: &str) -> Result<Option<String>, NameStoreError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), NameStoreError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Flat JSON object on disk. A missing file reads as empty.
#[derive(Debug, Clone)]
pub struct JsonFileNameStore {
    path: PathBuf,
}

impl JsonFileNameStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<HashMap<String, String>, NameStoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(source) => {
                return Err(NameStoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&text).map_err(|source| NameStoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }
}

impl NameStore for JsonFileNameStore {
    fn get(&self, key: &str) -> Result<Option<String>, NameStoreError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), NameStoreError> {
        let mut values = self.load()?;
        values.insert(key.to_string(), value.to_string());

        let text = serde_json::to_string_pretty(&values).map_err(|source| {
            NameStoreError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;
        fs::write(&self.path, text).map_err(|source| NameStoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}
