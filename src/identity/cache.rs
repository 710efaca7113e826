// src/identity/cache.rs
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::CacheError;
use crate::timeline::types::UserId;

/// Handle -> identifier mapping as persisted between runs.
pub type IdentityMap = BTreeMap<String, UserId>;

/// Durable key-value storage for resolved identities.
pub trait IdentityStore: Send + Sync {
    fn load(&self) -> Result<IdentityMap, CacheError>;
    fn persist(&self, map: &IdentityMap) -> Result<(), CacheError>;
}

impl<T: IdentityStore + ?Sized> IdentityStore for Arc<T> {
    fn load(&self) -> Result<IdentityMap, CacheError> {
        (**self).load()
    }

    fn persist(&self, map: &IdentityMap) -> Result<(), CacheError> {
        (**self).persist(map)
    }
}

/// Default cache location under the user's home directory.
pub fn default_cache_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tweet_notifier")
        .join("identity_cache.json")
}

/// JSON file store. Writes go to a sibling temp file which is then renamed
/// over the target, so a killed process never leaves a half-written cache.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> CacheError {
        CacheError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl IdentityStore for JsonFileStore {
    /// A missing file is an empty cache.
    fn load(&self) -> Result<IdentityMap, CacheError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(IdentityMap::new()),
            Err(e) => return Err(self.io_err(e)),
        };
        if raw.trim().is_empty() {
            return Ok(IdentityMap::new());
        }
        serde_json::from_str(&raw).map_err(|source| CacheError::Decode {
            path: self.path.clone(),
            source,
        })
    }

    fn persist(&self, map: &IdentityMap) -> Result<(), CacheError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| self.io_err(e))?;
        }
        let json = serde_json::to_vec_pretty(map).map_err(CacheError::Encode)?;
        let tmp = self.path.with_extension("json.tmp");
        let mut f = fs::File::create(&tmp).map_err(|e| self.io_err(e))?;
        f.write_all(&json).map_err(|e| self.io_err(e))?;
        f.sync_all().map_err(|e| self.io_err(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))?;
        Ok(())
    }
}
