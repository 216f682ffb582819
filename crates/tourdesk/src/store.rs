// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential persistence: a string key-value capability with in-memory and
//! JSON-file backends.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

/// Errors from a persisting [`CredentialStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("credential file {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("credential file {path} is not a JSON string map: {source}")]
    Json { path: PathBuf, source: serde_json::Error },
}

/// Process-wide persisted key-value store for credentials.
///
/// Reads never fail; writes report persistence errors but the new value is
/// visible to subsequent reads either way.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Non-persistent store, for tests and one-shot processes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with initial entries.
    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let values = entries.into_iter().map(|(k, v)| (k.to_owned(), v.to_owned())).collect();
        Self { values: Mutex::new(values) }
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.values.lock().remove(key);
        Ok(())
    }
}

/// Store backed by a JSON object file, rewritten atomically on every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`. A missing file is empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|source| StoreError::Json { path: path.clone(), source })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        Ok(Self { path, values: Mutex::new(values) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<(), StoreError> {
        save(&self.path, values)
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock();
        if values.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        values.insert(key.to_owned(), value.to_owned());
        self.persist(&values)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock();
        if values.remove(key).is_none() {
            return Ok(());
        }
        self.persist(&values)
    }
}

/// Write `values` to `path` atomically (write tmp + rename).
///
/// The temp name carries PID and a counter so concurrent saves never share a
/// temp file.
fn save(path: &Path, values: &BTreeMap<String, String>) -> Result<(), StoreError> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let io_err = |source: std::io::Error| StoreError::Io { path: path.to_path_buf(), source };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let json = serde_json::to_string_pretty(values)
        .map_err(|source| StoreError::Json { path: path.to_path_buf(), source })?;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, json).map_err(io_err)?;
    std::fs::rename(&tmp_path, path).map_err(io_err)?;
    Ok(())
}

/// Resolve the state directory for tourdesk data.
///
/// Checks `TOURDESK_STATE_DIR`, then `$XDG_STATE_HOME/tourdesk`,
/// then `$HOME/.local/state/tourdesk`.
pub fn state_dir() -> PathBuf {
    state_dir_with(|name| std::env::var(name).ok())
}

fn state_dir_with(get_env: impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(dir) = get_env("TOURDESK_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Some(xdg) = get_env("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("tourdesk");
    }
    if let Some(home) = get_env("HOME") {
        return PathBuf::from(home).join(".local/state/tourdesk");
    }
    PathBuf::from(".tourdesk")
}

/// Default credential file location.
pub fn default_credentials_path() -> PathBuf {
    state_dir().join("credentials.json")
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
