//! Access list persistence (the system of record).

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::access::entry::{AccessEntry, AccessMode, ListKind};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("access store I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("access store data is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("access store unavailable: {0}")]
    Unavailable(String),
}

/// Everything the store holds, as of one committed transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AccessSnapshot {
    #[serde(default)]
    pub mode: AccessMode,
    #[serde(default)]
    pub whitelist: Vec<AccessEntry>,
    #[serde(default)]
    pub blacklist: Vec<AccessEntry>,
}

impl AccessSnapshot {
    pub fn list(&self, kind: ListKind) -> &[AccessEntry] {
        match kind {
            ListKind::Whitelist => &self.whitelist,
            ListKind::Blacklist => &self.blacklist,
        }
    }

    fn list_mut(&mut self, kind: ListKind) -> &mut Vec<AccessEntry> {
        match kind {
            ListKind::Whitelist => &mut self.whitelist,
            ListKind::Blacklist => &mut self.blacklist,
        }
    }

    /// Pubkeys of `kind`, in stored order.
    pub fn pubkeys(&self, kind: ListKind) -> Vec<String> {
        self.list(kind).iter().map(|e| e.pubkey.clone()).collect()
    }

    /// Replace `kind` with `entries`.
    ///
    /// Keys that were already listed keep their original `added_at`, and every
    /// new member is removed from the opposite list.
    pub fn apply_list(&mut self, kind: ListKind, mut entries: Vec<AccessEntry>) {
        for entry in &mut entries {
            if let Some(existing) = self.list(kind).iter().find(|e| e.pubkey == entry.pubkey) {
                entry.added_at = existing.added_at;
            }
        }

        self.list_mut(kind.opposite())
            .retain(|other| !entries.iter().any(|e| e.pubkey == other.pubkey));
        *self.list_mut(kind) = entries;
    }
}

/// Transactional storage for access lists and the active mode.
///
/// Each method is one transaction: it either commits entirely or leaves the
/// stored state unchanged.
pub trait AccessListStore: Send + Sync {
    fn snapshot(&self) -> Result<AccessSnapshot, StoreError>;

    fn replace_list(&self, kind: ListKind, entries: Vec<AccessEntry>) -> Result<(), StoreError>;

    fn set_mode(&self, mode: AccessMode) -> Result<(), StoreError>;
}

/// In-process store.
#[derive(Default)]
pub struct MemoryAccessStore {
    inner: Mutex<AccessSnapshot>,
}

impl MemoryAccessStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: AccessSnapshot) -> Self {
        Self {
            inner: Mutex::new(snapshot),
        }
    }
}

impl AccessListStore for MemoryAccessStore {
    fn snapshot(&self) -> Result<AccessSnapshot, StoreError> {
        Ok(self.inner.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn replace_list(&self, kind: ListKind, entries: Vec<AccessEntry>) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .apply_list(kind, entries);
        Ok(())
    }

    fn set_mode(&self, mode: AccessMode) -> Result<(), StoreError> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).mode = mode;
        Ok(())
    }
}

/// Store persisted as a JSON file, rewritten atomically on every commit.
pub struct JsonAccessStore {
    path: PathBuf,
    inner: Mutex<AccessSnapshot>,
}

impl JsonAccessStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let snapshot = if path.exists() {
            let content = std::fs::read(&path).map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
            let snapshot: AccessSnapshot = serde_json::from_slice(&content)?;
            tracing::info!(
                path = %path.display(),
                whitelist = snapshot.whitelist.len(),
                blacklist = snapshot.blacklist.len(),
                mode = %snapshot.mode,
                "Loaded access lists"
            );
            snapshot
        } else {
            AccessSnapshot::default()
        };

        Ok(Self {
            path,
            inner: Mutex::new(snapshot),
        })
    }

    /// Apply `change` to a copy, persist it, then publish it in memory.
    fn commit<F>(&self, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut AccessSnapshot),
    {
        let mut current = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = current.clone();
        change(&mut next);
        self.save(&next)?;
        *current = next;
        Ok(())
    }

    fn save(&self, snapshot: &AccessSnapshot) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        let content = serde_json::to_vec_pretty(snapshot)?;

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(parent).map_err(io_err)?;
        tmp.write_all(&content).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

impl AccessListStore for JsonAccessStore {
    fn snapshot(&self) -> Result<AccessSnapshot, StoreError> {
        Ok(self.inner.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn replace_list(&self, kind: ListKind, entries: Vec<AccessEntry>) -> Result<(), StoreError> {
        self.commit(|snapshot| snapshot.apply_list(kind, entries))
    }

    fn set_mode(&self, mode: AccessMode) -> Result<(), StoreError> {
        self.commit(|snapshot| snapshot.mode = mode)
    }
}
