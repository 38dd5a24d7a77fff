//! Locked, atomic access to the relay configuration file.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::relay_config::document::{RelayDocument, Residuals};

#[derive(Debug, Error)]
pub enum ConfigStoreError {
    #[error("I/O error on relay config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse relay config '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to encode relay config: {0}")]
    Encode(#[from] toml::ser::Error),
}

impl ConfigStoreError {
    /// True when the backing file does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConfigStoreError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Owner of the relay configuration file.
///
/// Reads share the lock, writes and read-modify-write cycles hold it
/// exclusively. Nothing else in the crate touches the file.
pub struct ConfigStore {
    path: PathBuf,
    lock: RwLock<()>,
    residuals: Mutex<Residuals>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
            residuals: Mutex::new(Residuals::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);
        self.path.exists()
    }

    /// Load and parse the whole document.
    ///
    /// A missing file is reported as an I/O error; callers decide whether to
    /// populate defaults.
    pub fn read(&self) -> Result<RelayDocument, ConfigStoreError> {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);
        let doc = self.load()?;
        self.remember(&doc);
        Ok(doc)
    }

    /// Replace the file with `doc`, keeping unmodeled keys seen at the last read.
    pub fn write(&self, doc: RelayDocument) -> Result<(), ConfigStoreError> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);
        let mut doc = doc;
        doc.absorb_residuals(&self.residuals.lock().unwrap_or_else(PoisonError::into_inner));
        self.persist(&doc)?;
        self.remember(&doc);
        Ok(())
    }

    /// Read, mutate and write back inside one critical section.
    pub fn update_section<F>(&self, mutator: F) -> Result<RelayDocument, ConfigStoreError>
    where
        F: FnOnce(&mut RelayDocument),
    {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);
        let mut doc = self.load()?;
        mutator(&mut doc);
        self.persist(&doc)?;
        self.remember(&doc);
        Ok(doc)
    }

    fn load(&self) -> Result<RelayDocument, ConfigStoreError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| ConfigStoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigStoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn persist(&self, doc: &RelayDocument) -> Result<(), ConfigStoreError> {
        let staged = self.stage(doc)?;
        staged.persist(&self.path).map_err(|e| ConfigStoreError::Io {
            path: self.path.clone(),
            source: e.error,
        })?;
        tracing::debug!(path = %self.path.display(), "Relay config written");
        Ok(())
    }

    /// Encode `doc` into a synced temporary file next to the target.
    pub(crate) fn stage(&self, doc: &RelayDocument) -> Result<NamedTempFile, ConfigStoreError> {
        let content = toml::to_string(doc)?;
        let io_err = |source| ConfigStoreError::Io {
            path: self.path.clone(),
            source,
        };

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(parent).map_err(io_err)?;
        tmp.write_all(content.as_bytes()).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        Ok(tmp)
    }

    fn remember(&self, doc: &RelayDocument) {
        *self.residuals.lock().unwrap_or_else(PoisonError::into_inner) = doc.residuals();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::entry::AccessMode;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"[info]
name = "test relay"
favicon = "icon.png"

[limits]
messages_per_sec = 10
broadcast_buffer = 16384

[verified_users]
mode = "passive"
"#;

    fn store_with(content: &str) -> (TempDir, ConfigStore) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, ConfigStore::new(path))
    }

    #[test]
    fn test_round_trip_is_stable() {
        let (_dir, store) = store_with(SAMPLE);

        let first = store.read().unwrap();
        store.write(first.clone()).unwrap();
        let bytes_once = std::fs::read(store.path()).unwrap();

        let second = store.read().unwrap();
        assert_eq!(first, second);

        store.write(second).unwrap();
        let bytes_twice = std::fs::read(store.path()).unwrap();
        assert_eq!(bytes_once, bytes_twice);
    }

    #[test]
    fn test_write_restores_residuals_from_last_read() {
        let (_dir, store) = store_with(SAMPLE);
        store.read().unwrap();

        let mut doc = RelayDocument::default();
        doc.limits.messages_per_sec = Some(20);
        store.write(doc).unwrap();

        let reread = store.read().unwrap();
        assert_eq!(reread.limits.messages_per_sec, Some(20));
        assert_eq!(reread.limits.extra["broadcast_buffer"].as_integer(), Some(16384));
        assert_eq!(reread.info.extra["favicon"].as_str(), Some("icon.png"));
        assert!(reread.extra.contains_key("verified_users"));
    }

    #[test]
    fn test_missing_file_is_not_created() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().join("absent.toml"));

        let err = store.read().unwrap_err();
        assert!(err.is_not_found());
        assert!(!store.exists());
    }

    #[test]
    fn test_malformed_file_is_left_alone() {
        let (_dir, store) = store_with("[info\nname = ");

        let err = store.update_section(|doc| doc.info.name = Some("x".into())).unwrap_err();
        assert!(matches!(err, ConfigStoreError::Parse { .. }));
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "[info\nname = ");
    }

    #[test]
    fn test_abandoned_stage_leaves_target_intact() {
        let (dir, store) = store_with(SAMPLE);
        let mut doc = store.read().unwrap();
        doc.info.name = Some("half written".into());

        // Crash between staging and rename: the temp file is dropped unpersisted.
        let staged = store.stage(&doc).unwrap();
        drop(staged);

        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), SAMPLE);
        assert_eq!(store.read().unwrap().info.name.as_deref(), Some("test relay"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let (_dir, store) = store_with(SAMPLE);
        let store = std::sync::Arc::new(store);

        let mut threads = Vec::new();
        for i in 0..8u32 {
            let store = store.clone();
            threads.push(std::thread::spawn(move || {
                if i % 2 == 0 {
                    store
                        .update_section(|doc| {
                            let list = doc.authorization.pubkey_whitelist.get_or_insert_with(Vec::new);
                            list.push(format!("key{i}"));
                        })
                        .unwrap();
                } else {
                    store
                        .update_section(|doc| {
                            let current = doc.limits.subscriptions_per_min.unwrap_or(0);
                            doc.limits.subscriptions_per_min = Some(current + 1);
                        })
                        .unwrap();
                }
            }));
        }
        for t in threads {
            t.join().unwrap();
        }

        let doc = store.read().unwrap();
        assert_eq!(doc.whitelist().len(), 4);
        assert_eq!(doc.limits.subscriptions_per_min, Some(4));
        assert_eq!(doc.limits.messages_per_sec, Some(10));
    }

    #[test]
    fn test_same_section_last_writer_wins() {
        let (_dir, store) = store_with(SAMPLE);

        store
            .update_section(|doc| doc.authorization.access_mode = Some(AccessMode::Whitelist))
            .unwrap();
        store
            .update_section(|doc| doc.authorization.access_mode = Some(AccessMode::Blacklist))
            .unwrap();

        assert_eq!(store.read().unwrap().access_mode(), AccessMode::Blacklist);
    }
}
