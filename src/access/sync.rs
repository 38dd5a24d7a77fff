//! Keeps the relay config's authorization section in step with the store.

use std::sync::Arc;

use thiserror::Error;

use crate::access::entry::{validate_entries, AccessEntry, AccessMode, EntryRequest, ListKind, ValidationError};
use crate::access::store::{AccessListStore, AccessSnapshot, StoreError};
use crate::observability::metrics;
use crate::relay_config::{ConfigStoreError, ConfigStore, RelayDocument};

/// Receives "the relay should re-read its config" requests.
///
/// Implementations must not block the caller on the relay actually reloading.
pub trait ReloadNotifier: Send + Sync {
    fn request_reload(&self);
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to persist access lists: {0}")]
    Persist(#[from] StoreError),

    #[error("{change} committed to the database but not projected into the relay config (database is authoritative): {source}")]
    PartialSync {
        change: String,
        #[source]
        source: ConfigStoreError,
    },

    #[error(transparent)]
    Config(#[from] ConfigStoreError),
}

/// Applies access list and mode changes to the store first, then projects
/// the store's current state into the relay config.
pub struct AccessListSynchronizer {
    store: Arc<dyn AccessListStore>,
    config: Arc<ConfigStore>,
    reload: Arc<dyn ReloadNotifier>,
}

impl AccessListSynchronizer {
    pub fn new(
        store: Arc<dyn AccessListStore>,
        config: Arc<ConfigStore>,
        reload: Arc<dyn ReloadNotifier>,
    ) -> Self {
        Self { store, config, reload }
    }

    pub fn list(&self, kind: ListKind) -> Result<Vec<AccessEntry>, SyncError> {
        Ok(self.store.snapshot()?.list(kind).to_vec())
    }

    pub fn mode(&self) -> Result<AccessMode, SyncError> {
        Ok(self.store.snapshot()?.mode)
    }

    pub fn set_whitelist(&self, requests: &[EntryRequest]) -> Result<(), SyncError> {
        self.set_list(ListKind::Whitelist, requests)
    }

    pub fn set_blacklist(&self, requests: &[EntryRequest]) -> Result<(), SyncError> {
        self.set_list(ListKind::Blacklist, requests)
    }

    fn set_list(&self, kind: ListKind, requests: &[EntryRequest]) -> Result<(), SyncError> {
        let entries = validate_entries(requests)?;
        let count = entries.len();

        self.store.replace_list(kind, entries)?;
        metrics::record_access_update(kind.as_str());
        tracing::info!(list = kind.as_str(), entries = count, "Access list committed");

        self.project(&format!("{} update", kind.as_str()))?;
        self.reload.request_reload();
        Ok(())
    }

    pub fn set_access_mode(&self, mode: AccessMode) -> Result<(), SyncError> {
        self.store.set_mode(mode)?;
        metrics::record_access_update("mode");
        tracing::info!(mode = %mode, "Access mode committed");

        self.project(&format!("access mode change to {mode}"))?;
        self.reload.request_reload();
        Ok(())
    }

    /// Overwrite the relay config's mode and lists with the store's.
    ///
    /// Returns how many list members and mode fields had to change; a
    /// document already in step is not rewritten and no reload is requested.
    pub fn reconcile(&self) -> Result<usize, SyncError> {
        let snapshot = self.store.snapshot()?;
        let doc = self.config.read()?;
        let drift = drift(&doc, &snapshot);
        if drift == 0 {
            tracing::debug!("Relay config access lists already match the database");
            return Ok(0);
        }

        let mut store_error = None;
        self.config.update_section(|doc| match self.store.snapshot() {
            Ok(current) => project(doc, &current),
            Err(e) => store_error = Some(e),
        })?;
        if let Some(e) = store_error {
            return Err(SyncError::Persist(e));
        }

        tracing::info!(changes = drift, "Reconciled relay config access lists");
        self.reload.request_reload();
        Ok(drift)
    }

    fn project(&self, change: &str) -> Result<(), SyncError> {
        let mut store_error = None;
        let result = self.config.update_section(|doc| match self.store.snapshot() {
            Ok(current) => project(doc, &current),
            Err(e) => store_error = Some(e),
        });

        let failure = match (result, store_error) {
            (Ok(_), None) => return Ok(()),
            (Err(e), _) => e,
            (Ok(_), Some(e)) => return Err(SyncError::Persist(e)),
        };

        metrics::record_partial_sync();
        tracing::warn!(change = %change, error = %failure, "Relay config projection failed; reconcile will repair it");
        Err(SyncError::PartialSync {
            change: change.to_string(),
            source: failure,
        })
    }
}

fn project(doc: &mut RelayDocument, snapshot: &AccessSnapshot) {
    doc.authorization.access_mode = Some(snapshot.mode);
    doc.authorization.pubkey_whitelist = Some(snapshot.pubkeys(ListKind::Whitelist));
    doc.authorization.pubkey_blacklist = Some(snapshot.pubkeys(ListKind::Blacklist));
}

fn drift(doc: &RelayDocument, snapshot: &AccessSnapshot) -> usize {
    let mode = usize::from(doc.authorization.access_mode != Some(snapshot.mode));
    let lists = [
        (ListKind::Whitelist, &doc.authorization.pubkey_whitelist),
        (ListKind::Blacklist, &doc.authorization.pubkey_blacklist),
    ];

    lists.into_iter().fold(mode, |acc, (kind, projected)| {
        let wanted = snapshot.pubkeys(kind);
        let current = projected.as_deref();
        if current == Some(wanted.as_slice()) {
            return acc;
        }
        let current = current.unwrap_or_default();
        let removed = current.iter().filter(|k| !wanted.contains(k)).count();
        let added = wanted.iter().filter(|k| !current.contains(k)).count();
        // Same members in a different order still counts as one change.
        acc + (removed + added).max(1)
    })
}
