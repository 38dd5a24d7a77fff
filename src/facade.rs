//! Single entry point for the admin API, startup and shutdown.
//!
//! Owns the relay config store, the access list synchronizer and the
//! supervisor handle, and folds their errors into [`FacadeError`].
//!
//! The access list and relay config methods are synchronous and do
//! fsync-ed file I/O under the config lock. Async callers run them on the
//! blocking pool.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::access::{
    AccessEntry, AccessListStore, AccessListSynchronizer, AccessMode, EntryRequest, JsonAccessStore, ListKind,
    StoreError, SyncError, ValidationError,
};
use crate::config::ManagerConfig;
use crate::relay_config::{ConfigStore, ConfigStoreError, RelayDocument};
use crate::supervisor::{
    ExitInfo, RelayState, RelayStatus, ReloadOutcome, ReloadScheduler, StopOutcome, SupervisorError,
    SupervisorHandle, SupervisorSettings,
};

#[derive(Debug, Error)]
pub enum FacadeError {
    #[error("relay config I/O error: {0}")]
    Io(#[source] ConfigStoreError),

    #[error("relay config is malformed: {0}")]
    Parse(#[source] ConfigStoreError),

    #[error("relay config could not be encoded: {0}")]
    Encode(#[source] ConfigStoreError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("access store error: {0}")]
    Persist(#[from] StoreError),

    #[error("{change} saved to the database but the relay config is out of date (database is authoritative; reconcile will repair it): {source}")]
    PartialSync {
        change: String,
        #[source]
        source: ConfigStoreError,
    },

    #[error("relay is already {state}")]
    AlreadyRunning { state: RelayState },

    #[error("relay is not running (state: {state})")]
    NotRunning { state: RelayState },

    #[error("relay failed to launch: {reason}")]
    Launch {
        reason: String,
        exit: Option<ExitInfo>,
    },

    #[error("signal delivery failed: {0}")]
    Signal(#[source] SupervisorError),

    #[error("forced termination failed: {0}")]
    ForceKill(#[source] SupervisorError),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("supervisor unavailable: {0}")]
    Unavailable(String),
}

impl From<ConfigStoreError> for FacadeError {
    fn from(e: ConfigStoreError) -> Self {
        match e {
            ConfigStoreError::Io { .. } => FacadeError::Io(e),
            ConfigStoreError::Parse { .. } => FacadeError::Parse(e),
            ConfigStoreError::Encode(_) => FacadeError::Encode(e),
        }
    }
}

impl From<SyncError> for FacadeError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::Validation(e) => FacadeError::Validation(e),
            SyncError::Persist(e) => FacadeError::Persist(e),
            SyncError::PartialSync { change, source } => FacadeError::PartialSync { change, source },
            SyncError::Config(e) => FacadeError::from(e),
        }
    }
}

impl From<SupervisorError> for FacadeError {
    fn from(e: SupervisorError) -> Self {
        match e {
            SupervisorError::AlreadyRunning { state } => FacadeError::AlreadyRunning { state },
            SupervisorError::NotRunning { state } => FacadeError::NotRunning { state },
            SupervisorError::Launch { reason, exit } => FacadeError::Launch { reason, exit },
            SupervisorError::Signal { .. } => FacadeError::Signal(e),
            SupervisorError::ForceKill { .. } => FacadeError::ForceKill(e),
            SupervisorError::Timeout { operation, after } => FacadeError::Timeout { operation, after },
            SupervisorError::Settings(msg) => FacadeError::Unavailable(msg),
            SupervisorError::Unavailable => FacadeError::Unavailable(e.to_string()),
        }
    }
}

pub struct SupervisorFacade {
    config: Arc<ConfigStore>,
    access: AccessListSynchronizer,
    supervisor: SupervisorHandle,
    reloads: Arc<ReloadScheduler>,
}

impl SupervisorFacade {
    /// Build everything from the manager config, using the JSON access store.
    pub async fn from_config(config: &ManagerConfig) -> Result<Self, FacadeError> {
        let settings = SupervisorSettings::from_config(config)?;
        let store = JsonAccessStore::open(PathBuf::from(&config.access.store_path))?;
        Self::initialize(settings, Arc::new(store), config.relay.auto_start).await
    }

    /// Make sure the relay config exists, reconcile access lists into it,
    /// and start the relay when `auto_start` is set.
    ///
    /// A failed auto-start is logged and left visible in `get_status`; it
    /// does not fail initialization.
    pub async fn initialize(
        settings: SupervisorSettings,
        store: Arc<dyn AccessListStore>,
        auto_start: bool,
    ) -> Result<Self, FacadeError> {
        let config = Arc::new(ConfigStore::new(settings.launch.config_path.clone()));
        if !config.exists() {
            config.write(RelayDocument::with_defaults())?;
            tracing::info!(path = %config.path().display(), "Created default relay config");
        }

        let supervisor = SupervisorHandle::spawn(settings);
        let reloads = Arc::new(ReloadScheduler::spawn(supervisor.clone()));
        let access = AccessListSynchronizer::new(store, config.clone(), reloads.clone());

        let applied = access.reconcile()?;
        tracing::info!(applied, "Startup reconcile finished");

        let facade = Self {
            config,
            access,
            supervisor,
            reloads,
        };

        if auto_start {
            match facade.supervisor.start().await {
                Ok(pid) => tracing::info!(pid, "Relay auto-started"),
                Err(e) => tracing::error!(error = %e, "Relay auto-start failed"),
            }
        }

        Ok(facade)
    }

    /// Stop the relay. Safe when it was never started.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), FacadeError> {
        match self.supervisor.stop(timeout).await {
            Ok(outcome) => {
                tracing::info!(forced = outcome.forced, "Relay stopped for shutdown");
                Ok(())
            }
            Err(SupervisorError::NotRunning { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_status(&self) -> RelayStatus {
        self.supervisor.status()
    }

    pub async fn start_relay(&self) -> Result<u32, FacadeError> {
        Ok(self.supervisor.start().await?)
    }

    pub async fn stop_relay(&self, timeout_secs: u64) -> Result<StopOutcome, FacadeError> {
        Ok(self.supervisor.stop(Duration::from_secs(timeout_secs)).await?)
    }

    pub fn default_stop_timeout(&self) -> Duration {
        self.supervisor.default_stop_timeout()
    }

    pub async fn reload_relay(&self) -> Result<ReloadOutcome, FacadeError> {
        Ok(self.supervisor.reload().await?)
    }

    /// Reload and wait until the relay is back to `running`.
    pub async fn reload_relay_blocking(&self, deadline: Duration) -> Result<(), FacadeError> {
        Ok(self.supervisor.reload_and_wait(deadline).await?)
    }

    pub fn get_whitelist(&self) -> Result<Vec<AccessEntry>, FacadeError> {
        Ok(self.access.list(ListKind::Whitelist)?)
    }

    pub fn set_whitelist(&self, entries: &[EntryRequest]) -> Result<(), FacadeError> {
        Ok(self.access.set_whitelist(entries)?)
    }

    pub fn get_blacklist(&self) -> Result<Vec<AccessEntry>, FacadeError> {
        Ok(self.access.list(ListKind::Blacklist)?)
    }

    pub fn set_blacklist(&self, entries: &[EntryRequest]) -> Result<(), FacadeError> {
        Ok(self.access.set_blacklist(entries)?)
    }

    pub fn get_access_mode(&self) -> Result<AccessMode, FacadeError> {
        Ok(self.access.mode()?)
    }

    pub fn set_access_mode(&self, mode: AccessMode) -> Result<(), FacadeError> {
        Ok(self.access.set_access_mode(mode)?)
    }

    /// Re-project the database's access lists into the relay config.
    pub fn reconcile(&self) -> Result<usize, FacadeError> {
        Ok(self.access.reconcile()?)
    }

    pub fn relay_config(&self) -> Result<RelayDocument, FacadeError> {
        Ok(self.config.read()?)
    }

    /// Edit non-access settings (info, limits, network, ...) and schedule a
    /// reload. The access mode and lists are owned by the database and are
    /// restored after `mutator` runs.
    pub fn update_relay_config<F>(&self, mutator: F) -> Result<RelayDocument, FacadeError>
    where
        F: FnOnce(&mut RelayDocument),
    {
        let doc = self.config.update_section(|doc| {
            let mode = doc.authorization.access_mode;
            let whitelist = doc.authorization.pubkey_whitelist.clone();
            let blacklist = doc.authorization.pubkey_blacklist.clone();

            mutator(doc);

            doc.authorization.access_mode = mode;
            doc.authorization.pubkey_whitelist = whitelist;
            doc.authorization.pubkey_blacklist = blacklist;
        })?;
        self.reloads.request();
        Ok(doc)
    }

    pub fn supervisor(&self) -> &SupervisorHandle {
        &self.supervisor
    }
}
