//! Fire-and-forget reload scheduling.
//!
//! Requests land in a queue of capacity one. While a request is waiting,
//! further requests are dropped: the waiting one will pick up every config
//! change made before it runs.

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::access::ReloadNotifier;
use crate::supervisor::{SupervisorError, SupervisorHandle};

pub struct ReloadScheduler {
    tx: mpsc::Sender<()>,
}

impl ReloadScheduler {
    /// Spawn the worker that forwards requests to `handle`.
    pub fn spawn(handle: SupervisorHandle) -> Self {
        let (tx, mut rx) = mpsc::channel::<()>(1);

        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                match handle.reload().await {
                    Ok(outcome) => tracing::debug!(outcome = ?outcome, "Scheduled reload delivered"),
                    Err(SupervisorError::NotRunning { state }) => {
                        tracing::debug!(state = %state, "Relay not running, new config applies at next start");
                    }
                    Err(e) => tracing::warn!(error = %e, "Scheduled reload failed"),
                }
            }
        });

        Self { tx }
    }

    /// Queue a reload. Returns false when one was already waiting.
    pub fn request(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                tracing::debug!("Reload already queued");
                false
            }
            Err(TrySendError::Closed(())) => {
                tracing::warn!("Reload worker has stopped");
                false
            }
        }
    }
}

impl ReloadNotifier for ReloadScheduler {
    fn request_reload(&self) {
        self.request();
    }
}
