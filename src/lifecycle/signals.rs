//! OS signal handling.
//!
//! SIGTERM and SIGINT trigger shutdown. SIGHUP re-projects the access lists
//! into the relay config, which schedules a relay reload when anything drifted.
//! Signals keep being handled while shutdown is in progress.

use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};

use crate::facade::SupervisorFacade;
use crate::lifecycle::Shutdown;

/// What the listener does with a shutdown signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShutdownAction {
    Trigger,
    AlreadyInProgress,
}

/// Tracks shutdown requests so repeats are reported instead of dropped.
#[derive(Debug, Default)]
pub(crate) struct ShutdownRequests {
    received: u32,
}

impl ShutdownRequests {
    pub(crate) fn record(&mut self) -> ShutdownAction {
        self.received += 1;
        if self.received == 1 {
            ShutdownAction::Trigger
        } else {
            ShutdownAction::AlreadyInProgress
        }
    }
}

/// Spawn the signal listener. Returns once handlers are registered.
pub fn spawn_signal_handler(facade: Arc<SupervisorFacade>, shutdown: Shutdown) -> std::io::Result<()> {
    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    let mut hup = signal(SignalKind::hangup())?;

    tokio::spawn(async move {
        let mut requests = ShutdownRequests::default();
        loop {
            let name = tokio::select! {
                _ = term.recv() => "SIGTERM",
                _ = int.recv() => "SIGINT",
                _ = hup.recv() => {
                    tracing::info!("SIGHUP received, reconciling access lists");
                    let facade = facade.clone();
                    match tokio::task::spawn_blocking(move || facade.reconcile()).await {
                        Ok(Ok(applied)) => tracing::info!(applied, "Reconcile finished"),
                        Ok(Err(e)) => tracing::error!(error = %e, "Reconcile failed"),
                        Err(e) => tracing::error!(error = %e, "Reconcile task failed"),
                    }
                    continue;
                }
            };

            match requests.record() {
                ShutdownAction::Trigger => {
                    tracing::info!(signal = name, "Shutting down");
                    shutdown.trigger();
                }
                ShutdownAction::AlreadyInProgress => {
                    tracing::warn!(
                        signal = name,
                        "Shutdown already in progress, waiting for the relay to stop"
                    );
                }
            }
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_shutdown_signal_is_reported() {
        let mut requests = ShutdownRequests::default();
        assert_eq!(requests.record(), ShutdownAction::Trigger);
        assert_eq!(requests.record(), ShutdownAction::AlreadyInProgress);
        assert_eq!(requests.record(), ShutdownAction::AlreadyInProgress);
    }
}
