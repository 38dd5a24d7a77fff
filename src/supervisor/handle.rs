//! Cloneable client side of the supervisor actor.

use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot, watch};

use crate::supervisor::actor::{Command, SupervisorActor};
use crate::supervisor::state::{Published, RelayState, RelayStatus, ReloadOutcome, StopOutcome};
use crate::supervisor::{SupervisorError, SupervisorSettings};

/// Capacity of the operation queue.
const QUEUE_DEPTH: usize = 64;

/// Handle to one supervised relay.
///
/// Every lifecycle call is queued to the actor and answered in order.
/// Dropping the last handle stops the relay.
#[derive(Clone)]
pub struct SupervisorHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<Published>,
    start_bound: Duration,
    kill_wait: Duration,
    queue_timeout: Duration,
    default_stop_timeout: Duration,
}

impl SupervisorHandle {
    /// Spawn the actor on the current Tokio runtime.
    pub fn spawn(settings: SupervisorSettings) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let (status_tx, status_rx) = watch::channel(Published::default());

        let probe = if settings.probe_address.is_some() {
            settings.probe_timeout.saturating_add(settings.kill_wait)
        } else {
            Duration::ZERO
        };
        let handle = Self {
            commands: tx.clone(),
            status: status_rx,
            start_bound: settings.grace_period.saturating_add(probe),
            kill_wait: settings.kill_wait,
            queue_timeout: settings.queue_timeout,
            default_stop_timeout: settings.default_stop_timeout,
        };

        let actor = SupervisorActor::new(settings, rx, tx.downgrade(), status_tx);
        tokio::spawn(actor.run());
        handle
    }

    /// Launch the relay and wait out its grace period. Returns the pid.
    pub async fn start(&self) -> Result<u32, SupervisorError> {
        let bound = self.start_bound.saturating_add(self.queue_timeout);
        self.call("start", bound, |reply| Command::Start { reply }).await
    }

    /// Stop gracefully, killing the relay if it outlives `timeout`.
    pub async fn stop(&self, timeout: Duration) -> Result<StopOutcome, SupervisorError> {
        let bound = timeout.saturating_add(self.kill_wait).saturating_add(self.queue_timeout);
        self.call("stop", bound, |reply| Command::Stop { timeout, reply }).await
    }

    pub fn default_stop_timeout(&self) -> Duration {
        self.default_stop_timeout
    }

    /// Signal a reload. Returns once the signal is sent or coalesced.
    pub async fn reload(&self) -> Result<ReloadOutcome, SupervisorError> {
        self.call("reload", self.queue_timeout, |reply| Command::Reload { reply }).await
    }

    /// Signal a reload and wait for the settle window (and any coalesced
    /// follow-up) to finish.
    pub async fn reload_and_wait(&self, deadline: Duration) -> Result<(), SupervisorError> {
        let started = Instant::now();
        self.reload().await?;

        let remaining = deadline.saturating_sub(started.elapsed());
        let status = self
            .wait_for(|s| s.state != RelayState::Reloading, remaining)
            .await
            .map_err(|_| SupervisorError::Timeout {
                operation: "reload",
                after: deadline,
            })?;

        match status.state {
            RelayState::Running => Ok(()),
            state => Err(SupervisorError::NotRunning { state }),
        }
    }

    /// Non-blocking snapshot; never queues anything.
    pub fn status(&self) -> RelayStatus {
        self.status.borrow().to_status(Instant::now())
    }

    /// Wait until `predicate` holds for the published status.
    pub async fn wait_for<F>(&self, predicate: F, deadline: Duration) -> Result<RelayStatus, SupervisorError>
    where
        F: Fn(&RelayStatus) -> bool,
    {
        let mut rx = self.status.clone();
        let waited = tokio::time::timeout(deadline, async {
            rx.wait_for(|p| predicate(&p.to_status(Instant::now())))
                .await
                .map(|p| p.to_status(Instant::now()))
        })
        .await;

        match waited {
            Ok(Ok(status)) => Ok(status),
            Ok(Err(_)) => Err(SupervisorError::Unavailable),
            Err(_) => Err(SupervisorError::Timeout {
                operation: "wait for relay status",
                after: deadline,
            }),
        }
    }

    async fn call<T, F>(&self, operation: &'static str, bound: Duration, make: F) -> Result<T, SupervisorError>
    where
        F: FnOnce(oneshot::Sender<Result<T, SupervisorError>>) -> Command,
    {
        let deadline = deadline_after(bound);
        let timed_out = || SupervisorError::Timeout {
            operation,
            after: bound,
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        tokio::time::timeout_at(deadline, self.commands.send(make(reply_tx)))
            .await
            .map_err(|_| timed_out())?
            .map_err(|_| SupervisorError::Unavailable)?;

        match tokio::time::timeout_at(deadline, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SupervisorError::Unavailable),
            Err(_) => {
                tracing::warn!(operation, after = ?bound, "Supervisor call timed out");
                Err(timed_out())
            }
        }
    }
}

/// `now + bound`, pinned to roughly thirty years out when that overflows.
fn deadline_after(bound: Duration) -> tokio::time::Instant {
    let now = tokio::time::Instant::now();
    now.checked_add(bound)
        .unwrap_or_else(|| now + Duration::from_secs(86400 * 365 * 30))
}
