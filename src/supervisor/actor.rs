//! The supervisor actor: the only owner of the relay process.
//!
//! Client commands and background events share one queue, so a lifecycle
//! operation never overlaps another one. Observers (the process waiter and
//! the timers) only enqueue events; they never touch the process.

use std::time::{Duration, Instant};

use nix::sys::signal::Signal;
use tokio::sync::{mpsc, oneshot, watch};

use crate::observability::metrics;
use crate::supervisor::process::{self, ProbeResult};
use crate::supervisor::restart::{RestartDecision, RestartTracker};
use crate::supervisor::state::{ExitInfo, Published, RelayState, ReloadOutcome, StopOutcome};
use crate::supervisor::{SupervisorError, SupervisorSettings};

type Reply<T> = oneshot::Sender<Result<T, SupervisorError>>;

#[derive(Debug)]
pub(crate) enum Command {
    Start { reply: Reply<u32> },
    Stop { timeout: Duration, reply: Reply<StopOutcome> },
    Reload { reply: Reply<ReloadOutcome> },
    Exited { generation: u64, exit: ExitInfo },
    ReloadSettled { generation: u64, sequence: u64 },
    CrashRestart { generation: u64 },
}

/// The process currently considered up.
struct LiveRelay {
    pid: u32,
    generation: u64,
    exit: watch::Receiver<Option<ExitInfo>>,
}

pub(crate) struct SupervisorActor {
    settings: SupervisorSettings,
    commands: mpsc::Receiver<Command>,
    events: mpsc::WeakSender<Command>,
    published: watch::Sender<Published>,
    relay: Option<LiveRelay>,
    /// Bumped on every launch and on cancellation; stale timers compare against it.
    generation: u64,
    reload_sequence: u64,
    reload_pending: bool,
    restarts: RestartTracker,
}

impl SupervisorActor {
    pub(crate) fn new(
        settings: SupervisorSettings,
        commands: mpsc::Receiver<Command>,
        events: mpsc::WeakSender<Command>,
        published: watch::Sender<Published>,
    ) -> Self {
        let restarts = RestartTracker::new(settings.restart.clone());
        Self {
            settings,
            commands,
            events,
            published,
            relay: None,
            generation: 0,
            reload_sequence: 0,
            reload_pending: false,
            restarts,
        }
    }

    pub(crate) async fn run(mut self) {
        metrics::set_relay_state(RelayState::Stopped);

        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Start { reply } => {
                    let result = self.start().await;
                    let _ = reply.send(result);
                }
                Command::Stop { timeout, reply } => {
                    let result = self.stop(timeout).await;
                    let _ = reply.send(result);
                }
                Command::Reload { reply } => {
                    let _ = reply.send(self.reload());
                }
                Command::Exited { generation, exit } => self.exited(generation, exit),
                Command::ReloadSettled { generation, sequence } => self.reload_settled(generation, sequence),
                Command::CrashRestart { generation } => self.crash_restart(generation).await,
            }
        }

        if self.relay.is_some() {
            tracing::info!("Supervisor handles dropped, stopping relay");
            let _ = self.stop(self.settings.default_stop_timeout).await;
        }
    }

    fn state(&self) -> RelayState {
        self.published.borrow().state
    }

    /// Apply `change` to the published snapshot and log state changes.
    fn transition<F>(&self, change: F)
    where
        F: FnOnce(&mut Published),
    {
        let before = self.state();
        self.published.send_modify(change);
        let after = self.state();
        if before != after {
            tracing::debug!(from = %before, to = %after, "Relay state changed");
            metrics::set_relay_state(after);
        }
    }

    /// Deliver `command` to this actor after `delay`.
    fn schedule(&self, delay: Duration, command: Command) {
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = events.upgrade() {
                let _ = tx.send(command).await;
            }
        });
    }

    async fn start(&mut self) -> Result<u32, SupervisorError> {
        let state = self.state();
        if !state.can_start() {
            return Err(SupervisorError::AlreadyRunning { state });
        }

        self.restarts.reset();
        self.transition(|p| {
            p.alert = None;
            p.restart_attempts = 0;
        });
        self.launch().await
    }

    async fn launch(&mut self) -> Result<u32, SupervisorError> {
        self.generation += 1;
        let generation = self.generation;

        let events = self.events.clone();
        let spawned = process::spawn_relay(&self.settings.launch, move |exit| {
            if let Some(tx) = events.upgrade() {
                tokio::spawn(async move {
                    let _ = tx.send(Command::Exited { generation, exit }).await;
                });
            }
        });
        let mut spawned = match spawned {
            Ok(spawned) => spawned,
            Err(e) => {
                let reason = format!("failed to spawn {}: {e}", self.settings.launch.binary.display());
                return Err(self.launch_failed(reason, None));
            }
        };
        let pid = spawned.pid;

        tracing::info!(
            pid,
            generation,
            command = ?self.settings.launch.command_line(),
            "Relay spawned"
        );
        self.transition(|p| {
            p.state = RelayState::Starting;
            p.pid = Some(pid);
            p.started_at = None;
        });

        let grace = self.settings.grace_period;
        if let Ok(exit) = tokio::time::timeout(grace, process::wait_exit(&mut spawned.exit)).await {
            return Err(self.launch_failed(format!("relay exited during the {grace:?} grace period ({exit})"), Some(exit)));
        }

        if let Some(addr) = self.settings.probe_address.clone() {
            match process::probe_tcp(&addr, self.settings.probe_timeout, &mut spawned.exit).await {
                ProbeResult::Ready => {
                    tracing::debug!(pid, address = %addr, "Relay accepted a probe connection");
                }
                ProbeResult::Exited(exit) => {
                    return Err(self.launch_failed(
                        format!("relay exited before accepting connections on {addr} ({exit})"),
                        Some(exit),
                    ));
                }
                ProbeResult::TimedOut => {
                    let _ = process::send_signal(pid, Signal::SIGKILL);
                    let exit = tokio::time::timeout(self.settings.kill_wait, process::wait_exit(&mut spawned.exit))
                        .await
                        .ok();
                    return Err(self.launch_failed(
                        format!(
                            "relay did not accept connections on {addr} within {:?}",
                            self.settings.probe_timeout
                        ),
                        exit,
                    ));
                }
            }
        }

        self.relay = Some(LiveRelay {
            pid,
            generation,
            exit: spawned.exit,
        });
        self.transition(|p| {
            p.state = RelayState::Running;
            p.started_at = Some(Instant::now());
            p.last_error = None;
        });
        tracing::info!(pid, "Relay running");
        Ok(pid)
    }

    fn launch_failed(&mut self, reason: String, exit: Option<ExitInfo>) -> SupervisorError {
        tracing::error!(reason = %reason, "Relay launch failed");
        self.relay = None;
        self.transition(|p| {
            p.state = RelayState::Crashed;
            p.pid = None;
            p.started_at = None;
            if exit.is_some() {
                p.last_exit = exit;
            }
            p.last_error = Some(reason.clone());
        });
        SupervisorError::Launch { reason, exit }
    }

    async fn stop(&mut self, timeout: Duration) -> Result<StopOutcome, SupervisorError> {
        let state = self.state();
        let Some(mut relay) = self.relay.take() else {
            if state == RelayState::Crashed {
                // Cancels any restart timer still in flight.
                self.generation += 1;
                self.restarts.reset();
                self.transition(|p| p.state = RelayState::Stopped);
                tracing::info!("Pending relay restarts cancelled");
            }
            return Err(SupervisorError::NotRunning { state });
        };

        let started = Instant::now();
        let pid = relay.pid;
        self.reload_pending = false;
        self.transition(|p| p.state = RelayState::Stopping);
        tracing::info!(pid, timeout = ?timeout, "Stopping relay");

        if let Err(errno) = process::send_signal(pid, self.settings.stop_signal) {
            tracing::warn!(pid, error = %errno, "Failed to deliver stop signal");
        }

        let mut forced = false;
        let exit = match tokio::time::timeout(timeout, process::wait_exit(&mut relay.exit)).await {
            Ok(exit) => Some(exit),
            Err(_) => {
                forced = true;
                tracing::warn!(pid, timeout = ?timeout, "Relay did not stop gracefully, force killing");
                if let Err(errno) = process::send_signal(pid, Signal::SIGKILL) {
                    tracing::warn!(pid, error = %errno, "Failed to deliver SIGKILL");
                }
                tokio::time::timeout(self.settings.kill_wait, process::wait_exit(&mut relay.exit))
                    .await
                    .ok()
            }
        };

        if forced {
            metrics::record_forced_kill();
        }
        self.restarts.reset();
        self.transition(|p| {
            p.state = RelayState::Stopped;
            p.pid = None;
            p.started_at = None;
            if exit.is_some() {
                p.last_exit = exit;
            }
            if forced {
                p.forced_kills += 1;
                p.last_error = Some(format!("relay ignored {} for {timeout:?} and was killed", self.settings.stop_signal));
            }
        });

        if forced && exit.is_none() {
            let reason = format!("no exit observed {:?} after SIGKILL", self.settings.kill_wait);
            self.transition(|p| p.last_error = Some(reason.clone()));
            return Err(SupervisorError::ForceKill { pid, reason });
        }

        tracing::info!(pid, forced, exit = ?exit, "Relay stopped");
        Ok(StopOutcome {
            forced,
            exit,
            elapsed: started.elapsed(),
        })
    }

    fn reload(&mut self) -> Result<ReloadOutcome, SupervisorError> {
        match self.state() {
            RelayState::Reloading => {
                if !self.reload_pending {
                    tracing::debug!("Reload in flight, coalescing request");
                }
                self.reload_pending = true;
                Ok(ReloadOutcome::Coalesced)
            }
            RelayState::Running => {
                self.dispatch_reload()?;
                Ok(ReloadOutcome::Dispatched)
            }
            state => Err(SupervisorError::NotRunning { state }),
        }
    }

    fn dispatch_reload(&mut self) -> Result<(), SupervisorError> {
        let state = self.state();
        let Some(relay) = self.relay.as_ref() else {
            return Err(SupervisorError::NotRunning { state });
        };
        let (pid, generation) = (relay.pid, relay.generation);
        let signal = self.settings.reload_signal;

        if let Err(errno) = process::send_signal(pid, signal) {
            tracing::error!(pid, signal = %signal, error = %errno, "Failed to signal relay reload");
            self.transition(|p| p.last_error = Some(format!("reload signal failed: {errno}")));
            return Err(SupervisorError::Signal { signal, pid, errno });
        }

        self.reload_sequence += 1;
        let sequence = self.reload_sequence;
        metrics::record_reload();
        self.transition(|p| {
            p.state = RelayState::Reloading;
            p.reloads_dispatched += 1;
        });
        tracing::info!(pid, signal = %signal, "Relay reload signalled");

        self.schedule(self.settings.reload_settle, Command::ReloadSettled { generation, sequence });
        Ok(())
    }

    fn reload_settled(&mut self, generation: u64, sequence: u64) {
        let current = self.relay.as_ref().map(|r| r.generation);
        if self.state() != RelayState::Reloading || current != Some(generation) || sequence != self.reload_sequence {
            return;
        }

        if std::mem::take(&mut self.reload_pending) {
            if self.dispatch_reload().is_err() {
                self.transition(|p| p.state = RelayState::Running);
            }
        } else {
            self.transition(|p| p.state = RelayState::Running);
            tracing::debug!("Relay reload settled");
        }
    }

    fn exited(&mut self, generation: u64, exit: ExitInfo) {
        if !self.relay.as_ref().is_some_and(|r| r.generation == generation) {
            tracing::debug!(generation, exit = %exit, "Ignoring exit of a retired relay process");
            return;
        }
        let pid = self.relay.take().map(|r| r.pid);
        self.reload_pending = false;

        tracing::error!(pid = ?pid, exit = %exit, "Relay exited unexpectedly");
        metrics::record_crash();
        self.transition(|p| {
            p.state = RelayState::Crashed;
            p.pid = None;
            p.started_at = None;
            p.last_exit = Some(exit);
            p.last_error = Some(format!("relay exited unexpectedly ({exit})"));
        });

        self.schedule_restart();
    }

    fn schedule_restart(&mut self) {
        match self.restarts.record_crash(Instant::now()) {
            RestartDecision::Retry { attempt, delay } => {
                tracing::info!(attempt, delay = ?delay, "Scheduling relay restart");
                self.transition(|p| p.restart_attempts = attempt);
                self.schedule(delay, Command::CrashRestart { generation: self.generation });
            }
            RestartDecision::GiveUp { crashes } => {
                let alert = format!(
                    "relay crashed {crashes} times within {:?}; automatic restarts abandoned",
                    self.settings.restart.window
                );
                tracing::error!(crashes, "{}", alert);
                metrics::record_restarts_abandoned();
                self.transition(|p| p.alert = Some(alert));
            }
            RestartDecision::Disabled => {
                tracing::info!("Automatic restart disabled, relay stays crashed");
            }
        }
    }

    async fn crash_restart(&mut self, generation: u64) {
        if generation != self.generation || self.state() != RelayState::Crashed {
            tracing::debug!(generation, "Dropping stale restart");
            return;
        }

        metrics::record_restart();
        match self.launch().await {
            Ok(pid) => tracing::info!(pid, "Relay restarted after crash"),
            Err(e) => {
                tracing::warn!(error = %e, "Relay restart attempt failed");
                self.schedule_restart();
            }
        }
    }
}
