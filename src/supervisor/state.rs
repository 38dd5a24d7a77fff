//! Relay lifecycle state machine.
//!
//! # States
//! - Stopped: no process, nothing scheduled
//! - Starting: spawned, inside the launch grace period
//! - Running: alive past the grace period (and probe, if configured)
//! - Reloading: reload signal sent, inside the settle window
//! - Stopping: stop signal sent, waiting for exit
//! - Crashed: exited without being asked to, or failed to launch
//!
//! # State Transitions
//! ```text
//! Stopped/Crashed → Starting → Running ⇄ Reloading
//! Running/Reloading → Stopping → Stopped
//! Running/Reloading → Crashed → Starting (bounded backoff restart)
//! Starting → Crashed (exit inside grace period, probe failure)
//! ```

use std::fmt;
use std::process::ExitStatus;
use std::time::{Duration, Instant};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayState {
    Stopped,
    Starting,
    Running,
    Reloading,
    Stopping,
    Crashed,
}

impl RelayState {
    /// States from which `start` is allowed.
    pub fn can_start(self) -> bool {
        matches!(self, RelayState::Stopped | RelayState::Crashed)
    }

    /// States in which the process is considered up.
    pub fn is_live(self) -> bool {
        matches!(self, RelayState::Running | RelayState::Reloading)
    }

    /// Numeric form for the state gauge.
    pub fn as_gauge(self) -> f64 {
        match self {
            RelayState::Stopped => 0.0,
            RelayState::Starting => 1.0,
            RelayState::Running => 2.0,
            RelayState::Reloading => 3.0,
            RelayState::Stopping => 4.0,
            RelayState::Crashed => 5.0,
        }
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RelayState::Stopped => "stopped",
            RelayState::Starting => "starting",
            RelayState::Running => "running",
            RelayState::Reloading => "reloading",
            RelayState::Stopping => "stopping",
            RelayState::Crashed => "crashed",
        };
        f.write_str(name)
    }
}

/// How a relay process ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl From<ExitStatus> for ExitInfo {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(signal)) => write!(f, "killed by signal {signal}"),
            (None, None) => f.write_str("unknown exit status"),
        }
    }
}

/// Point-in-time view of the supervisor, as returned by `status()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayStatus {
    pub state: RelayState,
    pub pid: Option<u32>,
    pub uptime_secs: Option<u64>,
    pub last_exit_code: Option<i32>,
    pub last_exit: Option<ExitInfo>,
    pub restart_attempts: u32,
    pub reloads_dispatched: u64,
    pub forced_kills: u64,
    pub last_error: Option<String>,
    /// Set when automatic restarts were abandoned; cleared by a manual start.
    pub alert: Option<String>,
}

/// What the actor publishes after every transition.
#[derive(Debug, Clone)]
pub(crate) struct Published {
    pub state: RelayState,
    pub pid: Option<u32>,
    pub started_at: Option<Instant>,
    pub last_exit: Option<ExitInfo>,
    pub restart_attempts: u32,
    pub reloads_dispatched: u64,
    pub forced_kills: u64,
    pub last_error: Option<String>,
    pub alert: Option<String>,
}

impl Default for Published {
    fn default() -> Self {
        Self {
            state: RelayState::Stopped,
            pid: None,
            started_at: None,
            last_exit: None,
            restart_attempts: 0,
            reloads_dispatched: 0,
            forced_kills: 0,
            last_error: None,
            alert: None,
        }
    }
}

impl Published {
    pub fn to_status(&self, now: Instant) -> RelayStatus {
        RelayStatus {
            state: self.state,
            pid: self.pid,
            uptime_secs: self
                .started_at
                .map(|t| now.saturating_duration_since(t).as_secs()),
            last_exit_code: self.last_exit.and_then(|e| e.code),
            last_exit: self.last_exit,
            restart_attempts: self.restart_attempts,
            reloads_dispatched: self.reloads_dispatched,
            forced_kills: self.forced_kills,
            last_error: self.last_error.clone(),
            alert: self.alert.clone(),
        }
    }
}

/// Result of a successful `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StopOutcome {
    /// The process ignored the stop signal and was killed.
    pub forced: bool,
    pub exit: Option<ExitInfo>,
    #[serde(skip)]
    pub elapsed: Duration,
}

/// Result of a successful `reload`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadOutcome {
    /// A reload signal was sent now.
    Dispatched,
    /// A reload is in flight; one more will follow it.
    Coalesced,
}
