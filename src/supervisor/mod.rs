//! Relay process supervision subsystem.
//!
//! # Data Flow
//! ```text
//! Client call (start / stop / reload)
//!     → handle.rs (enqueue command, await reply with deadline)
//!     → actor.rs (one command at a time, owns the process handle)
//!     → process.rs (spawn, signal, reap, probe)
//!     → state.rs (publish snapshot on every transition)
//!
//! Background observers (never act directly):
//!     process waiter → Exited event → actor → restart.rs decision
//!     backoff timer  → CrashRestart event → actor
//!     settle timer   → ReloadSettled event → actor
//!
//! Fire-and-forget reloads:
//!     reload.rs (capacity-1 queue, duplicate requests dropped) → handle.rs
//! ```
//!
//! # Design Decisions
//! - Only externally observable facts are modeled: launched, alive, exited
//! - One owned supervisor per relay, passed explicitly; no globals
//! - The restart policy is the only automatic retry in the system

pub mod actor;
pub mod handle;
pub mod process;
pub mod reload;
pub mod restart;
pub mod state;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::Signal;
use thiserror::Error;

use crate::config::ManagerConfig;

pub use handle::SupervisorHandle;
pub use process::LaunchSpec;
pub use reload::ReloadScheduler;
pub use restart::RestartPolicy;
pub use state::{ExitInfo, RelayState, RelayStatus, ReloadOutcome, StopOutcome};

#[derive(Debug, Clone, Error)]
pub enum SupervisorError {
    #[error("relay is already {state}")]
    AlreadyRunning { state: RelayState },

    #[error("relay is not running (state: {state})")]
    NotRunning { state: RelayState },

    #[error("relay failed to launch: {reason}")]
    Launch {
        reason: String,
        exit: Option<ExitInfo>,
    },

    #[error("failed to send {signal} to relay pid {pid}: {errno}")]
    Signal {
        signal: Signal,
        pid: u32,
        errno: Errno,
    },

    #[error("relay pid {pid} ignored the stop signal and could not be killed: {reason}")]
    ForceKill { pid: u32, reason: String },

    #[error("{operation} did not complete within {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("invalid supervisor settings: {0}")]
    Settings(String),

    #[error("supervisor is no longer running")]
    Unavailable,
}

/// Resolved supervisor configuration.
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub launch: LaunchSpec,
    pub grace_period: Duration,
    pub default_stop_timeout: Duration,
    pub kill_wait: Duration,
    pub reload_settle: Duration,
    pub queue_timeout: Duration,
    pub stop_signal: Signal,
    pub reload_signal: Signal,
    pub probe_address: Option<String>,
    pub probe_timeout: Duration,
    pub restart: RestartPolicy,
}

impl SupervisorSettings {
    pub fn from_config(config: &ManagerConfig) -> Result<Self, SupervisorError> {
        let sup = &config.supervisor;
        let parse_signal = |name: &str| {
            Signal::from_str(name).map_err(|_| SupervisorError::Settings(format!("unknown signal '{name}'")))
        };

        Ok(Self {
            launch: LaunchSpec {
                binary: PathBuf::from(&config.relay.binary),
                args: config.relay.args.clone(),
                config_flag: config.relay.config_flag.clone(),
                config_path: PathBuf::from(&config.relay.config_path),
                working_dir: config.relay.working_dir.as_ref().map(PathBuf::from),
            },
            grace_period: Duration::from_millis(sup.grace_period_ms),
            default_stop_timeout: Duration::from_secs(sup.stop_timeout_secs),
            kill_wait: Duration::from_millis(sup.kill_wait_ms),
            reload_settle: Duration::from_millis(sup.reload_settle_ms),
            queue_timeout: Duration::from_secs(sup.queue_timeout_secs),
            stop_signal: parse_signal(&sup.stop_signal)?,
            reload_signal: parse_signal(&sup.reload_signal)?,
            probe_address: sup.probe_address.clone(),
            probe_timeout: Duration::from_millis(sup.probe_timeout_ms),
            restart: RestartPolicy::from(&config.restart),
        })
    }
}
