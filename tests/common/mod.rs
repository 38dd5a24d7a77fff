//! Shared helpers for the integration tests.
//!
//! The "relay" in these tests is `/bin/sh -c <script>`; the config flag and
//! path land in the script's positional parameters and are ignored.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::Signal;
use relay_manager::access::{MemoryAccessStore, ReloadNotifier};
use relay_manager::supervisor::{LaunchSpec, RestartPolicy, SupervisorSettings};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Runs until killed.
pub const LONG_RUNNING: &str = "exec sleep 30";
/// Ignores the stop signal.
pub const IGNORES_TERM: &str = "trap '' TERM; while :; do sleep 0.05; done";
/// Survives reload signals.
pub const HANDLES_HUP: &str = "trap 'echo reloaded' HUP; while :; do sleep 0.05; done";
/// Exits during any reasonable grace period.
pub const EXITS_EARLY: &str = "exit 3";
/// Comes up, then crashes.
pub const CRASHES_LATER: &str = "sleep 0.3; exit 7";

/// A 64-char hex pubkey built from one repeated character.
pub fn pubkey(c: char) -> String {
    std::iter::repeat(c).take(64).collect()
}

/// Settings tuned for fast tests: short grace, settle and backoff.
pub fn settings(script: &str, config_path: &Path) -> SupervisorSettings {
    SupervisorSettings {
        launch: LaunchSpec {
            binary: PathBuf::from("/bin/sh"),
            args: vec!["-c".to_string(), script.to_string()],
            config_flag: "--config".to_string(),
            config_path: config_path.to_path_buf(),
            working_dir: None,
        },
        grace_period: Duration::from_millis(150),
        default_stop_timeout: Duration::from_secs(2),
        kill_wait: Duration::from_secs(2),
        reload_settle: Duration::from_millis(300),
        queue_timeout: Duration::from_secs(5),
        stop_signal: Signal::SIGTERM,
        reload_signal: Signal::SIGHUP,
        probe_address: None,
        probe_timeout: Duration::from_secs(1),
        restart: RestartPolicy {
            enabled: true,
            base_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(100),
            max_attempts: 3,
            window: Duration::from_secs(60),
        },
    }
}

pub fn memory_store() -> Arc<MemoryAccessStore> {
    Arc::new(MemoryAccessStore::new())
}

/// Counts reload requests instead of signalling anything.
#[derive(Default)]
pub struct CountingReload(AtomicUsize);

impl CountingReload {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl ReloadNotifier for CountingReload {
    fn request_reload(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Make `path` unreadable and unreplaceable by putting a directory where the
/// file was. Works even when tests run as root. Returns the old contents.
pub fn break_file(path: &Path) -> String {
    let content = std::fs::read_to_string(path).unwrap();
    std::fs::remove_file(path).unwrap();
    std::fs::create_dir(path).unwrap();
    content
}

pub fn repair_file(path: &Path, content: &str) {
    std::fs::remove_dir(path).unwrap();
    std::fs::write(path, content).unwrap();
}
