//! Configuration schema definitions.
//!
//! This module defines the manager's own configuration (not the relay's).
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the relay manager.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ManagerConfig {
    /// The supervised relay binary and its config file.
    pub relay: RelayProcessConfig,

    /// Lifecycle timings and signals.
    pub supervisor: SupervisorConfig,

    /// Crash restart policy.
    pub restart: RestartConfig,

    /// Access list database.
    pub access: AccessConfig,

    /// Admin API.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// How the relay is launched.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayProcessConfig {
    /// Path to the relay executable.
    pub binary: String,

    /// Arguments placed before the config path.
    pub args: Vec<String>,

    /// The relay's configuration file, owned by the manager.
    pub config_path: String,

    /// Flag preceding the config path ("" passes the path bare).
    pub config_flag: String,

    /// Working directory for the relay process.
    pub working_dir: Option<String>,

    /// Start the relay during initialization.
    pub auto_start: bool,
}

impl Default for RelayProcessConfig {
    fn default() -> Self {
        Self {
            binary: "nostr-rs-relay".to_string(),
            args: Vec::new(),
            config_path: "config.toml".to_string(),
            config_flag: "--config".to_string(),
            working_dir: None,
            auto_start: true,
        }
    }
}

/// Lifecycle timing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// How long a fresh process must stay alive to count as started.
    pub grace_period_ms: u64,

    /// Default graceful stop timeout in seconds.
    pub stop_timeout_secs: u64,

    /// How long to wait for exit after a forced kill.
    pub kill_wait_ms: u64,

    /// Quiescence window after a reload signal.
    pub reload_settle_ms: u64,

    /// Extra time a caller waits for its turn in the operation queue.
    pub queue_timeout_secs: u64,

    /// Signal requesting a graceful exit (e.g. "SIGTERM").
    pub stop_signal: String,

    /// Signal requesting a config re-read (e.g. "SIGHUP").
    pub reload_signal: String,

    /// Optional TCP address probed after the grace period.
    pub probe_address: Option<String>,

    /// How long the probe may keep failing.
    pub probe_timeout_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: 1500,
            stop_timeout_secs: 10,
            kill_wait_ms: 5000,
            reload_settle_ms: 1000,
            queue_timeout_secs: 30,
            stop_signal: "SIGTERM".to_string(),
            reload_signal: "SIGHUP".to_string(),
            probe_address: None,
            probe_timeout_ms: 5000,
        }
    }
}

/// Crash restart configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RestartConfig {
    /// Restart the relay after an unexpected exit.
    pub enabled: bool,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Crashes tolerated inside the window before giving up.
    pub max_attempts: u32,

    /// Rolling window in seconds.
    pub window_secs: u64,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
            max_attempts: 5,
            window_secs: 600,
        }
    }
}

/// Access list database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessConfig {
    /// JSON file holding lists and mode.
    pub store_path: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            store_path: "access.json".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
