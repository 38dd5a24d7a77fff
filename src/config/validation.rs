//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check signal names resolve on this platform
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ManagerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use nix::sys::signal::Signal;

use crate::config::schema::ManagerConfig;

/// A single semantic problem in the manager config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &ManagerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut check = |ok: bool, field: &'static str, message: String| {
        if !ok {
            errors.push(ValidationError { field, message });
        }
    };

    check(!config.relay.binary.trim().is_empty(), "relay.binary", "must not be empty".into());
    check(
        !config.relay.config_path.trim().is_empty(),
        "relay.config_path",
        "must not be empty".into(),
    );

    let sup = &config.supervisor;
    check(sup.grace_period_ms > 0, "supervisor.grace_period_ms", "must be > 0".into());
    check(sup.stop_timeout_secs > 0, "supervisor.stop_timeout_secs", "must be > 0".into());
    check(sup.kill_wait_ms > 0, "supervisor.kill_wait_ms", "must be > 0".into());
    check(
        Signal::from_str(&sup.stop_signal).is_ok(),
        "supervisor.stop_signal",
        format!("unknown signal '{}'", sup.stop_signal),
    );
    check(
        Signal::from_str(&sup.reload_signal).is_ok(),
        "supervisor.reload_signal",
        format!("unknown signal '{}'", sup.reload_signal),
    );
    if let Some(addr) = &sup.probe_address {
        check(
            addr.parse::<SocketAddr>().is_ok(),
            "supervisor.probe_address",
            format!("'{addr}' is not a socket address"),
        );
    }

    let restart = &config.restart;
    check(restart.base_delay_ms > 0, "restart.base_delay_ms", "must be > 0".into());
    check(
        restart.max_delay_ms >= restart.base_delay_ms,
        "restart.max_delay_ms",
        "must be >= restart.base_delay_ms".into(),
    );
    check(restart.window_secs > 0, "restart.window_secs", "must be > 0".into());

    check(!config.access.store_path.trim().is_empty(), "access.store_path", "must not be empty".into());

    if config.admin.enabled {
        check(
            config.admin.bind_address.parse::<SocketAddr>().is_ok(),
            "admin.bind_address",
            format!("'{}' is not a socket address", config.admin.bind_address),
        );
        check(!config.admin.api_key.is_empty(), "admin.api_key", "must not be empty".into());
    }

    let obs = &config.observability;
    check(
        matches!(obs.log_format.as_str(), "pretty" | "json"),
        "observability.log_format",
        format!("expected 'pretty' or 'json', got '{}'", obs.log_format),
    );
    if obs.metrics_enabled {
        check(
            obs.metrics_address.parse::<SocketAddr>().is_ok(),
            "observability.metrics_address",
            format!("'{}' is not a socket address", obs.metrics_address),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
