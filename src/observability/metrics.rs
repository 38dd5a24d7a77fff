//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_state` (gauge): 0=stopped 1=starting 2=running 3=reloading 4=stopping 5=crashed
//! - `relay_crashes_total` (counter): unexpected relay exits
//! - `relay_restarts_total` (counter): automatic restart attempts
//! - `relay_restarts_abandoned_total` (counter): restart windows given up on
//! - `relay_reloads_total` (counter): reload signals dispatched
//! - `relay_forced_kills_total` (counter): stops that escalated to SIGKILL
//! - `access_list_updates_total` (counter): committed list/mode changes by kind
//! - `access_sync_partial_failures_total` (counter): projections that failed after commit

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::supervisor::RelayState;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn set_relay_state(state: RelayState) {
    gauge!("relay_state").set(state.as_gauge());
}

pub fn record_crash() {
    counter!("relay_crashes_total").increment(1);
}

pub fn record_restart() {
    counter!("relay_restarts_total").increment(1);
}

pub fn record_restarts_abandoned() {
    counter!("relay_restarts_abandoned_total").increment(1);
}

pub fn record_reload() {
    counter!("relay_reloads_total").increment(1);
}

pub fn record_forced_kill() {
    counter!("relay_forced_kills_total").increment(1);
}

pub fn record_access_update(kind: &'static str) {
    counter!("access_list_updates_total", "kind" => kind).increment(1);
}

pub fn record_partial_sync() {
    counter!("access_sync_partial_failures_total").increment(1);
}
