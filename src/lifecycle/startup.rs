//! Startup orchestration.
//!
//! Fail fast on anything the manager cannot run without (bad addresses,
//! unreadable stores). A relay that fails to launch is not one of those.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::admin::{setup_admin_router, AdminState};
use crate::config::ManagerConfig;
use crate::facade::{FacadeError, SupervisorFacade};
use crate::lifecycle::{signals, Shutdown};
use crate::observability::{logging, metrics};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid {field} address '{value}'")]
    Address { field: &'static str, value: String },

    #[error(transparent)]
    Facade(#[from] FacadeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the manager until SIGTERM/SIGINT, then stop the relay.
pub async fn run(config: ManagerConfig) -> Result<(), StartupError> {
    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "relay-manager starting");

    if config.observability.metrics_enabled {
        let addr = parse_addr("metrics_address", &config.observability.metrics_address)?;
        metrics::init_metrics(addr);
    }

    let facade = Arc::new(SupervisorFacade::from_config(&config).await?);
    let shutdown = Shutdown::new();
    let mut stopped = shutdown.subscribe();
    let mut admin_stop = shutdown.subscribe();
    signals::spawn_signal_handler(facade.clone(), shutdown.clone())?;

    let admin = if config.admin.enabled {
        let addr = parse_addr("admin bind_address", &config.admin.bind_address)?;
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");

        let app = setup_admin_router(AdminState::new(facade.clone(), config.admin.api_key.as_str()));
        Some(tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = admin_stop.recv().await;
                })
                .await
        }))
    } else {
        None
    };

    let _ = stopped.recv().await;

    if let Some(server) = admin {
        match server.await {
            Ok(Ok(())) => tracing::info!("Admin API stopped"),
            Ok(Err(e)) => tracing::error!(error = %e, "Admin API failed"),
            Err(e) => tracing::error!(error = %e, "Admin API task panicked"),
        }
    }

    facade.shutdown(facade.default_stop_timeout()).await?;
    tracing::info!("Shutdown complete");
    Ok(())
}

fn parse_addr(field: &'static str, value: &str) -> Result<SocketAddr, StartupError> {
    value.parse().map_err(|_| StartupError::Address {
        field,
        value: value.to_string(),
    })
}
