//! Admin HTTP API.
//!
//! # Data Flow
//! ```text
//! Operator / relay-cli
//!     → request id + trace layers
//!     → auth.rs (Bearer token)
//!     → handlers.rs (decode, call the facade)
//!     → error.rs (facade error → status code + JSON body)
//! ```
//!
//! # Design Decisions
//! - Handlers hold no state of their own; everything goes through the facade
//! - Every route requires the admin key

pub mod auth;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::facade::SupervisorFacade;

use self::auth::admin_auth_middleware;
use self::handlers::*;

/// Shared state for admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub facade: Arc<SupervisorFacade>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(facade: Arc<SupervisorFacade>, api_key: impl Into<Arc<str>>) -> Self {
        Self {
            facade,
            api_key: api_key.into(),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/relay/start", post(start_relay))
        .route("/admin/relay/stop", post(stop_relay))
        .route("/admin/relay/reload", post(reload_relay))
        .route("/admin/relay/config", get(get_relay_config))
        .route("/admin/whitelist", get(get_whitelist).put(set_whitelist))
        .route("/admin/blacklist", get(get_blacklist).put(set_blacklist))
        .route("/admin/access-mode", get(get_access_mode).put(set_access_mode))
        .route("/admin/reconcile", post(reconcile))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}
