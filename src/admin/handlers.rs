use std::time::Duration;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::access::{AccessEntry, AccessMode, EntryRequest};
use crate::admin::error::ApiError;
use crate::admin::AdminState;
use crate::facade::{FacadeError, SupervisorFacade};
use crate::relay_config::RelayDocument;
use crate::supervisor::{RelayStatus, ReloadOutcome, StopOutcome};

#[derive(Serialize)]
pub struct StartResponse {
    pub pid: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct StopParams {
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReloadParams {
    /// Wait up to this long for the relay to settle back into `running`.
    pub wait_secs: Option<u64>,
}

#[derive(Serialize)]
pub struct ReloadResponse {
    pub outcome: Option<ReloadOutcome>,
    pub settled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModeBody {
    pub mode: AccessMode,
}

#[derive(Serialize)]
pub struct ReconcileResponse {
    pub applied: usize,
}

/// Run a file-backed facade call on the blocking pool.
async fn blocking<T, F>(state: &AdminState, call: F) -> Result<T, ApiError>
where
    F: FnOnce(&SupervisorFacade) -> Result<T, FacadeError> + Send + 'static,
    T: Send + 'static,
{
    let facade = state.facade.clone();
    tokio::task::spawn_blocking(move || call(&facade))
        .await
        .map_err(|e| ApiError(FacadeError::Unavailable(format!("admin task failed: {e}"))))?
        .map_err(ApiError)
}

pub async fn get_status(State(state): State<AdminState>) -> Json<RelayStatus> {
    Json(state.facade.get_status())
}

pub async fn start_relay(State(state): State<AdminState>) -> Result<Json<StartResponse>, ApiError> {
    let pid = state.facade.start_relay().await?;
    Ok(Json(StartResponse { pid }))
}

pub async fn stop_relay(
    State(state): State<AdminState>,
    Query(params): Query<StopParams>,
) -> Result<Json<StopOutcome>, ApiError> {
    let timeout_secs = params
        .timeout_secs
        .unwrap_or_else(|| state.facade.default_stop_timeout().as_secs());
    Ok(Json(state.facade.stop_relay(timeout_secs).await?))
}

pub async fn reload_relay(
    State(state): State<AdminState>,
    Query(params): Query<ReloadParams>,
) -> Result<Json<ReloadResponse>, ApiError> {
    match params.wait_secs {
        Some(secs) => {
            state.facade.reload_relay_blocking(Duration::from_secs(secs)).await?;
            Ok(Json(ReloadResponse {
                outcome: None,
                settled: true,
            }))
        }
        None => {
            let outcome = state.facade.reload_relay().await?;
            Ok(Json(ReloadResponse {
                outcome: Some(outcome),
                settled: false,
            }))
        }
    }
}

pub async fn get_relay_config(State(state): State<AdminState>) -> Result<Json<RelayDocument>, ApiError> {
    Ok(Json(blocking(&state, |f| f.relay_config()).await?))
}

pub async fn get_whitelist(State(state): State<AdminState>) -> Result<Json<Vec<AccessEntry>>, ApiError> {
    Ok(Json(blocking(&state, |f| f.get_whitelist()).await?))
}

pub async fn set_whitelist(
    State(state): State<AdminState>,
    Json(entries): Json<Vec<EntryRequest>>,
) -> Result<Json<Vec<AccessEntry>>, ApiError> {
    let listed = blocking(&state, move |f| {
        f.set_whitelist(&entries)?;
        f.get_whitelist()
    })
    .await?;
    Ok(Json(listed))
}

pub async fn get_blacklist(State(state): State<AdminState>) -> Result<Json<Vec<AccessEntry>>, ApiError> {
    Ok(Json(blocking(&state, |f| f.get_blacklist()).await?))
}

pub async fn set_blacklist(
    State(state): State<AdminState>,
    Json(entries): Json<Vec<EntryRequest>>,
) -> Result<Json<Vec<AccessEntry>>, ApiError> {
    let listed = blocking(&state, move |f| {
        f.set_blacklist(&entries)?;
        f.get_blacklist()
    })
    .await?;
    Ok(Json(listed))
}

pub async fn get_access_mode(State(state): State<AdminState>) -> Result<Json<ModeBody>, ApiError> {
    Ok(Json(ModeBody {
        mode: blocking(&state, |f| f.get_access_mode()).await?,
    }))
}

pub async fn set_access_mode(
    State(state): State<AdminState>,
    Json(body): Json<ModeBody>,
) -> Result<Json<ModeBody>, ApiError> {
    let mode = body.mode;
    blocking(&state, move |f| f.set_access_mode(mode)).await?;
    Ok(Json(body))
}

pub async fn reconcile(State(state): State<AdminState>) -> Result<Json<ReconcileResponse>, ApiError> {
    let applied = blocking(&state, |f| f.reconcile()).await?;
    Ok(Json(ReconcileResponse { applied }))
}
