//! Bridge control handlers - upstream start/stop and status.

use axum::Json;
use axum::extract::State;
use inboxlink_runtime::StartOutcome;

use crate::dto::{BridgeStatusResponse, StartBridgeRequest, StartBridgeResponse, StopBridgeRequest};
use crate::error::HttpError;
use crate::state::AppState;

/// Reason recorded when a client stops the bridge without giving one.
const DEFAULT_STOP_REASON: &str = "stopped by request";

/// Current bridge status and provider.
pub async fn status(State(state): State<AppState>) -> Json<BridgeStatusResponse> {
    let provider = state.bridge.provider();
    Json(BridgeStatusResponse {
        bridge_status: state.bridge.status(),
        provider: provider.info(),
        capabilities: provider.capabilities,
        active_base_url: state.bridge.active_base_url().await,
        subscribers: state.bridge.bus().subscriber_count(),
    })
}

/// Start or retarget the upstream bridge.
pub async fn start(
    State(state): State<AppState>,
    Json(req): Json<StartBridgeRequest>,
) -> Result<Json<StartBridgeResponse>, HttpError> {
    let outcome = state.bridge.start(&req.base_url).await?;
    if outcome == StartOutcome::Unavailable {
        return Err(HttpError::ServiceUnavailable(
            "no HTTP client available to reach upstream".to_string(),
        ));
    }
    Ok(Json(StartBridgeResponse::new(outcome, state.bridge.status())))
}

/// Stop the upstream bridge and publish `offline`.
pub async fn stop(
    State(state): State<AppState>,
    body: Option<Json<StopBridgeRequest>>,
) -> Json<BridgeStatusResponse> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    state
        .bridge
        .stop(Some(req.reason.as_deref().unwrap_or(DEFAULT_STOP_REASON)))
        .await;
    status(State(state)).await
}
