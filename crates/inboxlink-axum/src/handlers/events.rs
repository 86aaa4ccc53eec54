//! Inbox event handlers: the downstream stream and the local publish API.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use inboxlink_core::ActionResponse;

use crate::dto::PublishResponse;
use crate::state::AppState;

/// Disables response buffering in nginx-style reverse proxies.
const ACCEL_BUFFERING_HEADER: &str = "x-accel-buffering";

/// SSE inbox stream endpoint.
///
/// Starts with a handshake, then relays every envelope published on the bus.
pub async fn stream(State(state): State<AppState>) -> impl IntoResponse {
    ([(ACCEL_BUFFERING_HEADER, "no")], state.responder.sse())
}

/// Publish an action response to every connected client.
///
/// Responses that did not succeed or carry no event are accepted but not
/// published.
pub async fn publish(
    State(state): State<AppState>,
    Json(response): Json<ActionResponse>,
) -> (StatusCode, Json<PublishResponse>) {
    let published = state.bridge.publish_action_response(&response);
    (StatusCode::ACCEPTED, Json(PublishResponse { published }))
}
