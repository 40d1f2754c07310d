use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use shoplytics_core::event::NewTrackEvent;

use crate::{
    error::AppError,
    state::AppState,
    validation::{parse_body, present, FieldChecks},
};

#[derive(Debug, Deserialize)]
pub struct TrackDataRequest {
    #[serde(default, alias = "customerId", deserialize_with = "present")]
    pub customer_id: Option<Value>,
    #[serde(default, alias = "shopId", deserialize_with = "present")]
    pub shop_id: Option<Value>,
    #[serde(default, alias = "sessionId", deserialize_with = "present")]
    pub session_id: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub uuid: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub url: Option<Value>,
    #[serde(default, rename = "type", deserialize_with = "present")]
    pub event_type: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub data: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct MergeCustomersRequest {
    #[serde(default, alias = "masterId", deserialize_with = "present")]
    pub master_id: Option<Value>,
    #[serde(default, alias = "slaveId", deserialize_with = "present")]
    pub slave_id: Option<Value>,
}

/// `POST /analytics/track-data`: record one tracked action.
///
/// Body: `customer_id`, `shop_id`, `session_id` (client session token),
/// `uuid`, optional `url`, `type` and the free-form `data` payload.
/// The session is created on first sight and derived fields (`duration`,
/// `view_time`) are filled in before the response is sent.
///
/// Response: `{ "success": true, "trackId": <id> }`.
#[tracing::instrument(skip(state, body))]
pub async fn track_data(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req: TrackDataRequest = parse_body(body)?;
    let mut checks = FieldChecks::default();
    let event = NewTrackEvent {
        customer_id: checks.id("customer_id", req.customer_id),
        shop_id: checks.id("shop_id", req.shop_id),
        session_token: checks.token("session_id", req.session_id),
        client_uuid: checks.token("uuid", req.uuid),
        url: checks.optional_url("url", req.url),
        event_type: checks.event_type("type", req.event_type, state.event_types()),
        payload: checks.json("data", req.data),
    };
    checks.finish()?;

    let track_id = state.tracking.record_event(event).await?;
    debug!(track_id, "event recorded");
    Ok(Json(json!({ "success": true, "trackId": track_id })))
}

/// `POST /analytics/merge-customers`: fold a guest session identity
/// (`slave_id`) into a known one (`master_id`).
///
/// Unknown slave tokens succeed without changes.
#[tracing::instrument(skip(state, body))]
pub async fn merge_customers(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req: MergeCustomersRequest = parse_body(body)?;
    let mut checks = FieldChecks::default();
    let master = checks.token("master_id", req.master_id);
    let slave = checks.token("slave_id", req.slave_id);
    checks.finish()?;

    state.tracking.merge_sessions(&master, &slave).await?;
    Ok(Json(json!({ "success": true })))
}
