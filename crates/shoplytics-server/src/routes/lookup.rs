use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use shoplytics_core::event_types::VOUCHER;
use shoplytics_core::tracking::{LastActionQuery, PopularProductQuery};

use crate::{
    error::AppError,
    state::AppState,
    validation::{parse_body, present, FieldChecks},
};

#[derive(Debug, Deserialize)]
pub struct LastActionRequest {
    #[serde(default, alias = "customerId", deserialize_with = "present")]
    pub customer_id: Option<Value>,
    #[serde(default, alias = "shopId", deserialize_with = "present")]
    pub shop_id: Option<Value>,
    #[serde(default, rename = "type", deserialize_with = "present")]
    pub event_type: Option<Value>,
    #[serde(default, alias = "altType", deserialize_with = "present")]
    pub alt_type: Option<Value>,
    #[serde(default, alias = "sessionId", deserialize_with = "present")]
    pub session_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct PopularProductRequest {
    #[serde(default, alias = "customerId", deserialize_with = "present")]
    pub customer_id: Option<Value>,
    #[serde(default, alias = "shopId", deserialize_with = "present")]
    pub shop_id: Option<Value>,
    #[serde(default, alias = "sessionId", deserialize_with = "present")]
    pub session_id: Option<Value>,
    #[serde(default, alias = "excludeId", deserialize_with = "present")]
    pub exclude_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct DataByTypeRequest {
    #[serde(default, alias = "shopId", deserialize_with = "present")]
    pub shop_id: Option<Value>,
    #[serde(default, rename = "type", deserialize_with = "present")]
    pub event_type: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct SessionVoucherRequest {
    #[serde(default, alias = "customerId", deserialize_with = "present")]
    pub customer_id: Option<Value>,
    #[serde(default, alias = "shopId", deserialize_with = "present")]
    pub shop_id: Option<Value>,
    #[serde(default, alias = "sessionId", deserialize_with = "present")]
    pub session_id: Option<Value>,
    #[serde(default, rename = "type", deserialize_with = "present")]
    pub event_type: Option<Value>,
}

/// A stored payload, or `{}` when nothing matched.
fn payload_or_empty(payload: Option<Value>) -> Json<Value> {
    Json(payload.unwrap_or_else(|| json!({})))
}

/// `POST /analytics/get-last-action-by-type`
///
/// Payload of the newest `type` (or `alt_type`) event in the customer's
/// newest session. With `session_id`, that session is skipped so the
/// answer comes from an earlier visit.
#[tracing::instrument(skip(state, body))]
pub async fn last_action_by_type(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req: LastActionRequest = parse_body(body)?;
    let types = state.event_types();
    let mut checks = FieldChecks::default();
    let query = LastActionQuery {
        customer_id: checks.id("customer_id", req.customer_id),
        shop_id: checks.id("shop_id", req.shop_id),
        event_type: checks.event_type("type", req.event_type, types),
        alt_type: checks.optional_event_type("alt_type", req.alt_type, types),
        exclude_session_token: checks.optional_token("session_id", req.session_id),
    };
    checks.finish()?;

    let payload = state.tracking.last_action_by_type(&query).await?;
    Ok(payload_or_empty(payload))
}

/// `POST /analytics/get-last-session-popular`
///
/// The product the customer looked at longest during their last session,
/// optionally skipping the current session and one article (`exclude_id`).
#[tracing::instrument(skip(state, body))]
pub async fn last_session_popular(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req: PopularProductRequest = parse_body(body)?;
    let mut checks = FieldChecks::default();
    let query = PopularProductQuery {
        customer_id: checks.id("customer_id", req.customer_id),
        shop_id: checks.id("shop_id", req.shop_id),
        exclude_session_token: checks.optional_token("session_id", req.session_id),
        exclude_article_id: checks.optional_string("exclude_id", req.exclude_id),
    };
    checks.finish()?;

    let payload = state.tracking.last_session_most_popular_product(&query).await?;
    Ok(payload_or_empty(payload))
}

/// `POST /analytics/get-data-by-type`: every payload of `type` in the shop,
/// oldest first, each wrapped as `{ "data": <payload> }`. An empty result
/// is returned as `{}`.
#[tracing::instrument(skip(state, body))]
pub async fn data_by_type(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req: DataByTypeRequest = parse_body(body)?;
    let mut checks = FieldChecks::default();
    let shop_id = checks.id("shop_id", req.shop_id);
    let event_type = checks.event_type("type", req.event_type, state.event_types());
    checks.finish()?;

    let payloads = state.tracking.analytic_data_by_type(shop_id, event_type).await?;
    if payloads.is_empty() {
        return Ok(Json(json!({})));
    }
    let rows = payloads
        .into_iter()
        .map(|payload| json!({ "data": payload }))
        .collect();
    Ok(Json(Value::Array(rows)))
}

/// `POST /analytics/get-session-last-voucher`: newest voucher payload of
/// one session. `type` overrides the voucher type code.
#[tracing::instrument(skip(state, body))]
pub async fn session_last_voucher(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req: SessionVoucherRequest = parse_body(body)?;
    let types = state.event_types();
    let mut checks = FieldChecks::default();
    let customer_id = checks.id("customer_id", req.customer_id);
    let shop_id = checks.id("shop_id", req.shop_id);
    let session_token = checks.token("session_id", req.session_id);
    let event_type = checks
        .optional_event_type("type", req.event_type, types)
        .or_else(|| types.code(VOUCHER));
    checks.finish()?;

    let Some(event_type) = event_type else {
        return Ok(payload_or_empty(None));
    };
    let payloads = state
        .tracking
        .session_payloads_by_type(customer_id, shop_id, &session_token, event_type)
        .await?;
    Ok(payload_or_empty(payloads.into_iter().next()))
}
