//! Basket pop-up dashboards: impressions, clicks, attributed orders and
//! revenue, bucketed by `group_type`.

use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, extract::State, response::IntoResponse, Json};
use serde_json::Value;

use shoplytics_core::rollup::{ItemSource, RollupSource};

use crate::{error::AppError, routes::dual_json, state::AppState, validation::rollup_filter};

/// `POST /analytics/basket-pop-up-show-vs-click` (also `basket-pop-up`)
#[tracing::instrument(skip(state, body))]
pub async fn show_vs_click(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let filter = rollup_filter(body)?;

    let series = state
        .tracking
        .dual_series(&filter, RollupSource::PopupShows, RollupSource::PopupClicks)
        .await?;
    Ok(dual_json(series, "number_shows", "number_clicks"))
}

/// `POST /analytics/basket-pop-up-click-vs-purchase`
#[tracing::instrument(skip(state, body))]
pub async fn click_vs_purchase(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let filter = rollup_filter(body)?;

    let series = state
        .tracking
        .dual_series(&filter, RollupSource::PopupClicks, RollupSource::PopupPurchases)
        .await?;
    Ok(dual_json(series, "number_clicks", "number_purchases"))
}

/// `POST /analytics/basket-pop-up-clicks`: `[{ date, count }]`
#[tracing::instrument(skip(state, body))]
pub async fn clicks(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let filter = rollup_filter(body)?;

    let series = state
        .tracking
        .bucketed_count(&filter, RollupSource::PopupClicks)
        .await?;
    Ok(Json(series))
}

/// `POST /analytics/basket-pop-up-purchases`: one count per attributed order line.
#[tracing::instrument(skip(state, body))]
pub async fn purchases(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let filter = rollup_filter(body)?;

    let series = state
        .tracking
        .bucketed_count(&filter, RollupSource::PopupPurchases)
        .await?;
    Ok(Json(series))
}

/// `POST /analytics/basket-pop-up-revenue`: `[{ date, sumAmount }]`
#[tracing::instrument(skip(state, body))]
pub async fn revenue(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let filter = rollup_filter(body)?;

    let series = state
        .tracking
        .bucketed_sum(&filter, RollupSource::PopupRevenue)
        .await?;
    Ok(Json(series))
}

/// `POST /analytics/basket-pop-up-items`: best-selling pop-up articles.
#[tracing::instrument(skip(state, body))]
pub async fn items(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let filter = rollup_filter(body)?;

    let items = state
        .tracking
        .top_items(&filter, ItemSource::Popup, state.config.top_items_limit)
        .await?;
    Ok(Json(items))
}
