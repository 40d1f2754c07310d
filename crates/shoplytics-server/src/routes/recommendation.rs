use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, extract::State, response::IntoResponse, Json};
use serde_json::Value;

use shoplytics_core::rollup::{ItemSource, RollupSource};

use crate::{error::AppError, routes::dual_json, state::AppState, validation::rollup_filter};

/// `POST /analytics/recommendation`: widget impressions against clicks.
#[tracing::instrument(skip(state, body))]
pub async fn show_vs_click(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let filter = rollup_filter(body)?;

    let series = state
        .tracking
        .dual_series(
            &filter,
            RollupSource::RecommendationShows,
            RollupSource::RecommendationClicks,
        )
        .await?;
    Ok(dual_json(series, "number_shows", "number_clicks"))
}

#[tracing::instrument(skip(state, body))]
pub async fn click_vs_purchase(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let filter = rollup_filter(body)?;

    let series = state
        .tracking
        .dual_series(
            &filter,
            RollupSource::RecommendationClicks,
            RollupSource::RecommendationPurchases,
        )
        .await?;
    Ok(dual_json(series, "number_clicks", "number_purchases"))
}

#[tracing::instrument(skip(state, body))]
pub async fn clicks(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let filter = rollup_filter(body)?;

    let series = state
        .tracking
        .bucketed_count(&filter, RollupSource::RecommendationClicks)
        .await?;
    Ok(Json(series))
}

#[tracing::instrument(skip(state, body))]
pub async fn purchases(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let filter = rollup_filter(body)?;

    let series = state
        .tracking
        .bucketed_count(&filter, RollupSource::RecommendationPurchases)
        .await?;
    Ok(Json(series))
}

#[tracing::instrument(skip(state, body))]
pub async fn revenue(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let filter = rollup_filter(body)?;

    let series = state
        .tracking
        .bucketed_sum(&filter, RollupSource::RecommendationRevenue)
        .await?;
    Ok(Json(series))
}

/// `POST /analytics/recommendation-items`: articles most often bought from
/// a recommendation, with the same naming and purchase floor as pop-up items.
#[tracing::instrument(skip(state, body))]
pub async fn items(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let filter = rollup_filter(body)?;

    let items = state
        .tracking
        .top_items(&filter, ItemSource::Recommendation, state.config.top_items_limit)
        .await?;
    Ok(Json(items))
}
