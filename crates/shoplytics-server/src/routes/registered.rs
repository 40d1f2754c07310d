use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, extract::State, response::IntoResponse, Json};
use serde_json::Value;

use shoplytics_core::rollup::RollupSource;

use crate::{error::AppError, routes::dual_json, state::AppState, validation::rollup_filter};

/// `POST /analytics/autocomplete-registered-users-time-spent`
///
/// Average seconds from sign-up form to registration, split by whether the
/// form was autofilled. Response:
/// `{ "time_with_autofill": n, "time_without_autofill": n }`.
#[tracing::instrument(skip(state, body))]
pub async fn time_spent(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let filter = rollup_filter(body)?;

    let spent = state.tracking.registered_time_spent(&filter).await?;
    Ok(Json(spent))
}

/// `POST /analytics/autocomplete-registered-users-count`
#[tracing::instrument(skip(state, body))]
pub async fn count(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let filter = rollup_filter(body)?;

    let series = state
        .tracking
        .dual_series(
            &filter,
            RollupSource::Registrations { with_autofill: true },
            RollupSource::Registrations { with_autofill: false },
        )
        .await?;
    Ok(dual_json(series, "number_with_autofill", "number_without_autofill"))
}
