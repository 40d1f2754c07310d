pub mod health;
pub mod lookup;
pub mod popup;
pub mod recommendation;
pub mod registered;
pub mod track;

use axum::Json;
use serde_json::{json, Value};

use shoplytics_core::rollup::DualSeries;

/// Render two independent series under their wire names.
pub(crate) fn dual_json(series: DualSeries, first: &str, second: &str) -> Json<Value> {
    let mut body = serde_json::Map::new();
    body.insert(first.to_string(), json!(series.first));
    body.insert(second.to_string(), json!(series.second));
    Json(Value::Object(body))
}
