use std::sync::Arc;

use axum::{
    http::HeaderValue,
    routing::{get, post, MethodRouter},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{routes, state::AppState};

type AppRouter = Router<Arc<AppState>>;

/// Mount `handler` at `/analytics/{name}` with and without a trailing slash.
fn analytics(router: AppRouter, name: &str, handler: MethodRouter<Arc<AppState>>) -> AppRouter {
    router
        .route(&format!("/analytics/{name}"), handler.clone())
        .route(&format!("/analytics/{name}/"), handler)
}

/// Allowed origins from `SHOPLYTICS_CORS_ORIGINS`; empty means any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();
    let allow_origin = if parsed.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(parsed)
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Construct the Axum [`Router`] with all routes and middleware attached.
///
/// Middleware is applied in outer-to-inner order (outermost runs first on
/// request, last on response):
///
/// 1. `TraceLayer`: structured request/response logging via `tracing`.
/// 2. `CorsLayer`: storefront scripts call the tracking endpoints
///    cross-origin.
pub fn build_app(state: Arc<AppState>) -> Router {
    let router = Router::new().route("/health", get(routes::health::health));

    let endpoints: [(&str, MethodRouter<Arc<AppState>>); 21] = [
        ("track-data", post(routes::track::track_data)),
        ("merge-customers", post(routes::track::merge_customers)),
        ("get-last-action-by-type", post(routes::lookup::last_action_by_type)),
        ("get-last-session-popular", post(routes::lookup::last_session_popular)),
        ("get-data-by-type", post(routes::lookup::data_by_type)),
        ("get-session-last-voucher", post(routes::lookup::session_last_voucher)),
        (
            "autocomplete-registered-users-time-spent",
            post(routes::registered::time_spent),
        ),
        ("autocomplete-registered-users-count", post(routes::registered::count)),
        ("basket-pop-up", post(routes::popup::show_vs_click)),
        ("basket-pop-up-show-vs-click", post(routes::popup::show_vs_click)),
        ("basket-pop-up-click-vs-purchase", post(routes::popup::click_vs_purchase)),
        ("basket-pop-up-clicks", post(routes::popup::clicks)),
        ("basket-pop-up-purchases", post(routes::popup::purchases)),
        ("basket-pop-up-revenue", post(routes::popup::revenue)),
        ("basket-pop-up-items", post(routes::popup::items)),
        ("recommendation", post(routes::recommendation::show_vs_click)),
        (
            "recommendation-click-vs-purchase",
            post(routes::recommendation::click_vs_purchase),
        ),
        ("recommendation-clicks", post(routes::recommendation::clicks)),
        ("recommendation-purchases", post(routes::recommendation::purchases)),
        ("recommendation-revenue", post(routes::recommendation::revenue)),
        ("recommendation-items", post(routes::recommendation::items)),
    ];
    let router = endpoints
        .into_iter()
        .fold(router, |router, (name, handler)| analytics(router, name, handler));

    let cors = cors_layer(&state.config.cors_origins);
    router
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
