use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use shoplytics_core::config::Config;
use shoplytics_duckdb::duckdb::params;
use shoplytics_duckdb::DuckDbBackend;
use shoplytics_server::app::build_app;
use shoplytics_server::state::AppState;

fn setup() -> (Arc<AppState>, axum::Router) {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    let state = Arc::new(AppState::new(db, Config::default()));
    let app = build_app(Arc::clone(&state));
    (state, app)
}

async fn call(app: &axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("build request"),
        )
        .await
        .expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

async fn seed(state: &AppState, sql: &str) {
    let conn = state.db.conn_for_test().await;
    conn.execute_batch(sql).expect("seed");
}

#[tokio::test]
async fn popup_show_vs_click_keeps_series_separate() {
    let (state, app) = setup();
    seed(
        &state,
        "INSERT INTO popup_data (shop_id, type, data_count, created_at) VALUES
            (1, 7, 3, '2024-03-01 10:00:00'),
            (1, 7, 2, '2024-03-02 11:00:00'),
            (1, 8, 1, '2024-03-02 12:00:00'),
            (2, 7, 9, '2024-03-02 12:00:00');",
    )
    .await;

    for uri in ["/analytics/basket-pop-up-show-vs-click", "/analytics/basket-pop-up/"] {
        let (status, body) = call(&app, uri, json!({ "shopId": 1, "groupType": "day" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "number_shows": [
                    { "date": "2024-03-01", "count": 3 },
                    { "date": "2024-03-02", "count": 2 },
                ],
                "number_clicks": [{ "date": "2024-03-02", "count": 1 }],
            })
        );
    }
}

#[tokio::test]
async fn popup_revenue_sums_amount_per_month() {
    let (state, app) = setup();
    seed(
        &state,
        "INSERT INTO popup_revenue (shop_id, article_id, quantity, amount, created_at) VALUES
            (1, 'A', 1, 10.5, '2024-01-03 08:00:00'),
            (1, 'A', 2, 4.5, '2024-01-20 08:00:00'),
            (1, 'B', 1, 7.0, '2024-02-01 08:00:00');",
    )
    .await;

    let (status, body) = call(
        &app,
        "/analytics/basket-pop-up-revenue",
        json!({ "shop_id": 1, "start_date": "2024-01-01", "end_date": "2024-01-31" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{ "date": "2024-01-01", "sumAmount": 15.0 }]));

    let (_, body) = call(&app, "/analytics/basket-pop-up-purchases", json!({ "shop_id": 1 })).await;
    assert_eq!(
        body,
        json!([
            { "date": "2024-01-01", "count": 2 },
            { "date": "2024-02-01", "count": 1 },
        ])
    );
}

#[tokio::test]
async fn popup_items_rank_articles_with_order_titles() {
    let (state, app) = setup();
    seed(
        &state,
        "INSERT INTO popup_revenue (shop_id, article_id, quantity, amount, created_at) VALUES
            (1, 'A', 3, 30.0, '2024-01-03 08:00:00'),
            (1, 'B', 1, 5.0, '2024-01-04 08:00:00');
         INSERT INTO transactions (id, shop_id, created_at) VALUES
            (900, 1, '2024-01-05 09:00:00');
         INSERT INTO transaction_items (transaction_id, article_id, title, number, quantity) VALUES
            (900, 'A', 'Linen Shirt XL', '100', 5);",
    )
    .await;

    let (status, body) = call(&app, "/analytics/basket-pop-up-items", json!({ "shop_id": 1 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([
            { "name": "Linen Shirt", "count_popup": 3, "count_purchases": 5 },
            { "name": "B", "count_popup": 1, "count_purchases": 1 },
        ])
    );
}

#[tokio::test]
async fn recommendation_clicks_use_their_own_counters() {
    let (state, app) = setup();
    seed(
        &state,
        "INSERT INTO recommendation_data (shop_id, type, data_count, created_at) VALUES
            (1, 13, 4, '2024-05-10 10:00:00'),
            (1, 12, 8, '2024-05-10 10:00:00');
         INSERT INTO popup_data (shop_id, type, data_count, created_at) VALUES
            (1, 8, 100, '2024-05-10 10:00:00');",
    )
    .await;

    let (status, body) = call(
        &app,
        "/analytics/recommendation-clicks",
        json!({ "shop_id": 1, "group_type": "year" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{ "date": "2024-01-01", "count": 4 }]));
}

#[tokio::test]
async fn registered_users_split_by_autofill() {
    let (state, app) = setup();
    {
        let conn = state.db.conn_for_test().await;
        for (duration, autofill) in [(10.0, true), (20.0, true), (30.0, false)] {
            conn.execute(
                "INSERT INTO registered_customers (shop_id, duration, with_autofill, created_at) \
                 VALUES (1, ?1, ?2, '2024-06-01 10:00:00')",
                params![duration, autofill],
            )
            .expect("insert registration");
        }
    }

    let (status, body) = call(
        &app,
        "/analytics/autocomplete-registered-users-time-spent",
        json!({ "shop_id": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "time_with_autofill": 15, "time_without_autofill": 30 }));

    let (_, body) = call(
        &app,
        "/analytics/autocomplete-registered-users-count",
        json!({ "shop_id": 1, "group_type": "day" }),
    )
    .await;
    assert_eq!(
        body,
        json!({
            "number_with_autofill": [{ "date": "2024-06-01", "count": 2 }],
            "number_without_autofill": [{ "date": "2024-06-01", "count": 1 }],
        })
    );
}

#[tokio::test]
async fn rollups_require_shop_and_valid_dates() {
    let (_state, app) = setup();
    let (status, body) = call(
        &app,
        "/analytics/recommendation-revenue",
        json!({ "start_date": "01/02/2024" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["shop_id"], json!(["This field is required."]));
    assert!(body["start_date"][0].is_string());
}
