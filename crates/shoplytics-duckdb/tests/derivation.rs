use chrono::NaiveDateTime;
use serde_json::{json, Value};

use shoplytics_core::event::NewTrackEvent;
use shoplytics_core::tracking::TrackingBackend;
use shoplytics_duckdb::DuckDbBackend;

const OTHER: i32 = 0;
const PRODUCT: i32 = 1;
const CATEGORY: i32 = 2;
const SEARCH: i32 = 3;
const REGISTER: i32 = 4;
const SIGN: i32 = 5;

fn ts(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").expect("timestamp")
}

fn event(token: &str, event_type: i32, payload: Value) -> NewTrackEvent {
    NewTrackEvent {
        customer_id: 1,
        shop_id: 1,
        session_token: token.to_string(),
        client_uuid: "u1".to_string(),
        url: Some("https://shop.example/p/1".to_string()),
        event_type,
        payload,
    }
}

async fn payload_of(db: &DuckDbBackend, id: i64) -> Value {
    let conn = db.conn_for_test().await;
    let raw: Option<String> = conn
        .query_row(
            "SELECT payload FROM track_data WHERE id = ?1",
            duckdb::params![id],
            |row| row.get(0),
        )
        .expect("payload");
    raw.map(|text| serde_json::from_str(&text).expect("json"))
        .unwrap_or(Value::Null)
}

#[tokio::test]
async fn register_gets_seconds_since_sign() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    db.record_event_at(event("s1", SIGN, json!({})), ts("2024-02-01 12:00:00"))
        .await
        .expect("sign");
    let id = db
        .record_event_at(
            event("s1", REGISTER, json!({ "email": "a@b.c" })),
            ts("2024-02-01 12:00:42"),
        )
        .await
        .expect("register");

    assert_eq!(payload_of(&db, id).await, json!({ "email": "a@b.c", "duration": 42 }));
}

#[tokio::test]
async fn register_without_sign_omits_duration() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    // A sign event in another session must not count.
    db.record_event_at(event("s0", SIGN, json!({})), ts("2024-02-01 11:00:00"))
        .await
        .expect("sign elsewhere");
    let id = db
        .record_event_at(event("s1", REGISTER, json!({ "email": "a@b.c" })), ts("2024-02-01 12:00:00"))
        .await
        .expect("register");

    assert_eq!(payload_of(&db, id).await, json!({ "email": "a@b.c" }));
}

#[tokio::test]
async fn register_via_trait_uses_wall_clock() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    db.record_event(event("s1", SIGN, json!({}))).await.expect("sign");
    let id = db
        .record_event(event("s1", REGISTER, json!({})))
        .await
        .expect("register");

    let duration = payload_of(&db, id).await["duration"].as_i64().expect("duration");
    assert!((0..=1).contains(&duration), "got {duration}");
}

#[tokio::test]
async fn view_time_is_backfilled_once_onto_previous_page() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let first = db
        .record_event_at(event("s1", PRODUCT, json!({ "articleID": "A1" })), ts("2024-02-01 12:00:00"))
        .await
        .expect("first");
    let second = db
        .record_event_at(event("s1", CATEGORY, json!({ "id": 9 })), ts("2024-02-01 12:00:15"))
        .await
        .expect("second");
    db.record_event_at(event("s1", OTHER, json!({})), ts("2024-02-01 12:00:40"))
        .await
        .expect("third");

    assert_eq!(payload_of(&db, first).await, json!({ "articleID": "A1", "view_time": 15 }));
    assert_eq!(payload_of(&db, second).await, json!({ "id": 9, "view_time": 25 }));
}

#[tokio::test]
async fn existing_view_time_is_never_overwritten() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let first = db
        .record_event_at(event("s1", PRODUCT, json!({ "view_time": 3 })), ts("2024-02-01 12:00:00"))
        .await
        .expect("first");
    db.record_event_at(event("s1", PRODUCT, json!({})), ts("2024-02-01 12:01:00"))
        .await
        .expect("second");

    assert_eq!(payload_of(&db, first).await, json!({ "view_time": 3 }));
}

#[tokio::test]
async fn non_viewable_events_neither_trigger_nor_receive_view_time() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let product = db
        .record_event_at(event("s1", PRODUCT, json!({})), ts("2024-02-01 12:00:00"))
        .await
        .expect("product");
    let search = db
        .record_event_at(event("s1", SEARCH, json!({ "q": "shoes" })), ts("2024-02-01 12:00:05"))
        .await
        .expect("search");
    assert_eq!(payload_of(&db, product).await, json!({}));

    db.record_event_at(event("s1", CATEGORY, json!({})), ts("2024-02-01 12:00:09"))
        .await
        .expect("category");
    assert_eq!(payload_of(&db, product).await, json!({ "view_time": 9 }));
    assert_eq!(payload_of(&db, search).await, json!({ "q": "shoes" }));
}

#[tokio::test]
async fn backfill_stays_inside_the_session() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let other_session = db
        .record_event_at(event("s1", PRODUCT, json!({})), ts("2024-02-01 12:00:00"))
        .await
        .expect("s1");
    db.record_event_at(event("s2", PRODUCT, json!({})), ts("2024-02-01 12:00:30"))
        .await
        .expect("s2");

    assert_eq!(payload_of(&db, other_session).await, json!({}));
}

#[tokio::test]
async fn odd_payload_shapes_do_not_fail_the_write() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let list = db
        .record_event_at(event("s1", PRODUCT, json!([1, 2])), ts("2024-02-01 12:00:00"))
        .await
        .expect("list payload");
    let null = db
        .record_event_at(event("s1", PRODUCT, Value::Null), ts("2024-02-01 12:00:10"))
        .await
        .expect("null payload");
    db.record_event_at(event("s1", PRODUCT, json!({})), ts("2024-02-01 12:00:12"))
        .await
        .expect("object payload");

    assert_eq!(payload_of(&db, list).await, json!([1, 2]));
    assert_eq!(payload_of(&db, null).await, json!({ "view_time": 2 }));
}
