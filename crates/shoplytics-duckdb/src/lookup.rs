use anyhow::Result;
use duckdb::Connection;
use serde_json::Value;

use shoplytics_core::event::TrackEvent;
use shoplytics_core::event_types::PRODUCT;
use shoplytics_core::payload::{self, VIEW_TIME};
use shoplytics_core::tracking::{LastActionQuery, PopularProductQuery};

use crate::criteria::{fetch_events, fetch_first, EventCriteria, EventOrder};
use crate::DuckDbBackend;

/// Newest session of the customer in the shop, skipping `exclude_token`.
fn newest_session_id(
    conn: &Connection,
    customer_id: i64,
    shop_id: i64,
    exclude_token: Option<&str>,
) -> Result<Option<i64>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM track_sessions \
         WHERE customer_id = ?1 AND shop_id = ?2 \
           AND (?3 IS NULL OR session_token <> ?3) \
         ORDER BY created_at DESC, id DESC \
         LIMIT 1",
    )?;
    let mut rows = stmt.query(duckdb::params![customer_id, shop_id, exclude_token])?;
    match rows.next()? {
        Some(row) => Ok(Some(row.get(0)?)),
        None => Ok(None),
    }
}

pub(crate) async fn last_action_by_type_inner(
    db: &DuckDbBackend,
    query: &LastActionQuery,
) -> Result<Option<Value>> {
    let conn = db.conn.lock().await;
    let Some(session_id) = newest_session_id(
        &conn,
        query.customer_id,
        query.shop_id,
        query.exclude_session_token.as_deref(),
    )?
    else {
        return Ok(None);
    };

    let types = std::iter::once(query.event_type).chain(query.alt_type);
    let event = fetch_first(&conn, EventCriteria::in_session(session_id).types(types))?;
    Ok(event.map(|e| e.payload))
}

/// Pick the product event with the highest numeric `view_time`; ties go to
/// the newer event. Without any numeric `view_time`, the newest event wins.
/// `events` must be ordered newest first.
fn most_viewed(events: Vec<TrackEvent>) -> Option<TrackEvent> {
    let mut best: Option<(f64, usize)> = None;
    for (idx, event) in events.iter().enumerate() {
        let Some(view_time) = payload::numeric_field(&event.payload, VIEW_TIME) else {
            continue;
        };
        if best.map_or(true, |(top, _)| view_time > top) {
            best = Some((view_time, idx));
        }
    }
    let idx = best.map_or(0, |(_, idx)| idx);
    events.into_iter().nth(idx)
}

pub(crate) async fn last_session_most_popular_product_inner(
    db: &DuckDbBackend,
    query: &PopularProductQuery,
) -> Result<Option<Value>> {
    let product = db.require_type(PRODUCT)?;
    let conn = db.conn.lock().await;

    let newest_session = fetch_first(
        &conn,
        EventCriteria::in_shop(query.shop_id)
            .customer(query.customer_id)
            .types([product])
            .exclude_session_token(query.exclude_session_token.clone())
            .exclude_article_id(query.exclude_article_id.clone()),
    )?
    .and_then(|event| event.session_id);
    let Some(session_id) = newest_session else {
        return Ok(None);
    };

    let in_session = fetch_events(
        &conn,
        &EventCriteria::in_session(session_id)
            .types([product])
            .exclude_article_id(query.exclude_article_id.clone()),
    )?;
    Ok(most_viewed(in_session).map(|e| e.payload))
}

pub(crate) async fn session_payloads_by_type_inner(
    db: &DuckDbBackend,
    customer_id: i64,
    shop_id: i64,
    session_token: &str,
    event_type: i32,
) -> Result<Vec<Value>> {
    let conn = db.conn.lock().await;
    let events = fetch_events(
        &conn,
        &EventCriteria::in_shop(shop_id)
            .customer(customer_id)
            .session_token(session_token)
            .types([event_type]),
    )?;
    Ok(events.into_iter().map(|e| e.payload).collect())
}

pub(crate) async fn analytic_data_by_type_inner(
    db: &DuckDbBackend,
    shop_id: i64,
    event_type: i32,
) -> Result<Vec<Value>> {
    let conn = db.conn.lock().await;
    let events = fetch_events(
        &conn,
        &EventCriteria::in_shop(shop_id)
            .types([event_type])
            .order(EventOrder::OldestFirst),
    )?;
    Ok(events.into_iter().map(|e| e.payload).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn row(id: i64, payload: Value) -> TrackEvent {
        TrackEvent {
            id,
            session_id: Some(1),
            client_uuid: "u1".to_string(),
            url: None,
            event_type: 1,
            payload,
            created_at: NaiveDate::from_ymd_opt(2024, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, id as u32))
                .expect("valid"),
        }
    }

    #[test]
    fn most_viewed_prefers_view_time_over_recency() {
        let events = vec![
            row(3, json!({ "articleID": "new" })),
            row(2, json!({ "articleID": "short", "view_time": 4 })),
            row(1, json!({ "articleID": "long", "view_time": "30" })),
        ];
        let picked = most_viewed(events).expect("some");
        assert_eq!(picked.id, 1);
    }

    #[test]
    fn most_viewed_ties_go_to_newest() {
        let events = vec![
            row(2, json!({ "view_time": 10 })),
            row(1, json!({ "view_time": 10 })),
        ];
        assert_eq!(most_viewed(events).expect("some").id, 2);
    }

    #[test]
    fn most_viewed_falls_back_to_newest() {
        let events = vec![
            row(5, json!({ "view_time": "n/a" })),
            row(4, json!({})),
        ];
        assert_eq!(most_viewed(events).expect("some").id, 5);
        assert!(most_viewed(Vec::new()).is_none());
    }
}
