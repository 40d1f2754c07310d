use anyhow::Result;
use chrono::NaiveDateTime;
use duckdb::Connection;
use serde_json::Value;
use tracing::debug;

use shoplytics_core::event::NewTrackEvent;
use shoplytics_core::event_types::{REGISTER, SIGN};
use shoplytics_core::payload::{self, DURATION, VIEW_TIME};

use crate::backend::format_ts;
use crate::criteria::{fetch_first, EventCriteria};
use crate::session::upsert_session_tx;
use crate::DuckDbBackend;

/// Store one event, applying the derivation rules first.
///
/// Session upsert, the `register` duration, the `view_time` backfill onto the
/// previous viewable page and the insert itself share one transaction.
pub(crate) async fn record_event_inner(
    db: &DuckDbBackend,
    event: NewTrackEvent,
    now: NaiveDateTime,
) -> Result<i64> {
    let NewTrackEvent {
        customer_id,
        shop_id,
        session_token,
        client_uuid,
        url,
        event_type,
        payload: mut event_payload,
    } = event;
    let types = db.event_types();

    let mut conn = db.conn.lock().await;
    let tx = conn.transaction()?;

    let session = upsert_session_tx(&tx, customer_id, shop_id, &session_token, now)?;

    if types.is(event_type, REGISTER) {
        apply_sign_duration(&tx, db, session.id, &mut event_payload, now)?;
    }

    if types.is_viewable_content(event_type) {
        backfill_view_time(&tx, session.id, types.viewable_content(), now)?;
    }

    let id: i64 = tx.query_row("SELECT nextval('track_data_id_seq')", [], |row| row.get(0))?;
    tx.execute(
        "INSERT INTO track_data (id, session_id, client_uuid, url, type, payload, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        duckdb::params![
            id,
            session.id,
            client_uuid,
            url,
            event_type,
            payload::encode(&event_payload)?,
            format_ts(now),
        ],
    )?;

    tx.commit()?;
    Ok(id)
}

/// Merge `duration` (seconds since the newest `sign` event of the session)
/// into the incoming payload. Without a sign event the field is omitted.
fn apply_sign_duration(
    conn: &Connection,
    db: &DuckDbBackend,
    session_id: i64,
    event_payload: &mut Value,
    now: NaiveDateTime,
) -> Result<()> {
    let sign = db.require_type(SIGN)?;
    let Some(sign_event) = fetch_first(conn, EventCriteria::in_session(session_id).types([sign]))?
    else {
        debug!(session_id, "register without a prior sign event, duration omitted");
        return Ok(());
    };

    let duration = payload::elapsed_seconds(now, sign_event.created_at);
    if !payload::with_field(event_payload, DURATION, duration) {
        debug!(session_id, "register payload is not an object, duration omitted");
    }
    Ok(())
}

/// Close out the dwell time of the previous viewable page in the session.
///
/// The write is conditional on the stored payload being unchanged since it
/// was read, so a `view_time` set in the meantime is never overwritten.
fn backfill_view_time(
    conn: &Connection,
    session_id: i64,
    viewable: Vec<i32>,
    now: NaiveDateTime,
) -> Result<()> {
    let Some(previous) = fetch_first(conn, EventCriteria::in_session(session_id).types(viewable))?
    else {
        return Ok(());
    };
    if payload::has_field(&previous.payload, VIEW_TIME) {
        return Ok(());
    }

    let raw: Option<String> = conn.query_row(
        "SELECT payload FROM track_data WHERE id = ?1",
        duckdb::params![previous.id],
        |row| row.get(0),
    )?;
    let mut updated = payload::decode(raw.as_deref())?;
    let view_time = payload::elapsed_seconds(now, previous.created_at);
    if !payload::with_field(&mut updated, VIEW_TIME, view_time) {
        debug!(event_id = previous.id, "previous payload is not an object, view_time skipped");
        return Ok(());
    }

    let changed = conn.execute(
        "UPDATE track_data SET payload = ?1 \
         WHERE id = ?2 AND payload IS NOT DISTINCT FROM ?3",
        duckdb::params![payload::encode(&updated)?, previous.id, raw],
    )?;
    if changed == 0 {
        debug!(event_id = previous.id, "view_time already written concurrently");
    }
    Ok(())
}
