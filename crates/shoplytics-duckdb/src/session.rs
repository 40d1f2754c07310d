use anyhow::Result;
use chrono::NaiveDateTime;
use duckdb::Connection;
use tracing::{debug, info};

use shoplytics_core::event::{MergeOutcome, TrackSession};
use shoplytics_core::event_types::FIRST_VIEWED_PAGE;

use crate::backend::{format_ts, parse_ts};
use crate::DuckDbBackend;

/// Get-or-create the session for `(customer_id, shop_id, session_token)`.
///
/// Runs as insert-on-conflict followed by a read of the unique row, so two
/// identical calls can never produce two rows. Must be called inside the
/// caller's transaction while the connection lock is held.
pub(crate) fn upsert_session_tx(
    conn: &Connection,
    customer_id: i64,
    shop_id: i64,
    session_token: &str,
    now: NaiveDateTime,
) -> Result<TrackSession> {
    let now_str = format_ts(now);
    conn.execute(
        "INSERT INTO track_sessions (customer_id, shop_id, session_token, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?4) \
         ON CONFLICT (customer_id, shop_id, session_token) \
         DO UPDATE SET updated_at = EXCLUDED.updated_at",
        duckdb::params![customer_id, shop_id, session_token, now_str],
    )?;

    let mut stmt = conn.prepare(
        "SELECT id, customer_id, shop_id, session_token, \
                CAST(created_at AS VARCHAR), CAST(updated_at AS VARCHAR) \
         FROM track_sessions \
         WHERE customer_id = ?1 AND shop_id = ?2 AND session_token = ?3",
    )?;
    let (id, customer_id, shop_id, session_token, created_at, updated_at): (
        i64,
        i64,
        i64,
        String,
        String,
        String,
    ) = stmt.query_row(
        duckdb::params![customer_id, shop_id, session_token],
        |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ))
        },
    )?;

    Ok(TrackSession {
        id,
        customer_id,
        shop_id,
        session_token,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

pub(crate) async fn upsert_session_inner(
    db: &DuckDbBackend,
    customer_id: i64,
    shop_id: i64,
    session_token: &str,
    now: NaiveDateTime,
) -> Result<TrackSession> {
    let mut conn = db.conn.lock().await;
    let tx = conn.transaction()?;
    let session = upsert_session_tx(&tx, customer_id, shop_id, session_token, now)?;
    tx.commit()?;
    Ok(session)
}

/// Re-point every session carrying `slave_token` to `master_token`.
///
/// First-viewed-page markers of the slave sessions are deleted (a merged
/// identity has only one entry point). A slave row is renamed in place
/// unless the same customer and shop already own a master row; then its
/// events move onto that row and the slave row is dropped. An unknown slave
/// token is a no-op.
pub(crate) async fn merge_sessions_inner(
    db: &DuckDbBackend,
    master_token: &str,
    slave_token: &str,
    now: NaiveDateTime,
) -> Result<MergeOutcome> {
    let first_viewed_page = db.require_type(FIRST_VIEWED_PAGE)?;
    let mut conn = db.conn.lock().await;
    let tx = conn.transaction()?;

    let markers_deleted = tx.execute(
        "DELETE FROM track_data \
         WHERE type = ?1 \
           AND session_id IN (SELECT id FROM track_sessions WHERE session_token = ?2)",
        duckdb::params![first_viewed_page, slave_token],
    )?;

    let mut outcome = MergeOutcome {
        markers_deleted,
        ..MergeOutcome::default()
    };

    if master_token == slave_token {
        tx.commit()?;
        return Ok(outcome);
    }

    let slaves: Vec<(i64, i64, i64)> = {
        let mut stmt = tx.prepare(
            "SELECT id, customer_id, shop_id FROM track_sessions \
             WHERE session_token = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(duckdb::params![slave_token], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?;
        rows.collect::<std::result::Result<_, _>>()?
    };

    if slaves.is_empty() {
        debug!(slave_token, "merge: no session carries the slave token");
        tx.commit()?;
        return Ok(outcome);
    }

    let now_str = format_ts(now);
    for (slave_id, customer_id, shop_id) in slaves {
        let existing_master: Option<i64> = {
            let mut stmt = tx.prepare(
                "SELECT id FROM track_sessions \
                 WHERE customer_id = ?1 AND shop_id = ?2 AND session_token = ?3",
            )?;
            let mut rows = stmt.query(duckdb::params![customer_id, shop_id, master_token])?;
            match rows.next()? {
                Some(row) => Some(row.get(0)?),
                None => None,
            }
        };

        match existing_master {
            Some(master_id) => {
                tx.execute(
                    "UPDATE track_data SET session_id = ?1 WHERE session_id = ?2",
                    duckdb::params![master_id, slave_id],
                )?;
                tx.execute(
                    "DELETE FROM track_sessions WHERE id = ?1",
                    duckdb::params![slave_id],
                )?;
                outcome.sessions_folded += 1;
            }
            None => {
                tx.execute(
                    "UPDATE track_sessions SET session_token = ?1, updated_at = ?2 WHERE id = ?3",
                    duckdb::params![master_token, now_str, slave_id],
                )?;
                outcome.sessions_rewritten += 1;
            }
        }
    }

    tx.commit()?;
    info!(
        master_token,
        slave_token,
        rewritten = outcome.sessions_rewritten,
        folded = outcome.sessions_folded,
        markers_deleted = outcome.markers_deleted,
        "Sessions merged"
    );
    Ok(outcome)
}
