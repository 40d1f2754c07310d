use anyhow::Result;
use duckdb::Connection;

use shoplytics_core::rollup::{trimmed_average, RollupFilter, TimeSpent};

use crate::queries::rollup::range_filter;
use crate::DuckDbBackend;

fn durations(conn: &Connection, filter: &RollupFilter, with_autofill: bool) -> Result<Vec<f64>> {
    let (filter_sql, mut params) =
        range_filter(filter.shop_id, filter.start_date, filter.end_date, 1);
    let autofill_idx = params.len() + 1;
    params.push(Box::new(with_autofill));

    let sql = format!(
        "SELECT duration FROM registered_customers \
         WHERE {filter_sql} AND with_autofill = ?{autofill_idx} AND duration IS NOT NULL"
    );
    let param_refs: Vec<&dyn duckdb::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(param_refs.as_slice(), |row| row.get::<_, f64>(0))?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Average sign-to-register time with and without autofill, outliers above
/// twice the group mean dropped.
pub(crate) async fn registered_time_spent_inner(
    db: &DuckDbBackend,
    filter: &RollupFilter,
) -> Result<TimeSpent> {
    let conn = db.conn.lock().await;
    Ok(TimeSpent {
        time_with_autofill: trimmed_average(&durations(&conn, filter, true)?),
        time_without_autofill: trimmed_average(&durations(&conn, filter, false)?),
    })
}
