use std::collections::HashMap;

use anyhow::Result;
use duckdb::Connection;

use shoplytics_core::rollup::{top_item, ItemSource, RollupFilter, TopItem};

use crate::queries::rollup::range_filter;
use crate::DuckDbBackend;

fn revenue_table(source: ItemSource) -> &'static str {
    match source {
        ItemSource::Popup => "popup_revenue",
        ItemSource::Recommendation => "recommendation_revenue",
    }
}

/// Articles with the largest summed quantity in the revenue stream.
fn ranked_articles(
    conn: &Connection,
    filter: &RollupFilter,
    source: ItemSource,
    limit: usize,
) -> Result<Vec<(String, i64)>> {
    let (filter_sql, params) = range_filter(filter.shop_id, filter.start_date, filter.end_date, 1);
    let sql = format!(
        r#"
        SELECT article_id, CAST(COALESCE(SUM(quantity), 0) AS BIGINT) AS qty
        FROM {table}
        WHERE {filter_sql}
          AND article_id IS NOT NULL
        GROUP BY article_id
        ORDER BY qty DESC, article_id ASC
        LIMIT {limit}
        "#,
        table = revenue_table(source),
    );

    let param_refs: Vec<&dyn duckdb::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(param_refs.as_slice(), |row| Ok((row.get(0)?, row.get(1)?)))?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Purchased quantity per article from the shop's order lines in range.
fn purchased_quantities(
    conn: &Connection,
    filter: &RollupFilter,
    article_ids: &[String],
) -> Result<HashMap<String, i64>> {
    if article_ids.is_empty() {
        return Ok(HashMap::new());
    }

    // transaction_items carries neither shop_id nor created_at, so the
    // unqualified range columns resolve to the transaction.
    let (filter_sql, mut params) =
        range_filter(filter.shop_id, filter.start_date, filter.end_date, 1);
    let first_article_idx = params.len() + 1;
    let placeholders = (0..article_ids.len())
        .map(|i| format!("?{}", first_article_idx + i))
        .collect::<Vec<_>>()
        .join(", ");
    for article_id in article_ids {
        params.push(Box::new(article_id.clone()));
    }

    let sql = format!(
        r#"
        SELECT ti.article_id, CAST(COALESCE(SUM(ti.quantity), 0) AS BIGINT)
        FROM transaction_items ti
        JOIN transactions t ON t.id = ti.transaction_id
        WHERE {filter_sql}
          AND ti.article_id IN ({placeholders})
        GROUP BY ti.article_id
        "#
    );

    let param_refs: Vec<&dyn duckdb::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(param_refs.as_slice(), |row| Ok((row.get(0)?, row.get(1)?)))?;
    Ok(rows.collect::<std::result::Result<HashMap<_, _>, _>>()?)
}

/// Display title of an article: the first order line by article number.
fn article_title(conn: &Connection, shop_id: i64, article_id: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare(
        "SELECT ti.title \
         FROM transaction_items ti \
         JOIN transactions t ON t.id = ti.transaction_id \
         WHERE t.shop_id = ?1 AND ti.article_id = ?2 AND ti.title IS NOT NULL \
         ORDER BY ti.number ASC NULLS LAST, ti.id ASC \
         LIMIT 1",
    )?;
    let mut rows = stmt.query(duckdb::params![shop_id, article_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row.get(0)?)),
        None => Ok(None),
    }
}

pub(crate) async fn top_items_inner(
    db: &DuckDbBackend,
    filter: &RollupFilter,
    source: ItemSource,
    limit: usize,
) -> Result<Vec<TopItem>> {
    let conn = db.conn.lock().await;

    let ranked = ranked_articles(&conn, filter, source, limit)?;
    let article_ids: Vec<String> = ranked.iter().map(|(id, _)| id.clone()).collect();
    let purchased = purchased_quantities(&conn, filter, &article_ids)?;

    let mut items = Vec::with_capacity(ranked.len());
    for (article_id, popup_qty) in ranked {
        let title = article_title(&conn, filter.shop_id, &article_id)?;
        let purchase_qty = purchased.get(&article_id).copied().unwrap_or(0);
        items.push(top_item(title.as_deref(), &article_id, popup_qty, purchase_qty));
    }
    Ok(items)
}
