use anyhow::{bail, Result};
use chrono::NaiveDate;

use shoplytics_core::event_types::{
    POPUP_CLICK, POPUP_SHOW, RECOMMENDATION_CLICK, RECOMMENDATION_SHOW,
};
use shoplytics_core::rollup::{BucketCount, BucketSum, GroupType, RollupFilter, RollupSource};

use crate::DuckDbBackend;

/// Where a rollup source lives and how one row contributes to a count.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SourceSpec {
    pub table: &'static str,
    /// `SUM(data_count)` for counter rows, `COUNT(*)` for per-row sources.
    pub count_expr: &'static str,
    pub type_code: Option<i32>,
    pub with_autofill: Option<bool>,
    pub has_amount: bool,
}

impl SourceSpec {
    fn counter(table: &'static str, type_code: i32) -> Self {
        Self {
            table,
            count_expr: "SUM(data_count)",
            type_code: Some(type_code),
            with_autofill: None,
            has_amount: false,
        }
    }

    fn revenue(table: &'static str) -> Self {
        Self {
            table,
            count_expr: "COUNT(*)",
            type_code: None,
            with_autofill: None,
            has_amount: true,
        }
    }
}

pub(crate) fn source_spec(db: &DuckDbBackend, source: RollupSource) -> Result<SourceSpec> {
    Ok(match source {
        RollupSource::PopupShows => SourceSpec::counter("popup_data", db.require_type(POPUP_SHOW)?),
        RollupSource::PopupClicks => {
            SourceSpec::counter("popup_data", db.require_type(POPUP_CLICK)?)
        }
        RollupSource::PopupPurchases | RollupSource::PopupRevenue => {
            SourceSpec::revenue("popup_revenue")
        }
        RollupSource::RecommendationShows => {
            SourceSpec::counter("recommendation_data", db.require_type(RECOMMENDATION_SHOW)?)
        }
        RollupSource::RecommendationClicks => {
            SourceSpec::counter("recommendation_data", db.require_type(RECOMMENDATION_CLICK)?)
        }
        RollupSource::RecommendationPurchases | RollupSource::RecommendationRevenue => {
            SourceSpec::revenue("recommendation_revenue")
        }
        RollupSource::Registrations { with_autofill } => SourceSpec {
            table: "registered_customers",
            count_expr: "COUNT(*)",
            type_code: None,
            with_autofill: Some(with_autofill),
            has_amount: false,
        },
    })
}

/// SQL expression turning `created_at` into the bucket key.
pub(crate) fn bucket_expr(group_type: GroupType) -> &'static str {
    match group_type {
        GroupType::Hour => "strftime(created_at, '%H:%M:%S')",
        GroupType::Day => "strftime(created_at, '%Y-%m-%d')",
        GroupType::Month => "strftime(date_trunc('month', created_at), '%Y-%m-%d')",
        GroupType::Year => "strftime(date_trunc('year', created_at), '%Y-%m-%d')",
    }
}

/// Shop and inclusive calendar-date range as a WHERE fragment. `first_idx`
/// is the number of the first positional parameter it may use.
pub(crate) fn range_filter(
    shop_id: i64,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    first_idx: usize,
) -> (String, Vec<Box<dyn duckdb::types::ToSql>>) {
    let mut param_idx = first_idx;
    let mut filter_sql = format!("shop_id = ?{param_idx}");
    let mut params: Vec<Box<dyn duckdb::types::ToSql>> = vec![Box::new(shop_id)];
    param_idx += 1;

    if let Some(start) = start_date {
        filter_sql.push_str(&format!(" AND created_at >= ?{param_idx}"));
        params.push(Box::new(start.format("%Y-%m-%d").to_string()));
        param_idx += 1;
    }
    if let Some(end) = end_date {
        let end_next = end + chrono::Duration::days(1);
        filter_sql.push_str(&format!(" AND created_at < ?{param_idx}"));
        params.push(Box::new(end_next.format("%Y-%m-%d").to_string()));
    }
    (filter_sql, params)
}

fn source_filter(
    spec: &SourceSpec,
    filter: &RollupFilter,
) -> (String, Vec<Box<dyn duckdb::types::ToSql>>) {
    let (mut filter_sql, mut params) =
        range_filter(filter.shop_id, filter.start_date, filter.end_date, 1);
    if let Some(code) = spec.type_code {
        filter_sql.push_str(&format!(" AND type = ?{}", params.len() + 1));
        params.push(Box::new(code));
    }
    if let Some(with_autofill) = spec.with_autofill {
        filter_sql.push_str(&format!(" AND with_autofill = ?{}", params.len() + 1));
        params.push(Box::new(with_autofill));
    }
    (filter_sql, params)
}

fn bucketed_sql(spec: &SourceSpec, measure: &str, group_type: GroupType, filter_sql: &str) -> String {
    let bucket = bucket_expr(group_type);
    format!(
        r#"
        SELECT
            {bucket} AS bucket,
            {measure} AS value
        FROM {table}
        WHERE {filter_sql}
        GROUP BY bucket
        ORDER BY bucket
        "#,
        table = spec.table,
    )
}

pub(crate) async fn bucketed_count_inner(
    db: &DuckDbBackend,
    filter: &RollupFilter,
    source: RollupSource,
) -> Result<Vec<BucketCount>> {
    let spec = source_spec(db, source)?;
    let conn = db.conn.lock().await;

    let (filter_sql, params) = source_filter(&spec, filter);
    let measure = format!("CAST(COALESCE({}, 0) AS BIGINT)", spec.count_expr);
    let sql = bucketed_sql(&spec, &measure, filter.group_type, &filter_sql);
    let param_refs: Vec<&dyn duckdb::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(param_refs.as_slice(), |row| {
        Ok(BucketCount {
            date: row.get(0)?,
            count: row.get(1)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub(crate) async fn bucketed_sum_inner(
    db: &DuckDbBackend,
    filter: &RollupFilter,
    source: RollupSource,
) -> Result<Vec<BucketSum>> {
    let spec = source_spec(db, source)?;
    if !spec.has_amount {
        bail!("rollup source {source:?} has no amount column");
    }
    let conn = db.conn.lock().await;

    let (filter_sql, params) = source_filter(&spec, filter);
    let sql = bucketed_sql(
        &spec,
        "CAST(COALESCE(SUM(amount), 0) AS DOUBLE)",
        filter.group_type,
        &filter_sql,
    );
    let param_refs: Vec<&dyn duckdb::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(param_refs.as_slice(), |row| {
        Ok(BucketSum {
            date: row.get(0)?,
            sum_amount: row.get(1)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}
