//! Rollup vocabulary: bucket granularity, date filters, result rows.

use chrono::NaiveDate;
use serde::Serialize;

/// Calendar truncation used to group rollup rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupType {
    /// Time of day (`HH:MM:SS`). The date is dropped, so the same clock time
    /// on different days lands in one bucket.
    Hour,
    Day,
    #[default]
    Month,
    Year,
}

impl GroupType {
    /// Unspecified or unrecognised values fall back to `Month`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("hour") => Self::Hour,
            Some("day") => Self::Day,
            Some("year") => Self::Year,
            _ => Self::Month,
        }
    }
}

/// Shop plus optional inclusive calendar-date range and bucket size.
#[derive(Debug, Clone, Default)]
pub struct RollupFilter {
    pub shop_id: i64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub group_type: GroupType,
}

impl RollupFilter {
    pub fn new(shop_id: i64) -> Self {
        Self {
            shop_id,
            ..Self::default()
        }
    }
}

/// Row sets the rollup engine can bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollupSource {
    PopupShows,
    PopupClicks,
    PopupPurchases,
    PopupRevenue,
    RecommendationShows,
    RecommendationClicks,
    RecommendationPurchases,
    RecommendationRevenue,
    Registrations { with_autofill: bool },
}

/// Which revenue stream the top-items ranking reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemSource {
    Popup,
    Recommendation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketCount {
    pub date: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketSum {
    pub date: String,
    #[serde(rename = "sumAmount")]
    pub sum_amount: f64,
}

/// Two independently bucketed series over the same filter. Buckets are not
/// aligned: each side holds only the buckets present in its own source.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DualSeries {
    pub first: Vec<BucketCount>,
    pub second: Vec<BucketCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopItem {
    pub name: String,
    pub count_popup: i64,
    pub count_purchases: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TimeSpent {
    pub time_with_autofill: i64,
    pub time_without_autofill: i64,
}

pub const DEFAULT_TOP_ITEMS_LIMIT: usize = 10;

const SIZE_VARIANTS: &[&str] = &[
    "XS", "S", "M", "L", "XL", "XXL", "XS/S", "S/M", "M/L", "L/XL", "XL/XXL",
];

/// Drop a trailing size token (`"Shirt XL"` → `"Shirt"`).
pub fn strip_size_variant(title: &str) -> String {
    let title = title.trim_end();
    let is_variant = title
        .split_whitespace()
        .last()
        .map(|last| last.to_ascii_uppercase())
        .is_some_and(|last| SIZE_VARIANTS.contains(&last.as_str()));
    match (is_variant, title.rsplit_once(' ')) {
        (true, Some((head, _))) => head.to_string(),
        _ => title.to_string(),
    }
}

/// Build one top-items row. Purchases are floored at the popup quantity so
/// the dashboard never shows fewer purchases than popup-attributed sales.
pub fn top_item(title: Option<&str>, article_id: &str, popup_qty: i64, purchase_qty: i64) -> TopItem {
    TopItem {
        name: strip_size_variant(title.unwrap_or(article_id)),
        count_popup: popup_qty,
        count_purchases: purchase_qty.max(popup_qty),
    }
}

/// Mean after discarding values above twice the first-pass mean, rounded.
/// Empty input (or an all-zero mean) yields 0.
pub fn trimmed_average(values: &[f64]) -> i64 {
    fn mean(values: &[f64]) -> Option<f64> {
        (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
    }

    let Some(first) = mean(values) else {
        return 0;
    };
    if first == 0.0 {
        return 0;
    }
    let kept: Vec<f64> = values.iter().copied().filter(|v| *v <= 2.0 * first).collect();
    mean(&kept).map(|avg| avg.round() as i64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_type_defaults_to_month() {
        assert_eq!(GroupType::parse(None), GroupType::Month);
        assert_eq!(GroupType::parse(Some("week")), GroupType::Month);
        assert_eq!(GroupType::parse(Some("hour")), GroupType::Hour);
        assert_eq!(GroupType::parse(Some("day")), GroupType::Day);
        assert_eq!(GroupType::parse(Some("year")), GroupType::Year);
    }

    #[test]
    fn strip_size_variant_removes_known_tokens() {
        assert_eq!(strip_size_variant("Linen Shirt XL"), "Linen Shirt");
        assert_eq!(strip_size_variant("Linen Shirt m/l"), "Linen Shirt");
        assert_eq!(strip_size_variant("Linen Shirt XL "), "Linen Shirt");
        assert_eq!(strip_size_variant("Linen Shirt"), "Linen Shirt");
        assert_eq!(strip_size_variant("Mug 3XL"), "Mug 3XL");
        assert_eq!(strip_size_variant("XL"), "XL");
        assert_eq!(strip_size_variant(""), "");
    }

    #[test]
    fn top_item_floors_purchases_at_popup_quantity() {
        let item = top_item(Some("Sneaker M"), "A1", 5, 3);
        assert_eq!(item.name, "Sneaker");
        assert_eq!(item.count_popup, 5);
        assert_eq!(item.count_purchases, 5);

        let item = top_item(None, "A2", 2, 9);
        assert_eq!(item.name, "A2");
        assert_eq!(item.count_purchases, 9);
    }

    #[test]
    fn trimmed_average_drops_outliers() {
        // mean 40 → cut at 80 drops 130 → mean of 10, 10, 10 = 10
        assert_eq!(trimmed_average(&[10.0, 10.0, 10.0, 130.0]), 10);
        assert_eq!(trimmed_average(&[3.0, 4.0]), 4);
        assert_eq!(trimmed_average(&[]), 0);
        assert_eq!(trimmed_average(&[0.0, 0.0]), 0);
    }
}
