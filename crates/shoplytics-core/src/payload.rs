//! Typed access to the schemaless event payload.
//!
//! Payloads are kept as `serde_json::Value` end to end. Derivation and
//! ranking read them only through these helpers, so the accepted shapes
//! (numbers vs numeric strings, `null` vs missing object) live in one place.

use chrono::NaiveDateTime;
use serde_json::{Map, Value};

use crate::error::CoreError;

/// Seconds between a `sign` event and the following `register`.
pub const DURATION: &str = "duration";
/// Dwell time backfilled onto a page-like event when the next one arrives.
pub const VIEW_TIME: &str = "view_time";
pub const ARTICLE_ID: &str = "articleID";

pub fn has_field(payload: &Value, key: &str) -> bool {
    payload.as_object().is_some_and(|obj| obj.contains_key(key))
}

/// Numeric value of `key`, accepting JSON numbers and numeric strings.
pub fn numeric_field(payload: &Value, key: &str) -> Option<f64> {
    let value = match payload.get(key)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

/// Text value of `key`; numbers are rendered the way JSON prints them.
pub fn string_field(payload: &Value, key: &str) -> Option<String> {
    match payload.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Set `key` on the payload. A `null` payload becomes an object; any other
/// non-object payload is left untouched and `false` is returned.
pub fn with_field(payload: &mut Value, key: &str, value: impl Into<Value>) -> bool {
    if payload.is_null() {
        *payload = Value::Object(Map::new());
    }
    match payload.as_object_mut() {
        Some(obj) => {
            obj.insert(key.to_string(), value.into());
            true
        }
        None => false,
    }
}

/// Whole seconds from `then` to `now`, rounded to the nearest second.
pub fn elapsed_seconds(now: NaiveDateTime, then: NaiveDateTime) -> i64 {
    let millis = (now - then).num_milliseconds();
    (millis as f64 / 1000.0).round() as i64
}

/// Decode a stored payload column. SQL NULL maps to JSON `null`.
pub fn decode(raw: Option<&str>) -> Result<Value, CoreError> {
    match raw {
        Some(text) => Ok(serde_json::from_str(text)?),
        None => Ok(Value::Null),
    }
}

pub fn encode(payload: &Value) -> Result<String, CoreError> {
    Ok(serde_json::to_string(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn at(h: u32, m: u32, s: u32, ms: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_milli_opt(h, m, s, ms))
            .expect("valid timestamp")
    }

    #[test]
    fn numeric_field_accepts_numbers_and_numeric_strings() {
        let payload = json!({ "a": 12, "b": "7.5", "c": "soon", "d": null, "e": 1.25 });
        assert_eq!(numeric_field(&payload, "a"), Some(12.0));
        assert_eq!(numeric_field(&payload, "b"), Some(7.5));
        assert_eq!(numeric_field(&payload, "c"), None);
        assert_eq!(numeric_field(&payload, "d"), None);
        assert_eq!(numeric_field(&payload, "e"), Some(1.25));
        assert_eq!(numeric_field(&payload, "missing"), None);
        assert_eq!(numeric_field(&json!([1, 2]), "a"), None);
    }

    #[test]
    fn string_field_renders_numbers() {
        let payload = json!({ "articleID": 1042, "title": "Shirt", "flag": true });
        assert_eq!(string_field(&payload, "articleID").as_deref(), Some("1042"));
        assert_eq!(string_field(&payload, "title").as_deref(), Some("Shirt"));
        assert_eq!(string_field(&payload, "flag"), None);
    }

    #[test]
    fn has_field_counts_explicit_null() {
        let payload = json!({ "view_time": null });
        assert!(has_field(&payload, VIEW_TIME));
        assert!(!has_field(&Value::Null, VIEW_TIME));
    }

    #[test]
    fn with_field_promotes_null_and_keeps_other_keys() {
        let mut payload = json!({ "articleID": "A1" });
        assert!(with_field(&mut payload, DURATION, 4));
        assert_eq!(payload, json!({ "articleID": "A1", "duration": 4 }));

        let mut empty = Value::Null;
        assert!(with_field(&mut empty, VIEW_TIME, 9));
        assert_eq!(empty, json!({ "view_time": 9 }));

        let mut list = json!(["x"]);
        assert!(!with_field(&mut list, VIEW_TIME, 9));
        assert_eq!(list, json!(["x"]));
    }

    #[test]
    fn elapsed_seconds_rounds_to_nearest() {
        assert_eq!(elapsed_seconds(at(10, 0, 5, 499), at(10, 0, 0, 0)), 5);
        assert_eq!(elapsed_seconds(at(10, 0, 5, 500), at(10, 0, 0, 0)), 6);
        assert_eq!(elapsed_seconds(at(10, 1, 0, 0), at(10, 0, 0, 0)), 60);
    }

    #[test]
    fn decode_maps_sql_null_to_json_null() {
        assert_eq!(decode(None).expect("decode"), Value::Null);
        assert_eq!(
            decode(Some(r#"{"a":1}"#)).expect("decode"),
            json!({ "a": 1 })
        );
        assert!(decode(Some("{broken")).is_err());
    }
}
