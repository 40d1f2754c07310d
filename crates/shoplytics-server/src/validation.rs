//! Request body validation.
//!
//! Handlers deserialize the JSON object into a typed request struct whose
//! fields stay raw (`Option<Value>`) so that a wrong type becomes a field
//! message instead of a rejected body. [`FieldChecks`] then converts each
//! field, collecting every problem under its snake_case name so a single
//! 400 response reports all of them at once.

use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::Json;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use shoplytics_core::event_types::EventTypes;
use shoplytics_core::rollup::{GroupType, RollupFilter};

use crate::error::AppError;

pub type FieldErrors = BTreeMap<String, Vec<String>>;

const REQUIRED: &str = "This field is required.";
const NOT_NULL: &str = "This field may not be null.";
const NOT_BLANK: &str = "This field may not be blank.";
const INVALID_INT: &str = "A valid integer is required.";
const INVALID_STRING: &str = "Not a valid string.";
const INVALID_URL: &str = "Enter a valid URL.";
const INVALID_DATE: &str = "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.";

const TOKEN_MAX_LEN: usize = 32;
const URL_MAX_LEN: usize = 255;

/// Keep an explicit `null` as `Some(Value::Null)`; a missing key stays `None`
/// through `#[serde(default)]`.
pub fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Read the body as a JSON object and deserialize it into `T`.
pub fn parse_body<T: DeserializeOwned>(
    body: Result<Json<Value>, JsonRejection>,
) -> Result<T, AppError> {
    let Json(value) = body?;
    if !value.is_object() {
        return Err(AppError::MalformedBody(format!(
            "Invalid data. Expected a dictionary, but got {}.",
            json_kind(&value)
        )));
    }
    serde_json::from_value(value).map_err(|e| AppError::MalformedBody(e.to_string()))
}

/// Collected field errors for one request.
///
/// Checks on required fields return a zero value after recording an error;
/// [`FieldChecks::finish`] then fails, so those placeholders never reach
/// the backend.
#[derive(Debug, Default)]
pub struct FieldChecks {
    errors: FieldErrors,
}

impl FieldChecks {
    fn error(&mut self, name: &str, message: impl Into<String>) {
        self.errors
            .entry(name.to_string())
            .or_default()
            .push(message.into());
    }

    fn int_value(value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn int(&mut self, name: &str, raw: Option<Value>, required: bool, min: i64) -> Option<i64> {
        let parsed = match raw {
            None if required => Err(REQUIRED.to_string()),
            None => return None,
            Some(Value::Null) if required => Err(NOT_NULL.to_string()),
            Some(Value::Null) => return None,
            Some(value) => match Self::int_value(&value) {
                None => Err(INVALID_INT.to_string()),
                Some(n) if n < min => {
                    Err(format!("Ensure this value is greater than or equal to {min}."))
                }
                Some(n) => Ok(n),
            },
        };
        match parsed {
            Ok(n) => Some(n),
            Err(message) => {
                self.error(name, message);
                None
            }
        }
    }

    /// Positive integer identifier such as `customer_id` or `shop_id`.
    pub fn id(&mut self, name: &str, raw: Option<Value>) -> i64 {
        self.int(name, raw, true, 1).unwrap_or(0)
    }

    /// Event type code: a non-negative integer present in the type table.
    pub fn event_type(&mut self, name: &str, raw: Option<Value>, types: &EventTypes) -> i32 {
        let code = self.int(name, raw, true, 0);
        self.checked_type(name, code, types).unwrap_or(0)
    }

    pub fn optional_event_type(
        &mut self,
        name: &str,
        raw: Option<Value>,
        types: &EventTypes,
    ) -> Option<i32> {
        let code = self.int(name, raw, false, 0);
        self.checked_type(name, code, types)
    }

    fn checked_type(&mut self, name: &str, code: Option<i64>, types: &EventTypes) -> Option<i32> {
        let code = code?;
        match i32::try_from(code).ok().filter(|c| types.is_known(*c)) {
            Some(code) => Some(code),
            None => {
                self.error(name, format!("\"{code}\" is not a known event type."));
                None
            }
        }
    }

    fn string(
        &mut self,
        name: &str,
        raw: Option<Value>,
        required: bool,
        max_len: Option<usize>,
    ) -> Option<String> {
        let parsed = match raw {
            None if required => Err(REQUIRED.to_string()),
            None => return None,
            Some(Value::Null) if required => Err(NOT_NULL.to_string()),
            Some(Value::Null) => return None,
            Some(Value::String(s)) => Ok(s.trim().to_string()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(_) => Err(INVALID_STRING.to_string()),
        };
        let checked = parsed.and_then(|s| match max_len {
            _ if s.is_empty() => Err(NOT_BLANK.to_string()),
            Some(max) if s.chars().count() > max => Err(format!(
                "Ensure this field has no more than {max} characters."
            )),
            _ => Ok(s),
        });
        match checked {
            Ok(s) => Some(s),
            Err(message) => {
                self.error(name, message);
                None
            }
        }
    }

    /// Client session token (or client uuid), at most 32 characters.
    /// Integers are accepted and used as their decimal text.
    pub fn token(&mut self, name: &str, raw: Option<Value>) -> String {
        self.string(name, raw, true, Some(TOKEN_MAX_LEN))
            .unwrap_or_default()
    }

    pub fn optional_token(&mut self, name: &str, raw: Option<Value>) -> Option<String> {
        self.string(name, raw, false, Some(TOKEN_MAX_LEN))
    }

    pub fn optional_string(&mut self, name: &str, raw: Option<Value>) -> Option<String> {
        self.string(name, raw, false, None)
    }

    /// Absolute http(s) URL; blank and `null` mean "no URL".
    pub fn optional_url(&mut self, name: &str, raw: Option<Value>) -> Option<String> {
        if matches!(&raw, Some(Value::String(s)) if s.trim().is_empty()) {
            return None;
        }
        let url = self.string(name, raw, false, Some(URL_MAX_LEN))?;
        match url::Url::parse(&url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => {
                Some(url)
            }
            _ => {
                self.error(name, INVALID_URL);
                None
            }
        }
    }

    /// Arbitrary JSON document; only presence is checked.
    pub fn json(&mut self, name: &str, raw: Option<Value>) -> Value {
        raw.unwrap_or_else(|| {
            self.error(name, REQUIRED);
            Value::Null
        })
    }

    pub fn optional_date(&mut self, name: &str, raw: Option<Value>) -> Option<NaiveDate> {
        let parsed = match raw {
            None | Some(Value::Null) => return None,
            Some(Value::String(s)) if s.trim().is_empty() => return None,
            Some(Value::String(s)) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok(),
            Some(_) => None,
        };
        if parsed.is_none() {
            self.error(name, INVALID_DATE);
        }
        parsed
    }

    /// Fail with every collected field error, if any.
    pub fn finish(self) -> Result<(), AppError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.errors))
        }
    }
}

/// Body shared by every rollup endpoint.
#[derive(Debug, Deserialize)]
pub struct RollupFilterRequest {
    #[serde(default, alias = "shopId", deserialize_with = "present")]
    pub shop_id: Option<Value>,
    #[serde(default, alias = "startDate", deserialize_with = "present")]
    pub start_date: Option<Value>,
    #[serde(default, alias = "endDate", deserialize_with = "present")]
    pub end_date: Option<Value>,
    #[serde(default, alias = "groupType", deserialize_with = "present")]
    pub group_type: Option<Value>,
}

impl RollupFilterRequest {
    /// `shop_id`, optional inclusive `start_date`/`end_date` and
    /// `group_type` (unknown values fall back to month).
    pub fn into_filter(self) -> Result<RollupFilter, AppError> {
        let mut checks = FieldChecks::default();
        let filter = RollupFilter {
            shop_id: checks.id("shop_id", self.shop_id),
            start_date: checks.optional_date("start_date", self.start_date),
            end_date: checks.optional_date("end_date", self.end_date),
            group_type: GroupType::parse(
                checks
                    .optional_string("group_type", self.group_type)
                    .as_deref(),
            ),
        };
        checks.finish()?;
        Ok(filter)
    }
}

/// Parse and validate a rollup filter body in one step.
pub fn rollup_filter(body: Result<Json<Value>, JsonRejection>) -> Result<RollupFilter, AppError> {
    parse_body::<RollupFilterRequest>(body)?.into_filter()
}
