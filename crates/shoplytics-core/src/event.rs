use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A customer's browsing session in one shop.
///
/// Unique on `(customer_id, shop_id, session_token)`; the token is the
/// client-supplied opaque session identifier (max 32 chars).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSession {
    pub id: i64,
    pub customer_id: i64,
    pub shop_id: i64,
    pub session_token: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// A stored tracked action, one row of `track_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackEvent {
    pub id: i64,
    /// NULL only for rows written outside the normal ingestion path.
    pub session_id: Option<i64>,
    pub client_uuid: String,
    pub url: Option<String>,
    pub event_type: i32,
    /// Open document. Unknown keys pass through untouched; only the
    /// derivation step adds `duration` / `view_time` after insert.
    pub payload: serde_json::Value,
    pub created_at: NaiveDateTime,
}

/// Everything `recordEvent` needs from the caller.
#[derive(Debug, Clone)]
pub struct NewTrackEvent {
    pub customer_id: i64,
    pub shop_id: i64,
    pub session_token: String,
    pub client_uuid: String,
    pub url: Option<String>,
    pub event_type: i32,
    pub payload: serde_json::Value,
}

/// Outcome of a merge: how many session rows now carry the master token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    pub sessions_rewritten: usize,
    pub sessions_folded: usize,
    pub markers_deleted: usize,
}
