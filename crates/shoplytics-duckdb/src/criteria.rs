//! Event filter criteria compiled into a single `track_data` read.
//!
//! Lookups describe what they want as an [`EventCriteria`] value instead of
//! stacking ad-hoc predicates; [`EventCriteria::compile`] turns it into one
//! parameterised statement. The article-id exclusion is matched on the
//! decoded payload after the read, through the typed payload accessors.

use anyhow::Result;
use duckdb::Connection;
use serde_json::Value;

use shoplytics_core::event::TrackEvent;
use shoplytics_core::payload::{self, ARTICLE_ID};

use crate::backend::parse_ts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

#[derive(Debug, Clone, Default)]
pub struct EventCriteria {
    pub customer_id: Option<i64>,
    pub shop_id: Option<i64>,
    /// Surrogate `track_sessions.id`.
    pub session_id: Option<i64>,
    pub session_token: Option<String>,
    pub exclude_session_token: Option<String>,
    /// Any of these codes; empty means every type.
    pub types: Vec<i32>,
    pub exclude_article_id: Option<String>,
    pub order: EventOrder,
    pub limit: Option<usize>,
}

/// SQL text plus its positional parameters.
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Box<dyn duckdb::types::ToSql>>,
}

impl CompiledQuery {
    pub fn param_refs(&self) -> Vec<&dyn duckdb::types::ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }
}

impl EventCriteria {
    pub fn in_shop(shop_id: i64) -> Self {
        Self {
            shop_id: Some(shop_id),
            ..Self::default()
        }
    }

    pub fn in_session(session_id: i64) -> Self {
        Self {
            session_id: Some(session_id),
            ..Self::default()
        }
    }

    pub fn customer(mut self, customer_id: i64) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    pub fn exclude_session_token(mut self, token: Option<String>) -> Self {
        self.exclude_session_token = token;
        self
    }

    pub fn types(mut self, types: impl IntoIterator<Item = i32>) -> Self {
        self.types = types.into_iter().collect();
        self
    }

    pub fn exclude_article_id(mut self, article_id: Option<String>) -> Self {
        self.exclude_article_id = article_id;
        self
    }

    pub fn order(mut self, order: EventOrder) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// `true` when the decoded payload survives the article exclusion.
    /// Payloads without an `articleID` are never excluded.
    pub fn keeps_payload(&self, payload: &Value) -> bool {
        match (&self.exclude_article_id, payload::string_field(payload, ARTICLE_ID)) {
            (Some(excluded), Some(article_id)) => *excluded != article_id,
            _ => true,
        }
    }

    pub fn compile(&self) -> CompiledQuery {
        let mut sql = String::from(
            "SELECT d.id, d.session_id, d.client_uuid, d.url, d.type, d.payload, \
             CAST(d.created_at AS VARCHAR) \
             FROM track_data d \
             JOIN track_sessions s ON s.id = d.session_id \
             WHERE 1 = 1",
        );
        let mut params: Vec<Box<dyn duckdb::types::ToSql>> = Vec::new();
        let mut param_idx = 1;

        let mut push = |clause: &str, param: Box<dyn duckdb::types::ToSql>, sql: &mut String| {
            sql.push_str(&format!(" AND {clause} ?{param_idx}"));
            params.push(param);
            param_idx += 1;
        };

        if let Some(customer_id) = self.customer_id {
            push("s.customer_id =", Box::new(customer_id), &mut sql);
        }
        if let Some(shop_id) = self.shop_id {
            push("s.shop_id =", Box::new(shop_id), &mut sql);
        }
        if let Some(session_id) = self.session_id {
            push("d.session_id =", Box::new(session_id), &mut sql);
        }
        if let Some(ref token) = self.session_token {
            push("s.session_token =", Box::new(token.clone()), &mut sql);
        }
        if let Some(ref token) = self.exclude_session_token {
            push("s.session_token <>", Box::new(token.clone()), &mut sql);
        }
        match self.types.as_slice() {
            [] => {}
            [single] => push("d.type =", Box::new(*single), &mut sql),
            many => {
                // Codes come from the typed table, never from request text.
                let list = many
                    .iter()
                    .map(i32::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                sql.push_str(&format!(" AND d.type IN ({list})"));
            }
        }

        sql.push_str(match self.order {
            EventOrder::NewestFirst => " ORDER BY d.created_at DESC, d.id DESC",
            EventOrder::OldestFirst => " ORDER BY d.created_at ASC, d.id ASC",
        });

        // With a payload predicate the limit is applied after decoding.
        if let (Some(limit), None) = (self.limit, &self.exclude_article_id) {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        CompiledQuery { sql, params }
    }
}

/// Run the criteria against `conn` and decode the matching rows.
pub(crate) fn fetch_events(conn: &Connection, criteria: &EventCriteria) -> Result<Vec<TrackEvent>> {
    let compiled = criteria.compile();
    let mut stmt = conn.prepare(&compiled.sql)?;
    let rows = stmt.query_map(compiled.param_refs().as_slice(), |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, Option<i64>>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, i32>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, String>(6)?,
        ))
    })?;

    let mut events = Vec::new();
    for row in rows {
        let (id, session_id, client_uuid, url, event_type, raw_payload, created_at) = row?;
        let payload = payload::decode(raw_payload.as_deref())?;
        if !criteria.keeps_payload(&payload) {
            continue;
        }
        events.push(TrackEvent {
            id,
            session_id,
            client_uuid,
            url,
            event_type,
            payload,
            created_at: parse_ts(&created_at)?,
        });
        if criteria.limit.is_some_and(|limit| events.len() >= limit) {
            break;
        }
    }
    Ok(events)
}

/// First row of [`fetch_events`] with the limit forced to one.
pub(crate) fn fetch_first(conn: &Connection, criteria: EventCriteria) -> Result<Option<TrackEvent>> {
    Ok(fetch_events(conn, &criteria.limit(1))?.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;
    use shoplytics_core::event::NewTrackEvent;

    use crate::DuckDbBackend;

    #[test]
    fn compile_numbers_params_in_clause_order() {
        let compiled = EventCriteria::in_shop(3)
            .customer(7)
            .exclude_session_token(Some("s1".to_string()))
            .types([1])
            .compile();
        assert!(compiled.sql.contains("s.customer_id = ?1"));
        assert!(compiled.sql.contains("s.shop_id = ?2"));
        assert!(compiled.sql.contains("s.session_token <> ?3"));
        assert!(compiled.sql.contains("d.type = ?4"));
        assert_eq!(compiled.params.len(), 4);
        assert!(compiled.sql.ends_with("ORDER BY d.created_at DESC, d.id DESC"));
    }

    #[test]
    fn compile_inlines_type_sets() {
        let compiled = EventCriteria::in_session(9).types([0, 1, 2]).limit(1).compile();
        assert!(compiled.sql.contains("d.session_id = ?1"));
        assert!(compiled.sql.contains("d.type IN (0, 1, 2)"));
        assert!(compiled.sql.ends_with("LIMIT 1"));
        assert_eq!(compiled.params.len(), 1);
    }

    #[test]
    fn compile_defers_limit_when_filtering_payloads() {
        let compiled = EventCriteria::in_shop(1)
            .exclude_article_id(Some("A1".to_string()))
            .order(EventOrder::OldestFirst)
            .limit(1)
            .compile();
        assert!(!compiled.sql.contains("LIMIT"));
        assert!(compiled.sql.ends_with("ORDER BY d.created_at ASC, d.id ASC"));
    }

    #[test]
    fn keeps_payload_only_drops_matching_article() {
        let criteria = EventCriteria::default().exclude_article_id(Some("42".to_string()));
        assert!(!criteria.keeps_payload(&json!({ "articleID": "42" })));
        assert!(!criteria.keeps_payload(&json!({ "articleID": 42 })));
        assert!(criteria.keeps_payload(&json!({ "articleID": "43" })));
        assert!(criteria.keeps_payload(&json!({ "title": "no article" })));
        assert!(criteria.keeps_payload(&Value::Null));
        assert!(EventCriteria::default().keeps_payload(&json!({ "articleID": "42" })));
    }

    #[tokio::test]
    async fn fetch_events_decodes_full_rows_and_filters_articles() {
        let db = DuckDbBackend::open_in_memory().expect("db");
        let at = NaiveDate::from_ymd_opt(2024, 4, 2)
            .and_then(|d| d.and_hms_opt(9, 30, 0))
            .expect("valid");
        for (article, url) in [("A1", Some("https://shop.example/a1")), ("A2", None)] {
            db.record_event_at(
                NewTrackEvent {
                    customer_id: 1,
                    shop_id: 1,
                    session_token: "s1".to_string(),
                    client_uuid: "client-1".to_string(),
                    url: url.map(str::to_string),
                    event_type: 3,
                    payload: json!({ "articleID": article }),
                },
                at,
            )
            .await
            .expect("record");
        }

        let conn = db.conn.lock().await;
        let events = fetch_events(
            &conn,
            &EventCriteria::in_shop(1)
                .order(EventOrder::OldestFirst)
                .exclude_article_id(Some("A2".to_string())),
        )
        .expect("fetch");
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert!(event.session_id.is_some());
        assert_eq!(event.client_uuid, "client-1");
        assert_eq!(event.url.as_deref(), Some("https://shop.example/a1"));
        assert_eq!(event.event_type, 3);
        assert_eq!(event.payload, json!({ "articleID": "A1" }));
        assert_eq!(event.created_at, at);
    }
}
