//! Tracking backend abstraction.
//!
//! The HTTP layer only talks to this trait, so the storage engine can be
//! swapped without touching handlers.

use serde_json::Value;

use crate::event::{MergeOutcome, NewTrackEvent, TrackSession};
use crate::rollup::{
    BucketCount, BucketSum, DualSeries, ItemSource, RollupFilter, RollupSource, TimeSpent, TopItem,
};

/// Inputs of the "last action of type X" lookup.
#[derive(Debug, Clone)]
pub struct LastActionQuery {
    pub customer_id: i64,
    pub shop_id: i64,
    pub event_type: i32,
    pub alt_type: Option<i32>,
    /// The caller's own session; when set, the answer comes from another one.
    pub exclude_session_token: Option<String>,
}

/// Inputs of the "most popular product of the last session" lookup.
#[derive(Debug, Clone)]
pub struct PopularProductQuery {
    pub customer_id: i64,
    pub shop_id: i64,
    pub exclude_session_token: Option<String>,
    /// Compared against `payload.articleID` as text.
    pub exclude_article_id: Option<String>,
}

#[async_trait::async_trait]
pub trait TrackingBackend: Send + Sync + 'static {
    async fn upsert_session(
        &self,
        customer_id: i64,
        shop_id: i64,
        session_token: &str,
    ) -> anyhow::Result<TrackSession>;

    async fn merge_sessions(
        &self,
        master_token: &str,
        slave_token: &str,
    ) -> anyhow::Result<MergeOutcome>;

    /// Store an event after running the derivation rules; returns its id.
    async fn record_event(&self, event: NewTrackEvent) -> anyhow::Result<i64>;

    async fn last_action_by_type(&self, query: &LastActionQuery) -> anyhow::Result<Option<Value>>;

    async fn last_session_most_popular_product(
        &self,
        query: &PopularProductQuery,
    ) -> anyhow::Result<Option<Value>>;

    /// Payloads of one session's events of `event_type`, newest first.
    async fn session_payloads_by_type(
        &self,
        customer_id: i64,
        shop_id: i64,
        session_token: &str,
        event_type: i32,
    ) -> anyhow::Result<Vec<Value>>;

    /// Payloads of every event of `event_type` in the shop, oldest first.
    async fn analytic_data_by_type(&self, shop_id: i64, event_type: i32)
        -> anyhow::Result<Vec<Value>>;

    async fn bucketed_count(
        &self,
        filter: &RollupFilter,
        source: RollupSource,
    ) -> anyhow::Result<Vec<BucketCount>>;

    async fn bucketed_sum(
        &self,
        filter: &RollupFilter,
        source: RollupSource,
    ) -> anyhow::Result<Vec<BucketSum>>;

    async fn dual_series(
        &self,
        filter: &RollupFilter,
        first: RollupSource,
        second: RollupSource,
    ) -> anyhow::Result<DualSeries> {
        Ok(DualSeries {
            first: self.bucketed_count(filter, first).await?,
            second: self.bucketed_count(filter, second).await?,
        })
    }

    async fn top_items(
        &self,
        filter: &RollupFilter,
        source: ItemSource,
        limit: usize,
    ) -> anyhow::Result<Vec<TopItem>>;

    async fn registered_time_spent(&self, filter: &RollupFilter) -> anyhow::Result<TimeSpent>;
}
