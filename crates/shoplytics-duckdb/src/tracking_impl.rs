use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use shoplytics_core::event::{MergeOutcome, NewTrackEvent, TrackSession};
use shoplytics_core::rollup::{
    BucketCount, BucketSum, ItemSource, RollupFilter, RollupSource, TimeSpent, TopItem,
};
use shoplytics_core::tracking::{LastActionQuery, PopularProductQuery, TrackingBackend};

use crate::DuckDbBackend;

#[async_trait]
impl TrackingBackend for DuckDbBackend {
    async fn upsert_session(
        &self,
        customer_id: i64,
        shop_id: i64,
        session_token: &str,
    ) -> anyhow::Result<TrackSession> {
        crate::session::upsert_session_inner(
            self,
            customer_id,
            shop_id,
            session_token,
            Utc::now().naive_utc(),
        )
        .await
    }

    async fn merge_sessions(
        &self,
        master_token: &str,
        slave_token: &str,
    ) -> anyhow::Result<MergeOutcome> {
        crate::session::merge_sessions_inner(self, master_token, slave_token, Utc::now().naive_utc())
            .await
    }

    async fn record_event(&self, event: NewTrackEvent) -> anyhow::Result<i64> {
        crate::derivation::record_event_inner(self, event, Utc::now().naive_utc()).await
    }

    async fn last_action_by_type(&self, query: &LastActionQuery) -> anyhow::Result<Option<Value>> {
        crate::lookup::last_action_by_type_inner(self, query).await
    }

    async fn last_session_most_popular_product(
        &self,
        query: &PopularProductQuery,
    ) -> anyhow::Result<Option<Value>> {
        crate::lookup::last_session_most_popular_product_inner(self, query).await
    }

    async fn session_payloads_by_type(
        &self,
        customer_id: i64,
        shop_id: i64,
        session_token: &str,
        event_type: i32,
    ) -> anyhow::Result<Vec<Value>> {
        crate::lookup::session_payloads_by_type_inner(
            self,
            customer_id,
            shop_id,
            session_token,
            event_type,
        )
        .await
    }

    async fn analytic_data_by_type(
        &self,
        shop_id: i64,
        event_type: i32,
    ) -> anyhow::Result<Vec<Value>> {
        crate::lookup::analytic_data_by_type_inner(self, shop_id, event_type).await
    }

    async fn bucketed_count(
        &self,
        filter: &RollupFilter,
        source: RollupSource,
    ) -> anyhow::Result<Vec<BucketCount>> {
        crate::queries::rollup::bucketed_count_inner(self, filter, source).await
    }

    async fn bucketed_sum(
        &self,
        filter: &RollupFilter,
        source: RollupSource,
    ) -> anyhow::Result<Vec<BucketSum>> {
        crate::queries::rollup::bucketed_sum_inner(self, filter, source).await
    }

    async fn top_items(
        &self,
        filter: &RollupFilter,
        source: ItemSource,
        limit: usize,
    ) -> anyhow::Result<Vec<TopItem>> {
        crate::queries::top_items::top_items_inner(self, filter, source, limit).await
    }

    async fn registered_time_spent(&self, filter: &RollupFilter) -> anyhow::Result<TimeSpent> {
        crate::queries::registered::registered_time_spent_inner(self, filter).await
    }
}
