//! Filtered reads over stored events.
//!
//! Mirrors the write side's tenant isolation: every query is scoped to one
//! tenant, filtered by time range, event type, and service name, and either
//! paginated newest-first or aggregated into per-key counts.

use crate::error::Result;
use crate::storage::EventStore;
use crate::types::{EventFilter, StoredEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

const DEFAULT_PAGE_SIZE: usize = 100;
const MAX_PAGE_SIZE: usize = 1000;

/// Field to group an aggregation by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    /// Group by producing service.
    Service,
    /// Group by event type.
    Type,
}

/// One page of query results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPage {
    pub data: Vec<StoredEvent>,
    pub pagination: Pagination,
}

/// Pagination metadata accompanying a result page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

/// One aggregation bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupCount {
    pub key: String,
    pub count: u64,
}

/// Aggregated query result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aggregation {
    pub data: Vec<GroupCount>,
    pub total: u64,
}

/// Read-side service over an [`EventStore`].
#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn EventStore>,
}

impl QueryService {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Fetch a page of events for a tenant, newest first.
    ///
    /// `page` is 1-based and clamped to at least 1; `limit` defaults to 100
    /// and is capped at 1000.
    pub async fn query_events(
        &self,
        tenant_id: &str,
        filter: &EventFilter,
        page: Option<usize>,
        limit: Option<usize>,
    ) -> Result<QueryPage> {
        let started = Instant::now();
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

        let total = self.store.count(tenant_id, filter).await?;
        let all = self.store.query(tenant_id, filter).await?;
        // page comes from the query string; saturate rather than overflow on
        // absurd values, which then read as an empty page past the end.
        let offset = (page - 1).saturating_mul(limit);
        let data: Vec<StoredEvent> = all.into_iter().skip(offset).take(limit).collect();

        info!(
            tenant_id,
            page,
            limit,
            total,
            result_count = data.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Events queried"
        );

        let total_pages = total.div_ceil(limit as u64);
        Ok(QueryPage {
            pagination: Pagination {
                page,
                limit,
                total,
                total_pages,
                has_next: (page as u64).saturating_mul(limit as u64) < total,
                has_prev: page > 1,
            },
            data,
        })
    }

    /// Aggregate matching events into per-key counts, largest bucket first.
    pub async fn aggregate_events(
        &self,
        tenant_id: &str,
        filter: &EventFilter,
        group_by: GroupBy,
    ) -> Result<Aggregation> {
        let started = Instant::now();
        let events = self.store.query(tenant_id, filter).await?;

        let mut counts: HashMap<String, u64> = HashMap::new();
        for event in &events {
            let key = match group_by {
                GroupBy::Service => event.service_name.clone(),
                GroupBy::Type => event.event_type.to_string(),
            };
            *counts.entry(key).or_insert(0) += 1;
        }

        let mut data: Vec<GroupCount> = counts
            .into_iter()
            .map(|(key, count)| GroupCount { key, count })
            .collect();
        data.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
        let total = data.iter().map(|g| g.count).sum();

        info!(
            tenant_id,
            group_by = ?group_by,
            result_count = data.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Events aggregated"
        );

        Ok(Aggregation { data, total })
    }
}
