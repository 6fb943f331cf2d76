//! Storage capability for telemetry events.
//!
//! The pipeline only requires one write primitive: an atomic conditional
//! insert that skips rows colliding on the `(event_id, tenant_id)` uniqueness
//! key and reports how many rows were actually inserted. Reads are
//! tenant-isolated filtered scans used by the query layer.
//!
//! [`MemoryStore`] is the in-process implementation used by tests and the
//! development configuration; production deployments plug in a backend with
//! the same contract (e.g. `INSERT ... ON CONFLICT DO NOTHING`).

use crate::error::Result;
use crate::types::{EventFilter, StoredEvent};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Durable store for telemetry events.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert all records whose `(event_id, tenant_id)` key is not already
    /// present; silently skip the rest. Returns the number of rows newly
    /// inserted. Atomic per call and safe under concurrent invocation.
    async fn insert_ignore(&self, records: Vec<StoredEvent>) -> Result<usize>;

    /// Fetch events for a tenant matching the filter, newest first.
    async fn query(&self, tenant_id: &str, filter: &EventFilter) -> Result<Vec<StoredEvent>>;

    /// Count events for a tenant matching the filter.
    async fn count(&self, tenant_id: &str, filter: &EventFilter) -> Result<u64>;
}

/// In-memory event store.
///
/// Keyed by `(event_id, tenant_id)` so the uniqueness constraint is the map
/// key itself. A single write lock per call gives the per-call atomicity the
/// conditional insert contract requires.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<HashMap<(String, String), StoredEvent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total rows across all tenants.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn insert_ignore(&self, records: Vec<StoredEvent>) -> Result<usize> {
        let mut rows = self.rows.write();
        let mut inserted = 0;
        for record in records {
            let key = record.dedup_key();
            // A duplicate key inside the same batch also counts as a collision.
            if let std::collections::hash_map::Entry::Vacant(slot) = rows.entry(key) {
                slot.insert(record);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn query(&self, tenant_id: &str, filter: &EventFilter) -> Result<Vec<StoredEvent>> {
        let rows = self.rows.read();
        let mut matched: Vec<StoredEvent> = rows
            .values()
            .filter(|row| row.tenant_id == tenant_id && filter.matches(row))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(matched)
    }

    async fn count(&self, tenant_id: &str, filter: &EventFilter) -> Result<u64> {
        let rows = self.rows.read();
        Ok(rows
            .values()
            .filter(|row| row.tenant_id == tenant_id && filter.matches(row))
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Event, EventType};
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn row(event_id: &str, tenant: &str) -> StoredEvent {
        StoredEvent::from_event(
            Event {
                event_id: event_id.to_string(),
                event_type: EventType::Log,
                service_name: "api-gateway".to_string(),
                timestamp: Utc::now(),
                payload: json!({}),
            },
            tenant,
        )
    }

    #[tokio::test]
    async fn test_insert_ignore_skips_existing_rows() {
        let store = MemoryStore::new();

        let inserted = store.insert_ignore(vec![row("evt_1", "t1")]).await.unwrap();
        assert_eq!(inserted, 1);

        // Same key again: skipped, not an error.
        let inserted = store.insert_ignore(vec![row("evt_1", "t1")]).await.unwrap();
        assert_eq!(inserted, 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_same_event_id_different_tenants() {
        let store = MemoryStore::new();
        let inserted = store
            .insert_ignore(vec![row("evt_1", "t1"), row("evt_1", "t2")])
            .await
            .unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_intra_batch_duplicate_counts_once() {
        let store = MemoryStore::new();
        let inserted = store
            .insert_ignore(vec![row("evt_1", "t1"), row("evt_1", "t1")])
            .await
            .unwrap();
        assert_eq!(inserted, 1);
    }

    #[tokio::test]
    async fn test_query_is_tenant_isolated_and_sorted() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let mut old = row("evt_old", "t1");
        old.timestamp = now - Duration::minutes(10);
        let mut recent = row("evt_recent", "t1");
        recent.timestamp = now;
        let other = row("evt_other", "t2");

        store
            .insert_ignore(vec![old, recent, other])
            .await
            .unwrap();

        let events = store.query("t1", &EventFilter::default()).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_id, "evt_recent");
        assert_eq!(events[1].event_id, "evt_old");
    }

    #[tokio::test]
    async fn test_count_with_filter() {
        let store = MemoryStore::new();
        let mut metric = row("evt_m", "t1");
        metric.event_type = EventType::Metric;
        store
            .insert_ignore(vec![row("evt_l", "t1"), metric])
            .await
            .unwrap();

        let filter = EventFilter {
            event_type: Some(EventType::Metric),
            ..Default::default()
        };
        assert_eq!(store.count("t1", &filter).await.unwrap(), 1);
        assert_eq!(store.count("t1", &EventFilter::default()).await.unwrap(), 2);
    }
}
