//! Core types shared across the Granary service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of telemetry event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Structured log line.
    Log,
    /// Metric sample.
    Metric,
    /// Trace span.
    Trace,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Log => "log",
            EventType::Metric => "metric",
            EventType::Trace => "trace",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A telemetry event as submitted by a client.
///
/// The tenant is not part of the submitted body; it is resolved from the
/// client's API key before the event reaches the ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Client-chosen identifier, unique per tenant. This is the idempotency key.
    pub event_id: String,
    /// Kind of telemetry.
    pub event_type: EventType,
    /// Service that produced the event.
    pub service_name: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Opaque structured payload.
    pub payload: serde_json::Value,
}

/// A durably stored telemetry row.
///
/// Rows are unique on `(event_id, tenant_id)`; everything else is carried
/// verbatim from the submitted [`Event`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEvent {
    /// Storage-assigned row id.
    pub id: Uuid,
    /// Idempotency key, client-chosen.
    pub event_id: String,
    /// Owning tenant.
    pub tenant_id: String,
    pub event_type: EventType,
    pub service_name: String,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
    /// When the row was committed.
    pub created_at: DateTime<Utc>,
}

impl StoredEvent {
    /// Build a storage row from a submitted event.
    pub fn from_event(event: Event, tenant_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id: event.event_id,
            tenant_id: tenant_id.into(),
            event_type: event.event_type,
            service_name: event.service_name,
            timestamp: event.timestamp,
            payload: event.payload,
            created_at: Utc::now(),
        }
    }

    /// The uniqueness key arbitrating duplicate submissions.
    pub fn dedup_key(&self) -> (String, String) {
        (self.event_id.clone(), self.tenant_id.clone())
    }
}

/// Aggregate outcome of one ingestion call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    /// Rows newly committed by this call.
    pub ingested: u64,
    /// Submissions skipped because the row already existed.
    pub duplicates: u64,
}

impl IngestSummary {
    /// Total events submitted in the call.
    pub fn submitted(&self) -> u64 {
        self.ingested + self.duplicates
    }

    /// Merge the outcome of one batch into the running total.
    pub fn absorb(&mut self, other: IngestSummary) {
        self.ingested += other.ingested;
        self.duplicates += other.duplicates;
    }
}

/// Filter for querying stored events. All fields are optional and combined
/// with AND semantics; tenant isolation is enforced by the store, not here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    /// Inclusive lower bound on event timestamp.
    pub start_time: Option<DateTime<Utc>>,
    /// Inclusive upper bound on event timestamp.
    pub end_time: Option<DateTime<Utc>>,
    /// Restrict to one event type.
    pub event_type: Option<EventType>,
    /// Restrict to one producing service.
    pub service_name: Option<String>,
}

impl EventFilter {
    /// Check whether a stored row passes the filter.
    pub fn matches(&self, event: &StoredEvent) -> bool {
        if let Some(start) = self.start_time {
            if event.timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end_time {
            if event.timestamp > end {
                return false;
            }
        }
        if let Some(kind) = self.event_type {
            if event.event_type != kind {
                return false;
            }
        }
        if let Some(ref service) = self.service_name {
            if &event.service_name != service {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_event(id: &str) -> Event {
        Event {
            event_id: id.to_string(),
            event_type: EventType::Log,
            service_name: "api-gateway".to_string(),
            timestamp: Utc::now(),
            payload: json!({"level": "info", "message": "User logged in"}),
        }
    }

    #[test]
    fn test_event_type_serde() {
        assert_eq!(serde_json::to_string(&EventType::Log).unwrap(), "\"log\"");
        assert_eq!(
            serde_json::from_str::<EventType>("\"metric\"").unwrap(),
            EventType::Metric
        );
    }

    #[test]
    fn test_event_camel_case_wire_format() {
        let parsed: Event = serde_json::from_value(json!({
            "eventId": "evt_1234567890",
            "eventType": "trace",
            "serviceName": "payment-service",
            "timestamp": "2026-01-21T12:00:00Z",
            "payload": {"spanId": "abc"}
        }))
        .unwrap();
        assert_eq!(parsed.event_id, "evt_1234567890");
        assert_eq!(parsed.event_type, EventType::Trace);
        assert_eq!(parsed.service_name, "payment-service");
    }

    #[test]
    fn test_stored_event_from_event() {
        let row = StoredEvent::from_event(sample_event("evt_1"), "tenant-a");
        assert_eq!(row.event_id, "evt_1");
        assert_eq!(row.tenant_id, "tenant-a");
        assert_eq!(row.dedup_key(), ("evt_1".to_string(), "tenant-a".to_string()));
    }

    #[test]
    fn test_summary_absorb() {
        let mut total = IngestSummary::default();
        total.absorb(IngestSummary {
            ingested: 90,
            duplicates: 10,
        });
        total.absorb(IngestSummary {
            ingested: 50,
            duplicates: 0,
        });
        assert_eq!(total.ingested, 140);
        assert_eq!(total.duplicates, 10);
        assert_eq!(total.submitted(), 150);
    }

    #[test]
    fn test_filter_matches() {
        let row = StoredEvent::from_event(sample_event("evt_1"), "tenant-a");

        assert!(EventFilter::default().matches(&row));

        let by_type = EventFilter {
            event_type: Some(EventType::Metric),
            ..Default::default()
        };
        assert!(!by_type.matches(&row));

        let by_service = EventFilter {
            service_name: Some("api-gateway".to_string()),
            ..Default::default()
        };
        assert!(by_service.matches(&row));

        let out_of_range = EventFilter {
            end_time: Some(row.timestamp - chrono::Duration::seconds(1)),
            ..Default::default()
        };
        assert!(!out_of_range.matches(&row));
    }
}
