//! Common test utilities for integration tests.

use axum::Router;
use chrono::Utc;
use granary::config::{GranaryConfig, IngestConfig, RateLimitConfig};
use granary::gateway::{router, AppState};
use granary::storage::MemoryStore;
use granary::types::{Event, EventType};
use serde_json::json;
use std::sync::Arc;

/// Build a submitted event with a deterministic id.
pub fn make_event(id: &str) -> Event {
    Event {
        event_id: id.to_string(),
        event_type: EventType::Log,
        service_name: "api-gateway".to_string(),
        timestamp: Utc::now(),
        payload: json!({"level": "info", "message": "test"}),
    }
}

/// Build `count` distinct events `evt_0 .. evt_{count-1}`.
pub fn make_events(count: usize) -> Vec<Event> {
    (0..count).map(|i| make_event(&format!("evt_{i}"))).collect()
}

/// JSON body for one event, in the wire format clients send.
pub fn event_json(id: &str) -> serde_json::Value {
    json!({
        "eventId": id,
        "eventType": "log",
        "serviceName": "api-gateway",
        "timestamp": "2026-01-21T12:00:00Z",
        "payload": {"level": "info"}
    })
}

/// Gateway test fixture: two tenants, an adjustable budget, in-memory store.
pub struct TestGateway {
    pub store: Arc<MemoryStore>,
    pub state: AppState,
}

impl TestGateway {
    pub fn new(max_requests: u32) -> Self {
        let mut config = GranaryConfig::development();
        config.auth.api_keys = "key-acme:acme,key-globex:globex".to_string();
        config.rate_limit = RateLimitConfig {
            window_ms: 60_000,
            max_requests,
            sweep_interval_ms: 60_000,
        };
        config.ingest = IngestConfig { batch_size: 100 };

        let store = Arc::new(MemoryStore::new());
        let state = AppState::from_config(&config, store.clone()).expect("valid test config");
        Self { store, state }
    }

    pub fn router(&self) -> Router {
        router(self.state.clone())
    }
}
