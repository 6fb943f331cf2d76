//! Granary - a multi-tenant telemetry ingestion service.
//!
//! Granary accepts telemetry events (logs, metrics, traces) from multiple
//! tenants and stores them durably with exactly-once semantics per
//! `(event_id, tenant_id)`, while protecting the backing store from overload
//! with per-tenant admission control.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Granary                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Gateway: API-key auth | rate-limit headers | JSON routes   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Admission: per-tenant fixed windows | background sweep     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Ingestion: ordered batches | conditional insert | counts   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Storage: unique on (event_id, tenant_id) | filtered reads  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A request flows gateway → admission (allow/deny) → ingestion → storage;
//! duplicate submissions are absorbed by the store's uniqueness key and
//! reported back as `duplicates`, never as errors, which is what makes
//! client-level retries safe.
//!
//! # Quick Start
//!
//! ```no_run
//! use granary::config::GranaryConfig;
//! use granary::storage::MemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> granary::Result<()> {
//!     let config = GranaryConfig::development();
//!     granary::run(config, Arc::new(MemoryStore::new())).await
//! }
//! ```

pub mod config;
pub mod error;
pub mod types;

pub mod admission;
pub mod gateway;
pub mod ingest;
pub mod query;
pub mod storage;
pub mod tenant;

pub use admission::{AdmissionController, Decision, SweeperHandle};
pub use config::GranaryConfig;
pub use error::{GranaryError, Result};
pub use ingest::{IngestPipeline, IngestReport};
pub use query::QueryService;
pub use storage::{EventStore, MemoryStore};
pub use tenant::TenantRegistry;
pub use types::{Event, EventFilter, EventType, IngestSummary, StoredEvent};

use std::sync::Arc;

/// Run the Granary gateway with the given configuration and storage backend.
pub async fn run(config: GranaryConfig, store: Arc<dyn EventStore>) -> Result<()> {
    gateway::run_gateway(config, store).await
}
