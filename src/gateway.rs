//! HTTP gateway for the Granary service.
//!
//! A thin Axum adapter over the core: API-key auth resolves the tenant, the
//! admission controller throttles per tenant, and the ingestion/query
//! services do the work. Everything tenant-facing is JSON.
//!
//! Rate-limit state is surfaced on every authenticated response via the
//! conventional headers: `X-RateLimit-Limit`, `X-RateLimit-Remaining`,
//! `X-RateLimit-Reset` (epoch seconds), plus `Retry-After` on denial.

use crate::admission::{AdmissionController, Decision};
use crate::config::GranaryConfig;
use crate::error::{GranaryError, Result};
use crate::ingest::IngestPipeline;
use crate::query::{GroupBy, QueryService};
use crate::storage::EventStore;
use crate::tenant::TenantRegistry;
use crate::types::{Event, EventFilter, EventType};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Shared state for gateway handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<TenantRegistry>,
    pub admission: Arc<AdmissionController>,
    pub pipeline: IngestPipeline,
    pub query: QueryService,
}

impl AppState {
    /// Wire up gateway state from configuration and a storage backend.
    pub fn from_config(config: &GranaryConfig, store: Arc<dyn EventStore>) -> Result<Self> {
        let registry = Arc::new(TenantRegistry::parse(&config.auth.api_keys)?);
        let admission = Arc::new(AdmissionController::new(config.rate_limit.clone()));
        let pipeline = IngestPipeline::new(store.clone(), config.ingest.clone());
        let query = QueryService::new(store);
        Ok(Self {
            registry,
            admission,
            pipeline,
            query,
        })
    }
}

/// Tenant resolved by the auth middleware, carried in request extensions.
#[derive(Debug, Clone)]
pub struct TenantId(pub String);

/// Resolve `X-API-Key` to a tenant or reject with 401.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let api_key = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok());

    let tenant_id = match api_key {
        Some(key) => match state.registry.resolve(key) {
            Some(tenant) => tenant.to_string(),
            None => return unauthorized("Invalid API key"),
        },
        None => return unauthorized("Missing X-API-Key header"),
    };

    request.extensions_mut().insert(TenantId(tenant_id));
    next.run(request).await
}

/// Enforce the tenant's request budget and stamp rate-limit headers.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(TenantId(tenant_id)) = request.extensions().get::<TenantId>().cloned() else {
        // Auth runs first; an absent tenant means a wiring bug, fail closed.
        return unauthorized("Tenant not resolved");
    };

    let decision = state.admission.check(&tenant_id, Utc::now());
    let limit = state.admission.config().max_requests;

    match decision {
        Decision::Allowed {
            remaining,
            reset_at,
            ..
        } => {
            let mut response = next.run(request).await;
            stamp_rate_limit_headers(&mut response, limit, remaining, reset_at);
            response
        }
        Decision::Denied {
            retry_after,
            reset_at,
        } => {
            warn!(
                tenant_id = %tenant_id,
                retry_after_secs = retry_after.as_secs(),
                "Rate limit exceeded"
            );
            let retry_secs = ceil_secs(retry_after);
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                [("Retry-After", retry_secs.to_string())],
                Json(json!({
                    "statusCode": 429,
                    "message": "Rate limit exceeded",
                    "retryAfter": retry_secs,
                })),
            )
                .into_response();
            stamp_rate_limit_headers(&mut response, limit, 0, reset_at);
            response
        }
    }
}

fn stamp_rate_limit_headers(
    response: &mut Response,
    limit: u32,
    remaining: u32,
    reset_at: DateTime<Utc>,
) {
    let headers = response.headers_mut();
    let insert = |headers: &mut axum::http::HeaderMap, name: &'static str, value: String| {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    };
    insert(headers, "x-ratelimit-limit", limit.to_string());
    insert(headers, "x-ratelimit-remaining", remaining.to_string());
    insert(headers, "x-ratelimit-reset", reset_at.timestamp().to_string());
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"statusCode": 401, "message": message})),
    )
        .into_response()
}

fn error_response(err: GranaryError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(json!({"statusCode": status.as_u16(), "message": err.to_string()})),
    )
        .into_response()
}

/// Ingest request body: a single event or an array of events.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum IngestBody {
    Many(Vec<Event>),
    One(Box<Event>),
}

impl IngestBody {
    fn into_events(self) -> Vec<Event> {
        match self {
            IngestBody::Many(events) => events,
            IngestBody::One(event) => vec![*event],
        }
    }
}

/// Ingest success response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub ingested: u64,
    pub duplicates: u64,
    pub message: String,
}

async fn ingest_handler(
    State(state): State<AppState>,
    Extension(TenantId(tenant_id)): Extension<TenantId>,
    Json(body): Json<IngestBody>,
) -> Response {
    match state.pipeline.ingest(&tenant_id, body.into_events()).await {
        Ok(report) => (
            StatusCode::CREATED,
            Json(IngestResponse {
                ingested: report.summary.ingested,
                duplicates: report.summary.duplicates,
                message: "Events ingested successfully".to_string(),
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// Query-string parameters for `GET /query`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub event_type: Option<EventType>,
    pub service_name: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub group_by: Option<GroupBy>,
}

async fn query_handler(
    State(state): State<AppState>,
    Extension(TenantId(tenant_id)): Extension<TenantId>,
    Query(params): Query<QueryParams>,
) -> Response {
    let filter = EventFilter {
        start_time: params.start_time,
        end_time: params.end_time,
        event_type: params.event_type,
        service_name: params.service_name,
    };

    let result = match params.group_by {
        Some(group_by) => state
            .query
            .aggregate_events(&tenant_id, &filter, group_by)
            .await
            .map(|agg| Json(agg).into_response()),
        None => state
            .query
            .query_events(&tenant_id, &filter, params.page, params.limit)
            .await
            .map(|page| Json(page).into_response()),
    };

    result.unwrap_or_else(error_response)
}

async fn health_handler() -> Response {
    Json(json!({
        "status": "ok",
        "service": "granary",
        "version": env!("CARGO_PKG_VERSION"),
    }))
    .into_response()
}

/// Build the gateway router.
///
/// `/health` is unauthenticated; `/ingest` and `/query` go through auth and
/// then admission control.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/ingest", post(ingest_handler))
        .route("/query", get(query_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health_handler))
        .merge(protected)
        .with_state(state)
}

/// Run the gateway until shutdown.
pub async fn run_gateway(config: GranaryConfig, store: Arc<dyn EventStore>) -> Result<()> {
    config.validate()?;
    let state = AppState::from_config(&config, store)?;
    let sweeper = state.admission.start_sweeper();
    let app = router(state);

    let listener = TcpListener::bind(config.server.bind_addr)
        .await
        .map_err(|e| GranaryError::Config(format!("Failed to bind {}: {}", config.server.bind_addr, e)))?;
    info!(addr = %config.server.bind_addr, "Granary gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| GranaryError::Internal(format!("Server error: {}", e)))?;

    // Stop housekeeping only after the listener has drained.
    sweeper.shutdown().await;
    info!("Granary gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    } else {
        info!("Shutdown signal received");
    }
}
