//! Per-tenant admission control for the ingestion gateway.
//!
//! Enforces a fixed-window request budget: each tenant gets `max_requests`
//! per `window`, with the window anchored to the tenant's first request
//! rather than a global clock boundary. Windows are created lazily, reset
//! lazily on the next request after expiry, and reclaimed by a periodic
//! sweep so tenants that stop sending traffic do not leak memory.
//!
//! # Concurrency
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    AdmissionController                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  windows: RwLock<HashMap<tenant, Arc<Mutex<RateWindow>>>>    │
//! │                                                              │
//! │  check:  map read lock to locate the entry (write lock only  │
//! │          on first sight of a tenant), then the per-tenant    │
//! │          mutex for reset + increment as one atomic unit      │
//! │  sweep:  map write lock; removes an entry only when expired  │
//! │          AND no in-flight check holds a reference to it      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Holding the map write lock during sweep means no new `check` can clone an
//! entry concurrently, so `Arc::strong_count == 1` proves the entry is not
//! being mutated and removal cannot lose an increment. Deleting an expired
//! entry is always safe: the next `check` recreates it lazily.
//!
//! The controller never fails; it only answers [`Decision::Allowed`] or
//! [`Decision::Denied`]. State is process-local, so a restart resets every
//! tenant's budget.

use crate::config::RateLimitConfig;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Request may proceed.
    Allowed {
        /// Configured budget for the window.
        limit: u32,
        /// Requests left in the current window.
        remaining: u32,
        /// When the current window ends.
        reset_at: DateTime<Utc>,
    },
    /// Tenant is over budget for the current window.
    Denied {
        /// Time remaining until the window resets.
        retry_after: Duration,
        /// When the current window ends.
        reset_at: DateTime<Utc>,
    },
}

impl Decision {
    /// Check if the request was admitted.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }

    /// Remaining budget if admitted.
    pub fn remaining(&self) -> Option<u32> {
        match self {
            Decision::Allowed { remaining, .. } => Some(*remaining),
            Decision::Denied { .. } => None,
        }
    }

    /// Retry-after duration if denied.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Decision::Allowed { .. } => None,
            Decision::Denied { retry_after, .. } => Some(*retry_after),
        }
    }

    /// When the window resets, regardless of outcome.
    pub fn reset_at(&self) -> DateTime<Utc> {
        match self {
            Decision::Allowed { reset_at, .. } | Decision::Denied { reset_at, .. } => *reset_at,
        }
    }
}

/// Request counter for one tenant's current window.
#[derive(Debug, Clone, Copy)]
struct RateWindow {
    /// Requests seen in the window, including denied ones.
    count: u32,
    /// Exclusive end of the window.
    window_end: DateTime<Utc>,
}

impl RateWindow {
    fn starting(now: DateTime<Utc>, window: ChronoDuration) -> Self {
        Self {
            count: 0,
            window_end: now + window,
        }
    }

    fn expired(&self, now: DateTime<Utc>) -> bool {
        self.window_end <= now
    }
}

/// Process-wide fixed-window admission controller.
pub struct AdmissionController {
    config: RateLimitConfig,
    window: ChronoDuration,
    windows: RwLock<HashMap<String, Arc<Mutex<RateWindow>>>>,
}

impl AdmissionController {
    /// Create a new controller.
    pub fn new(config: RateLimitConfig) -> Self {
        let window = ChronoDuration::milliseconds(config.window_ms as i64);
        Self {
            config,
            window,
            windows: RwLock::new(HashMap::new()),
        }
    }

    /// Decide whether a tenant's request may proceed at `now`.
    ///
    /// The read of current state, the conditional reset, and the increment
    /// happen under the tenant's mutex, so two concurrent calls never observe
    /// the same pre-increment count and a call at a reset boundary joins
    /// exactly one window. A denied request still counts: the counter is not
    /// rolled back, and `retry_after` always reflects the real time left in
    /// the window however far over budget the tenant is.
    pub fn check(&self, tenant_id: &str, now: DateTime<Utc>) -> Decision {
        let entry = self.entry_for(tenant_id, now);
        let mut window = entry.lock();

        if window.expired(now) {
            *window = RateWindow::starting(now, self.window);
        }
        window.count += 1;

        if window.count <= self.config.max_requests {
            Decision::Allowed {
                limit: self.config.max_requests,
                remaining: self.config.max_requests.saturating_sub(window.count),
                reset_at: window.window_end,
            }
        } else {
            let retry_after = (window.window_end - now).to_std().unwrap_or_default();
            Decision::Denied {
                retry_after,
                reset_at: window.window_end,
            }
        }
    }

    /// Remove every tenant entry whose window has expired at `now` and which
    /// no in-flight `check` is holding. Returns how many entries were removed.
    ///
    /// Purely housekeeping: deleting an entry is always safe because the next
    /// `check` recreates it lazily with a fresh window.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut windows = self.windows.write();
        let before = windows.len();
        windows.retain(|_, entry| {
            // Another clone means a check is between locating the entry and
            // locking it; keep the entry so its increment is not lost.
            if Arc::strong_count(entry) > 1 {
                return true;
            }
            !entry.lock().expired(now)
        });
        before - windows.len()
    }

    /// Number of tenants currently tracked.
    pub fn tracked_tenants(&self) -> usize {
        self.windows.read().len()
    }

    /// Admission configuration.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Start the background sweep task.
    ///
    /// The task is owned by the returned [`SweeperHandle`]; dropping the
    /// handle or calling [`SweeperHandle::shutdown`] stops it deterministically.
    pub fn start_sweeper(self: &Arc<Self>) -> SweeperHandle {
        let controller = Arc::clone(self);
        let interval = self.config.sweep_interval();
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so the cadence starts
            // one interval after startup.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = controller.sweep(Utc::now());
                        if removed > 0 {
                            debug!(removed, "Swept expired rate windows");
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Rate window sweeper stopped");
        });

        SweeperHandle {
            shutdown_tx,
            task: Some(task),
        }
    }

    /// Locate the tenant's entry, creating it lazily on first sight.
    fn entry_for(&self, tenant_id: &str, now: DateTime<Utc>) -> Arc<Mutex<RateWindow>> {
        if let Some(entry) = self.windows.read().get(tenant_id) {
            return Arc::clone(entry);
        }

        let mut windows = self.windows.write();
        Arc::clone(
            windows
                .entry(tenant_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(RateWindow::starting(now, self.window)))),
        )
    }
}

/// Owned handle to the background sweep task.
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Stop the sweep task and wait for it to exit.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Sweeper task did not shut down cleanly: {}", e);
            }
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        // Abort rather than leak if the handle is dropped without shutdown().
        if let Some(task) = self.task.take() {
            let _ = self.shutdown_tx.send(true);
            task.abort();
        }
    }
}
