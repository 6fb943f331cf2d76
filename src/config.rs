//! Configuration module for Granary.
//!
//! Configuration is read from a JSON file or from environment variables
//! (the deployment path). `API_KEYS` is required in the environment form;
//! everything else has defaults matching a typical single-node deployment.

use crate::error::{GranaryError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Main configuration for a Granary node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GranaryConfig {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// API key to tenant mapping.
    pub auth: AuthConfig,
    /// Per-tenant admission budget.
    pub rate_limit: RateLimitConfig,
    /// Ingestion pipeline configuration.
    pub ingest: IngestConfig,
    /// Observability configuration.
    pub observability: ObservabilityConfig,
}

impl GranaryConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GranaryError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| GranaryError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    ///
    /// `API_KEYS` is required (format: `key1:tenant1,key2:tenant2`); all
    /// other variables fall back to defaults.
    pub fn from_env() -> Result<Self> {
        let api_keys = std::env::var("API_KEYS").map_err(|_| {
            GranaryError::Config(
                "Missing required environment variable: API_KEYS. \
                 Format: key1:tenant1,key2:tenant2"
                    .to_string(),
            )
        })?;

        let config = Self {
            server: ServerConfig {
                bind_addr: env_parsed("GRANARY_BIND_ADDR", ServerConfig::default().bind_addr)?,
            },
            auth: AuthConfig { api_keys },
            rate_limit: RateLimitConfig {
                window_ms: env_parsed("RATE_LIMIT_WINDOW_MS", 60_000)?,
                max_requests: env_parsed("RATE_LIMIT_MAX_REQUESTS", 1_000)?,
                sweep_interval_ms: env_parsed("RATE_LIMIT_SWEEP_INTERVAL_MS", 60_000)?,
            },
            ingest: IngestConfig {
                batch_size: env_parsed("INGEST_BATCH_SIZE", 100)?,
            },
            observability: ObservabilityConfig {
                log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.max_requests == 0 {
            return Err(GranaryError::InvalidConfig {
                field: "rate_limit.max_requests".to_string(),
                reason: "must be non-zero".to_string(),
            });
        }

        if self.rate_limit.window_ms == 0 {
            return Err(GranaryError::InvalidConfig {
                field: "rate_limit.window_ms".to_string(),
                reason: "must be non-zero".to_string(),
            });
        }

        if self.ingest.batch_size == 0 {
            return Err(GranaryError::InvalidConfig {
                field: "ingest.batch_size".to_string(),
                reason: "must be non-zero".to_string(),
            });
        }

        if self.auth.api_keys.trim().is_empty() {
            return Err(GranaryError::InvalidConfig {
                field: "auth.api_keys".to_string(),
                reason: "at least one key:tenant pair is required".to_string(),
            });
        }

        Ok(())
    }

    /// Create a minimal development configuration.
    pub fn development() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig {
                api_keys: "dev-key:dev-tenant".to_string(),
            },
            rate_limit: RateLimitConfig::default(),
            ingest: IngestConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| GranaryError::InvalidConfig {
            field: name.to_string(),
            reason: format!("could not parse value {:?}", raw),
        }),
        Err(_) => Ok(default),
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the gateway listens on.
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".parse().expect("valid socket address"),
        }
    }
}

/// API key configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Comma-separated `key:tenant` pairs.
    pub api_keys: String,
}

/// Admission controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Fixed window length in milliseconds.
    pub window_ms: u64,
    /// Requests allowed per tenant per window.
    pub max_requests: u32,
    /// How often the background sweep reclaims expired windows, in
    /// milliseconds. Independent of the window length.
    pub sweep_interval_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            max_requests: 1_000,
            sweep_interval_ms: 60_000,
        }
    }
}

impl RateLimitConfig {
    /// Strict admission configuration.
    pub fn strict() -> Self {
        Self {
            window_ms: 60_000,
            max_requests: 100,
            sweep_interval_ms: 60_000,
        }
    }

    /// Relaxed admission configuration.
    pub fn relaxed() -> Self {
        Self {
            window_ms: 60_000,
            max_requests: 10_000,
            sweep_interval_ms: 60_000,
        }
    }

    /// Window length as a [`Duration`].
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Sweep cadence as a [`Duration`].
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

/// Ingestion pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Maximum events per storage round trip.
    pub batch_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { batch_size: 100 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level filter (`error`, `warn`, `info`, `debug`, `trace`).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
