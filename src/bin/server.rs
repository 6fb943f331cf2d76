//! Granary server binary.

use clap::Parser;
use granary::config::GranaryConfig;
use granary::storage::MemoryStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "granary-server")]
#[command(about = "Multi-tenant telemetry ingestion service")]
struct Args {
    /// Configuration file (JSON). Without it, configuration is read from
    /// environment variables (API_KEYS, RATE_LIMIT_*, INGEST_BATCH_SIZE, ...).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Gateway bind address
    #[arg(long)]
    bind_addr: Option<String>,

    /// API keys (format: key1:tenant1,key2:tenant2)
    #[arg(long)]
    api_keys: Option<String>,

    /// Use the development configuration (in-memory defaults, dev API key)
    #[arg(long)]
    dev: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = if let Some(config_path) = &args.config {
        GranaryConfig::from_file(config_path)?
    } else if args.dev {
        GranaryConfig::development()
    } else {
        GranaryConfig::from_env()?
    };

    // Override with CLI args
    if let Some(addr) = args.bind_addr {
        config.server.bind_addr = addr.parse()?;
    }
    if let Some(keys) = args.api_keys {
        config.auth.api_keys = keys;
    }
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.observability.log_level.clone())),
        )
        .init();

    granary::run(config, Arc::new(MemoryStore::new())).await?;

    Ok(())
}
