//! Gatekeeper service entry point.
//!
//! # Startup
//! ```text
//! CLI args → config file (optional) → CLI overrides → validation
//!     → logging → metrics exporter → in-process store
//!     → HttpServer::run until SIGINT/SIGTERM
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use gatekeeper::clock::SystemClock;
use gatekeeper::config::loader::{load_config, ConfigError};
use gatekeeper::config::validation::validate_config;
use gatekeeper::config::Environment;
use gatekeeper::lifecycle::signals::spawn_signal_handler;
use gatekeeper::notify::LogNotifier;
use gatekeeper::observability::{logging, metrics};
use gatekeeper::store::{MemoryStore, Stores};
use gatekeeper::{GatekeeperConfig, HttpServer, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "gatekeeper")]
#[command(about = "Rate limiting, authentication and authorization for an HTTP API", long_about = None)]
struct Args {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port (overrides listener.bind_address's port).
    #[arg(short, long)]
    port: Option<u16>,

    /// Deployment environment.
    #[arg(short, long, value_enum)]
    env: Option<EnvArg>,

    /// Enable or disable the rate limiter.
    #[arg(long)]
    limiter_enabled: Option<bool>,

    /// Rate limiter refill rate per client.
    #[arg(long)]
    limiter_rps: Option<f64>,

    /// Rate limiter burst size per client.
    #[arg(long)]
    limiter_burst: Option<u32>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum EnvArg {
    Development,
    Staging,
    Production,
}

impl From<EnvArg> for Environment {
    fn from(arg: EnvArg) -> Self {
        match arg {
            EnvArg::Development => Environment::Development,
            EnvArg::Staging => Environment::Staging,
            EnvArg::Production => Environment::Production,
        }
    }
}

fn build_config(args: &Args) -> Result<GatekeeperConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatekeeperConfig::default(),
    };

    if let Some(port) = args.port {
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{host}:{port}");
    }
    if let Some(env) = args.env {
        config.environment = env.into();
    }
    if let Some(enabled) = args.limiter_enabled {
        config.rate_limit.enabled = enabled;
    }
    if let Some(rps) = args.limiter_rps {
        config.rate_limit.requests_per_second = rps;
    }
    if let Some(burst) = args.limiter_burst {
        config.rate_limit.burst_size = burst;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = build_config(&args)?;

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "gatekeeper starting");

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let clock = Arc::new(SystemClock);
    let stores = Stores::shared(Arc::new(MemoryStore::new(clock.clone())));
    let server = HttpServer::new(config, stores, clock, Arc::new(LogNotifier));

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());
    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
