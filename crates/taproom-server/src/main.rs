//! Taproom server binary.
//!
//! # Usage
//!
//! ```bash
//! # Start on the default port
//! taproom-server --bind 0.0.0.0:7440
//!
//! # Shorter login sessions, verbose logging
//! taproom-server --session-ttl-hours 8 --log-level debug
//! ```

use clap::Parser;
use taproom_server::{DriverConfig, Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Taproom protocol server
#[derive(Parser, Debug)]
#[command(name = "taproom-server")]
#[command(about = "Taproom test-room protocol server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:7440")]
    bind: String,

    /// Maximum concurrent connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

    /// Login session lifetime in hours
    #[arg(long, default_value = "24")]
    session_ttl_hours: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Taproom server starting");
    tracing::info!("Binding to {}", args.bind);

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        driver: DriverConfig {
            max_connections: args.max_connections,
            session_ttl_secs: args.session_ttl_hours * 3600,
            ..Default::default()
        },
    };

    let server = Server::bind(config).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
