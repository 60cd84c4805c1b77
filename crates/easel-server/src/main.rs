//! Easel server binary.
//!
//! # Usage
//!
//! ```bash
//! # In-memory documents (development)
//! easel-server --bind 0.0.0.0:8787
//!
//! # Against a document store, restricted to one origin
//! easel-server --bind 0.0.0.0:8787 \
//!     --persistence-url http://store.internal:9100 \
//!     --allow-origin https://board.example.com
//! ```

use std::time::Duration;

use clap::Parser;
use easel_server::{
    Server, ServerConfig, ServerError,
    persistence::{HttpStore, MemoryStore},
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Realtime collaboration server for the easel shared whiteboard.
#[derive(Parser, Debug)]
#[command(name = "easel-server")]
#[command(about = "Realtime collaboration server for the easel shared whiteboard")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:8787")]
    bind: String,

    /// Base URL of the document store (omit to keep documents in memory)
    #[arg(long)]
    persistence_url: Option<String>,

    /// Allowed websocket origin (repeatable; none allows any origin)
    #[arg(long = "allow-origin")]
    allowed_origins: Vec<String>,

    /// Maximum retained history frames per room
    #[arg(long, default_value = "100")]
    history_cap: usize,

    /// Milliseconds between persistence ticks
    #[arg(long, default_value = "1000")]
    save_interval_ms: u64,

    /// Outbound queue capacity per session
    #[arg(long, default_value = "256")]
    outbound_queue: usize,

    /// Sustained inbound messages per second per session
    #[arg(long, default_value = "20")]
    rate_limit: u32,

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

    tracing::info!("easel server starting");

    let config = ServerConfig {
        bind_address: args.bind,
        persistence_url: args.persistence_url,
        allowed_origins: args.allowed_origins,
        history_cap: args.history_cap,
        save_interval: Duration::from_millis(args.save_interval_ms),
        outbound_queue: args.outbound_queue,
        rate_limit: args.rate_limit,
        ..ServerConfig::default()
    };

    match config.persistence_url.clone() {
        Some(url) => {
            let store = HttpStore::new(url)
                .map_err(|e| ServerError::Config(format!("document store client: {e}")))?;
            let server = Server::bind(config, store).await?;
            tracing::info!("listening on {}", server.local_addr()?);
            server.run().await?;
        }
        None => {
            tracing::warn!("no persistence endpoint configured; documents live in memory only");
            let server = Server::bind(config, MemoryStore::new()).await?;
            tracing::info!("listening on {}", server.local_addr()?);
            server.run().await?;
        }
    }

    Ok(())
}
