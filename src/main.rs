//! # News Feed Aggregator
//!
//! Serves `GET /api/news`: the latest items from a handful of regional and
//! education news feeds, merged into one list for the news widget on the
//! school and online-course websites.
//!
//! ## Usage
//!
//! ```sh
//! news_feed_aggregator --port 3000 --sources ./sources.yaml
//! ```
//!
//! ## Architecture
//!
//! 1. **Fetching**: GET every configured feed concurrently, 12 s timeout each
//! 2. **Parsing**: extract items from RSS, falling back to Atom
//! 3. **Merging**: dedupe by link, keep the first 30 in source order
//! 4. **Caching**: one in-memory entry, fresh for a week (five minutes when
//!    nothing could be fetched)

use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{debug, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod aggregator;
mod cache;
mod cli;
mod config;
mod error;
mod feeds;
mod models;
mod server;
mod utils;

use aggregator::Aggregator;
use cache::{MemoryCache, SystemClock};
use cli::Cli;
use config::{Settings, load_sources};
use feeds::HttpFetcher;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "news_feed_aggregator starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let sources = load_sources(args.sources.as_deref()).await?;
    let settings = Settings::from_cli(&args);
    info!(
        sources = sources.len(),
        fetch_timeout_secs = settings.fetch_timeout.as_secs(),
        max_items = settings.max_items,
        single_flight = settings.single_flight,
        "Aggregator configured"
    );

    let fetcher = HttpFetcher::new(settings.fetch_timeout)?;
    let cache = MemoryCache::new(SystemClock);
    let aggregator = Arc::new(Aggregator::new(fetcher, cache, sources, settings));

    let address = args.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!(%address, "Serving GET /api/news");

    server::serve(listener, aggregator).await?;

    info!("Server stopped");
    Ok(())
}
