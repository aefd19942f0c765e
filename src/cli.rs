//! Command-line interface definitions.
//!
//! Every option can also be set through an environment variable so the
//! service can be configured from a container or a hosting dashboard.

use std::time::Duration;

use clap::Parser;

/// Command-line arguments for the news feed service.
///
/// # Examples
///
/// ```sh
/// # Defaults: 0.0.0.0:3000, built-in feed list
/// news_feed_aggregator
///
/// # Custom sources and a shorter upstream timeout
/// news_feed_aggregator --sources ./sources.yaml --fetch-timeout-secs 5
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Address the HTTP server binds to
    #[arg(long, env = "NEWS_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port the HTTP server listens on
    #[arg(short, long, env = "NEWS_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Optional YAML file listing feed sources (`- name: ..., url: ...`)
    #[arg(short, long, env = "NEWS_SOURCES")]
    pub sources: Option<String>,

    /// Per-source upstream timeout in seconds
    #[arg(long, env = "NEWS_FETCH_TIMEOUT_SECS", default_value_t = 12)]
    pub fetch_timeout_secs: u64,

    /// Maximum number of items kept after deduplication (1 to 30)
    #[arg(
        long,
        env = "NEWS_MAX_ITEMS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u16).range(1..=30)
    )]
    pub max_items: u16,

    /// Serialize cache rebuilds so concurrent stale requests share one upstream fetch
    #[arg(long, env = "NEWS_SINGLE_FLIGHT")]
    pub single_flight: bool,
}

impl Cli {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
