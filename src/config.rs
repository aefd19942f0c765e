//! Service settings and the feed source list.
//!
//! Sources default to [`default_sources`]. A YAML file can replace the list
//! without a rebuild:
//!
//! ```yaml
//! - name: Le Mauricien
//!   url: https://www.lemauricien.com/feed/
//! - name: EdSurge
//!   url: https://www.edsurge.com/articles_rss
//! ```

use std::path::Path;
use std::time::Duration;

use tracing::{info, instrument};
use url::Url;

use crate::cli::Cli;
use crate::error::ConfigError;
use crate::models::FeedSource;

/// Freshness window when at least one item was found (one week).
pub const LONG_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
/// Freshness window for an empty result (five minutes), so an upstream outage
/// is retried soon instead of being cached for a week.
pub const SHORT_TTL: Duration = Duration::from_secs(5 * 60);
/// Grace window advertised to downstream caches (one day).
pub const STALE_WHILE_REVALIDATE: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(12);
pub const DEFAULT_MAX_ITEMS: usize = 30;

/// Knobs used by the aggregator on every rebuild.
#[derive(Debug, Clone)]
pub struct Settings {
    pub fetch_timeout: Duration,
    pub max_items: usize,
    pub long_ttl: Duration,
    pub short_ttl: Duration,
    pub single_flight: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_items: DEFAULT_MAX_ITEMS,
            long_ttl: LONG_TTL,
            short_ttl: SHORT_TTL,
            single_flight: false,
        }
    }
}

impl Settings {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            fetch_timeout: cli.fetch_timeout(),
            max_items: usize::from(cli.max_items),
            single_flight: cli.single_flight,
            ..Self::default()
        }
    }

    /// TTL for a freshly built result.
    pub fn ttl_for(&self, item_count: usize) -> Duration {
        if item_count > 0 {
            self.long_ttl
        } else {
            self.short_ttl
        }
    }
}

/// Regional news, the government portal, and international education news.
pub fn default_sources() -> Vec<FeedSource> {
    vec![
        FeedSource::new("Le Mauricien", "https://www.lemauricien.com/feed/"),
        FeedSource::new("Defimedia", "https://defimedia.info/rss.xml"),
        FeedSource::new("Government Information Service", "https://gis.govmu.org/rss.xml"),
        FeedSource::new("EdSurge", "https://www.edsurge.com/articles_rss"),
        FeedSource::new("The Hechinger Report", "https://hechingerreport.org/feed/"),
        FeedSource::new("UNESCO News", "https://www.unesco.org/en/rss.xml"),
    ]
}

/// Load the source list from `path`, or fall back to the built-in list.
#[instrument(level = "info")]
pub async fn load_sources(path: Option<&str>) -> Result<Vec<FeedSource>, ConfigError> {
    let sources = match path {
        Some(path) => read_sources_file(Path::new(path)).await?,
        None => default_sources(),
    };
    validate_sources(&sources)?;
    info!(count = sources.len(), from_file = path.is_some(), "Loaded feed sources");
    Ok(sources)
}

async fn read_sources_file(path: &Path) -> Result<Vec<FeedSource>, ConfigError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    serde_yaml::from_str(&raw).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

fn validate_sources(sources: &[FeedSource]) -> Result<(), ConfigError> {
    if sources.is_empty() {
        return Err(ConfigError::NoSources);
    }
    for feed in sources {
        let url = Url::parse(&feed.url).map_err(|source| ConfigError::InvalidUrl {
            name: feed.name.clone(),
            url: feed.url.clone(),
            source,
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme {
                name: feed.name.clone(),
                url: feed.url.clone(),
            });
        }
    }
    Ok(())
}
