//! HTTP retrieval of feed documents.
//!
//! A fetch either yields the response body or nothing. Non-2xx statuses,
//! timeouts, DNS and connection failures and empty bodies are logged and
//! swallowed here so that one broken source never affects the others. There
//! are no retries: a failed source is tried again on the next cache rebuild.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::ACCEPT;
use tracing::{debug, instrument, warn};

use crate::error::FetchError;
use crate::models::FeedSource;

const USER_AGENT: &str = concat!(
    env!("CARGO_PKG_NAME"),
    "/",
    env!("CARGO_PKG_VERSION"),
    " (+news widget feed reader)"
);
const FEED_ACCEPT: &str =
    "application/rss+xml, application/atom+xml, application/xml;q=0.9, text/xml;q=0.9, */*;q=0.5";

/// Retrieves the raw text of a feed.
///
/// Implementations must not fail: `None` means "no items from this source".
pub trait FeedFetcher: Send + Sync + 'static {
    fn fetch(&self, source: &FeedSource) -> impl Future<Output = Option<String>> + Send;
}

/// [`FeedFetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher whose requests are abandoned after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    async fn try_fetch(&self, source: &FeedSource) -> Result<String, FetchError> {
        let response = self
            .client
            .get(source.url.as_str())
            .header(ACCEPT, FEED_ACCEPT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(FetchError::EmptyBody);
        }
        Ok(body)
    }
}

impl FeedFetcher for HttpFetcher {
    #[instrument(level = "info", skip_all, fields(source = %source.name, url = %source.url))]
    async fn fetch(&self, source: &FeedSource) -> Option<String> {
        match self.try_fetch(source).await {
            Ok(body) => {
                debug!(bytes = body.len(), "Fetched feed");
                Some(body)
            }
            Err(FetchError::Request(e)) if e.is_timeout() => {
                warn!(error = %e, "Feed fetch timed out");
                None
            }
            Err(e) => {
                warn!(error = %e, "Feed fetch failed");
                None
            }
        }
    }
}
