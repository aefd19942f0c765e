//! Data models shared by the fetcher, parser, cache and HTTP layer.
//!
//! - [`FeedSource`]: a configured upstream feed (name + URL)
//! - [`NewsItem`]: one normalized entry extracted from a feed
//! - [`NewsResponse`]: the JSON body served by `GET /api/news`
//!
//! `NewsItem` serializes with camelCase field names because the page widget
//! consuming the endpoint reads `publishedAt`.

use serde::{Deserialize, Serialize};

/// An upstream RSS/Atom feed.
///
/// Sources are loaded once at startup and never change while the process runs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeedSource {
    /// Human readable label copied into [`NewsItem::source`].
    pub name: String,
    /// Absolute URL of the feed document.
    pub url: String,
}

impl FeedSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// A single news entry.
///
/// `link` is the dedup key across sources. `published_at` is kept as the raw
/// string found in the feed; RSS and Atom use different date formats and no
/// attempt is made to normalize them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Body of a `GET /api/news` response.
#[derive(Debug, Serialize)]
pub struct NewsResponse<'a> {
    pub items: &'a [NewsItem],
}
