//! Upstream feed handling.
//!
//! Every source goes through the same two steps:
//!
//! 1. **Fetching** ([`fetch`]): GET the feed URL with a bounded timeout
//! 2. **Parsing** ([`parse`]): extract [`NewsItem`](crate::models::NewsItem)s
//!    from the RSS or Atom text
//!
//! Both steps degrade to "no items" instead of returning errors.

pub mod fetch;
pub mod parse;

pub use fetch::{FeedFetcher, HttpFetcher};
pub use parse::parse_feed;
