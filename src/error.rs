//! Error types.
//!
//! Feed errors are only ever logged: the aggregator turns every
//! [`FetchError`] into "no items from this source". [`ConfigError`] is the
//! one error that can stop the process, at startup.

use std::path::PathBuf;

use thiserror::Error;

/// Why an upstream feed produced no body.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
    #[error("empty response body")]
    EmptyBody,
}

/// Problems loading the feed source list.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid sources file {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("source {name:?} has an invalid url {url:?}: {source}")]
    InvalidUrl {
        name: String,
        url: String,
        source: url::ParseError,
    },
    #[error("source {name:?} must use http or https, got {url:?}")]
    UnsupportedScheme { name: String, url: String },
    #[error("no feed sources configured")]
    NoSources,
}
