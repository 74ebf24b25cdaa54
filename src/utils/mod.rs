//! Utility functions and helpers.

pub mod http;
pub mod log;

use url::Url;

/// A URL is fetchable only if it has both a scheme and a host.
pub fn is_valid_url(url: &str) -> bool {
    Url::parse(url)
        .map(|u| !u.scheme().is_empty() && u.host_str().is_some_and(|h| !h.is_empty()))
        .unwrap_or(false)
}
