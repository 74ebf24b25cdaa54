//! Persistent page cache.
//!
//! Pages are stored under small sequential ids; an append-only index file maps
//! each normalized request key to its id.
//!
//! ## Directory Structure
//!
//! ```text
//! cache/
//! ├── index        # one `<key>::<id>` line per entry, append-only
//! ├── 1            # page content for id 1
//! ├── 2
//! └── ...
//! ```

pub mod local;

use std::fmt;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Request;

// Re-export for convenience
pub use local::{INDEX_FILE, INDEX_SEPARATOR, LocalCache};

/// Normalized identity of a request.
///
/// Only ASCII letters, digits, `_` and `-` survive normalization, so a key is
/// always a safe file name and never contains [`INDEX_SEPARATOR`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build the key for a URL and its ordered parameters.
    pub fn new(url: &str, params: &[(String, String)]) -> Self {
        let mut key = sanitize(url);
        for (name, value) in params {
            key.push('_');
            key.push_str(&sanitize(name));
            key.push('-');
            key.push_str(&sanitize(value));
        }
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&Request> for CacheKey {
    fn from(request: &Request) -> Self {
        Self::new(&request.url, &request.params)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn sanitize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Trait for page cache backends.
#[async_trait]
pub trait PageStore: Send + Sync {
    /// Whether `lookup` would currently hit, without reading the content.
    async fn is_fresh(&self, key: &CacheKey) -> bool;

    /// Cached content, or `None` when absent, unreadable or expired.
    async fn lookup(&self, key: &CacheKey) -> Option<Vec<u8>>;

    /// Insert or overwrite the content for a key.
    async fn store(&self, key: &CacheKey, content: &[u8]) -> Result<()>;

    /// Fraction of `keys` that are currently fresh.
    ///
    /// An empty key set counts as fully covered.
    async fn coverage(&self, keys: &[CacheKey]) -> f64 {
        if keys.is_empty() {
            return 1.0;
        }

        let mut hits = 0usize;
        for key in keys {
            if self.is_fresh(key).await {
                hits += 1;
            }
        }
        hits as f64 / keys.len() as f64
    }
}
