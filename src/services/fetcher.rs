// src/services/fetcher.rs

//! Cache-first page fetcher.
//!
//! A fetch consults the page store first. On a miss it performs the network
//! call, retrying transient connection failures with exponential backoff,
//! optionally transforms the fresh bytes and stores the result.
//!
//! Cached content is returned as stored: the processor runs once, before the
//! write, so it is never applied a second time.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::{AppError, Result};
use crate::models::{CrawlerConfig, Request};
use crate::storage::{CacheKey, PageStore};
use crate::utils::is_valid_url;

/// Transformation applied to freshly fetched bytes before caching.
pub type ProcessFn = dyn Fn(&[u8]) -> Vec<u8> + Send + Sync;

/// Failure reported by a [`Transport`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection could not be established or timed out; worth retrying
    #[error("connection failed: {0}")]
    Connect(String),

    /// Too many redirects
    #[error("redirect loop")]
    RedirectLoop,

    /// Server answered with a non-success status
    #[error("HTTP status {0}")]
    Status(u16),

    #[error("{0}")]
    Other(String),
}

/// Performs a single network call for a request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &Request) -> std::result::Result<Vec<u8>, TransportError>;
}

/// Bounded exponential backoff for connection failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl From<&CrawlerConfig> for RetryPolicy {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            max_attempts: config.retry_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&CrawlerConfig::default())
    }
}

/// Cache-first fetcher shared by all crawl workers.
pub struct Fetcher {
    store: Arc<dyn PageStore>,
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
}

impl Fetcher {
    pub fn new(
        store: Arc<dyn PageStore>,
        transport: Arc<dyn Transport>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            transport,
            retry,
        }
    }

    /// The backing page store.
    pub fn store(&self) -> &dyn PageStore {
        self.store.as_ref()
    }

    /// Fetch a page.
    ///
    /// Returns `Ok(None)` when there is no content for the request: the URL
    /// is malformed, the server loops on redirects, or it answers with a
    /// non-success status. Errors are reserved for exhausted retries and
    /// unclassified transport failures.
    pub async fn fetch(
        &self,
        request: &Request,
        processor: Option<&ProcessFn>,
    ) -> Result<Option<Vec<u8>>> {
        let key = CacheKey::from(request);
        if let Some(cached) = self.store.lookup(&key).await {
            log::debug!("Cache HIT: {}", request.url);
            return Ok(Some(cached));
        }

        if !is_valid_url(&request.url) {
            log::warn!("Skipping malformed URL: {:?}", request.url);
            return Ok(None);
        }

        log::debug!("Cache MISS: {}", request.url);
        let Some(raw) = self.send_with_retry(request).await? else {
            return Ok(None);
        };

        let content = match processor {
            Some(process) => process(&raw),
            None => raw,
        };

        if let Err(e) = self.store.store(&key, &content).await {
            log::warn!("Failed to cache {}: {}", request.url, e);
        }
        Ok(Some(content))
    }

    async fn send_with_retry(&self, request: &Request) -> Result<Option<Vec<u8>>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.transport.send(request).await {
                Ok(bytes) => return Ok(Some(bytes)),
                Err(TransportError::Connect(message)) => {
                    if attempt >= self.retry.max_attempts {
                        log::error!(
                            "Giving up on {} after {} attempts: {}",
                            request.url,
                            attempt,
                            message
                        );
                        return Err(AppError::RetriesExhausted {
                            url: request.url.clone(),
                            attempts: attempt,
                        });
                    }

                    let delay = self.retry.delay(attempt);
                    log::warn!(
                        "Connection to {} failed ({}), retry {}/{} in {:?}",
                        request.url,
                        message,
                        attempt,
                        self.retry.max_attempts - 1,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(TransportError::RedirectLoop) => {
                    log::warn!("Redirect loop at {}, skipping", request.url);
                    return Ok(None);
                }
                Err(TransportError::Status(code)) => {
                    log::warn!("HTTP {} from {}, skipping", code, request.url);
                    return Ok(None);
                }
                Err(TransportError::Other(message)) => {
                    return Err(AppError::crawl(&request.url, message));
                }
            }
        }
    }
}
