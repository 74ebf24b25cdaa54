// src/utils/http.rs

//! HTTP transport backed by reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::redirect::Policy;

use crate::error::Result;
use crate::models::{CrawlerConfig, Method, Request};
use crate::services::{Transport, TransportError};

/// Redirect hops before a request is considered looping.
const MAX_REDIRECTS: usize = 10;

/// Create a configured asynchronous HTTP client.
pub fn create_client(config: &CrawlerConfig) -> Result<Client> {
    let client = Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .build()?;
    Ok(client)
}

/// [`Transport`] that performs real network calls.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            client: create_client(config)?,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &Request) -> std::result::Result<Vec<u8>, TransportError> {
        let builder = match request.method {
            Method::Get if request.params.is_empty() => self.client.get(&request.url),
            Method::Get => self.client.get(&request.url).query(&request.params),
            Method::Post => self.client.post(&request.url).form(&request.params),
        };

        let response = builder.send().await.map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(classify)?;
        Ok(bytes.to_vec())
    }
}

/// Map a reqwest failure onto the retry taxonomy.
fn classify(error: reqwest::Error) -> TransportError {
    if error.is_redirect() {
        TransportError::RedirectLoop
    } else if error.is_connect() || error.is_timeout() {
        TransportError::Connect(error.to_string())
    } else {
        TransportError::Other(error.to_string())
    }
}
