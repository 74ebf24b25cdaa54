//! Requests queued for fetching.

use serde::{Deserialize, Serialize};

/// HTTP method used for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    #[default]
    Get,
    Post,
}

/// A single page request: URL plus ordered parameters.
///
/// Parameters are sent as a query string for GET and as a form body for POST.
/// Their order is part of the request identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Request {
    pub url: String,
    pub method: Method,
    #[serde(default)]
    pub params: Vec<(String, String)>,
}

/// Items of the crawl work set are plain requests and never change once queued.
pub type WorkItem = Request;

impl Request {
    /// A GET request without parameters.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::Get,
            params: Vec::new(),
        }
    }

    /// A POST request with ordered form fields.
    pub fn post(url: impl Into<String>, params: Vec<(String, String)>) -> Self {
        Self {
            url: url.into(),
            method: Method::Post,
            params,
        }
    }
}
