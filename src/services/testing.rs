//! Test doubles shared by the service and pipeline tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::models::Request;
use crate::services::{RetryPolicy, Transport, TransportError};

type Reply = Result<Vec<u8>, TransportError>;

type Responder = Box<dyn Fn(&Request) -> Option<Reply> + Send + Sync>;

/// Transport answering from a per-URL script.
///
/// Replies for a URL are consumed in order; the last one repeats forever.
/// Unknown URLs answer 404. A responder, when set, is consulted first and
/// can answer based on the request parameters.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    responder: Option<Responder>,
    calls: AtomicUsize,
    hang: bool,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose calls never complete.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    pub fn page(self, url: &str, body: &str) -> Self {
        self.reply(url, Ok(body.as_bytes().to_vec()))
    }

    pub fn reply(self, url: &str, reply: Reply) -> Self {
        self.routes
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn respond_with(
        mut self,
        responder: impl Fn(&Request) -> Option<Reply> + Send + Sync + 'static,
    ) -> Self {
        self.responder = Some(Box::new(responder));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &Request) -> Reply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }

        if let Some(reply) = self.responder.as_ref().and_then(|respond| respond(request)) {
            return reply;
        }

        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(&request.url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or(Err(TransportError::Status(404))),
            None => Err(TransportError::Status(404)),
        }
    }
}

/// Retry policy with millisecond delays.
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}
