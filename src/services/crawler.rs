// src/services/crawler.rs

//! Concurrent schedule crawler.
//!
//! The work queue is filled completely before any worker starts. Workers pop
//! without waiting and exit as soon as the queue is empty, so an empty queue
//! always means the work is exhausted.
//!
//! Pool size shrinks with cache coverage: cached pages resolve almost
//! instantly, so a warm cache needs little concurrency while a cold one needs
//! as much as allowed.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{ScheduleRecord, WorkItem};
use crate::services::{Fetcher, ProcessFn, ScheduleParser};
use crate::storage::CacheKey;

/// Number of workers for a batch with the given cache coverage.
///
/// `max_workers` for a cold batch, one for a fully cached batch, never
/// increasing as coverage grows.
pub fn pool_size(max_workers: usize, coverage: f64) -> usize {
    let max = max_workers.max(1);
    let coverage = if coverage.is_nan() {
        0.0
    } else {
        coverage.clamp(0.0, 1.0)
    };
    let reduction = ((max - 1) as f64 * coverage).floor() as usize;
    (max - reduction).clamp(1, max)
}

/// Summary of a crawl run.
#[derive(Debug, Default)]
pub struct CrawlOutcome {
    pub records: Vec<ScheduleRecord>,
    /// Work items in the run
    pub total: usize,
    /// Items whose fetch ended in an error
    pub failures: usize,
    /// Cache coverage measured before the run
    pub coverage: f64,
    /// Worker pool size used
    pub workers: usize,
}

/// Results and progress, always updated together.
#[derive(Debug, Default)]
struct CrawlState {
    records: Vec<ScheduleRecord>,
    processed: usize,
    failures: usize,
}

/// Everything a worker needs for one run.
struct WorkerContext<'a> {
    fetcher: &'a Fetcher,
    parser: &'a Arc<ScheduleParser>,
    processor: Option<&'a ProcessFn>,
    queue: Mutex<VecDeque<WorkItem>>,
    state: Mutex<CrawlState>,
    total: usize,
    show_progress: bool,
}

/// Service for crawling schedule pages with an adaptive worker pool.
pub struct ScheduleCrawler {
    fetcher: Arc<Fetcher>,
    parser: Arc<ScheduleParser>,
    processor: Option<Arc<ProcessFn>>,
    max_workers: usize,
    show_progress: bool,
}

impl ScheduleCrawler {
    pub fn new(fetcher: Arc<Fetcher>, parser: ScheduleParser, max_workers: usize) -> Self {
        Self {
            fetcher,
            parser: Arc::new(parser),
            processor: None,
            max_workers,
            show_progress: false,
        }
    }

    /// Transform freshly fetched pages before they are cached.
    pub fn with_processor(mut self, processor: Arc<ProcessFn>) -> Self {
        self.processor = Some(processor);
        self
    }

    /// Log every processed page at info level.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Fetch and parse every work item.
    ///
    /// Resolves with the aggregated records once every item is processed, or
    /// with [`AppError::Cancelled`] as soon as `cancel` completes. In-flight
    /// workers are dropped on cancellation and their partial results lost.
    pub async fn run<C>(&self, work: Vec<WorkItem>, cancel: C) -> Result<CrawlOutcome>
    where
        C: Future<Output = ()>,
    {
        let total = work.len();
        let keys: Vec<CacheKey> = work.iter().map(CacheKey::from).collect();
        let coverage = self.fetcher.store().coverage(&keys).await;
        let workers = pool_size(self.max_workers, coverage).min(total.max(1));

        log::info!(
            "Getting {} pages ({:.0}% cached, {} workers)",
            total,
            coverage * 100.0,
            workers
        );

        let ctx = WorkerContext {
            fetcher: &self.fetcher,
            parser: &self.parser,
            processor: self.processor.as_deref(),
            queue: Mutex::new(VecDeque::from(work)),
            state: Mutex::new(CrawlState::default()),
            total,
            show_progress: self.show_progress,
        };

        let shared = &ctx;
        let mut pool = stream::iter(0..workers)
            .map(move |id| worker(id, shared))
            .buffer_unordered(workers);

        let cancelled = tokio::select! {
            _ = async { while pool.next().await.is_some() {} } => false,
            _ = cancel => true,
        };
        drop(pool);

        if cancelled {
            log::warn!("Crawl cancelled, abandoning in-flight pages");
            return Err(AppError::Cancelled);
        }

        let state = ctx.state.into_inner();
        if state.processed != total {
            return Err(AppError::crawl(
                "crawler",
                format!("only {} of {} pages processed", state.processed, total),
            ));
        }

        Ok(CrawlOutcome {
            records: state.records,
            total,
            failures: state.failures,
            coverage,
            workers,
        })
    }
}

async fn worker(id: usize, ctx: &WorkerContext<'_>) {
    loop {
        let Some(item) = ctx.queue.lock().await.pop_front() else {
            log::debug!("Worker {} found the queue empty, exiting", id);
            return;
        };

        let (records, failed) = match ctx.fetcher.fetch(&item, ctx.processor).await {
            Ok(Some(content)) => match parse_off_thread(ctx.parser, content).await {
                Ok(records) => (records, false),
                Err(e) => {
                    log::error!("Parsing {} failed: {}", item.url, e);
                    (Vec::new(), true)
                }
            },
            Ok(None) => {
                log::debug!("No content for {}", item.url);
                (Vec::new(), false)
            }
            Err(e) => {
                log::warn!("Failed to fetch {}: {}", item.url, e);
                (Vec::new(), true)
            }
        };

        let mut state = ctx.state.lock().await;
        state.records.extend(records);
        state.processed += 1;
        if failed {
            state.failures += 1;
        }

        if ctx.show_progress {
            log::info!("Fetched {}/{} pages", state.processed, ctx.total);
        } else {
            log::debug!("Fetched {}/{} pages", state.processed, ctx.total);
        }
    }
}

/// Parse on the blocking pool so pages are parsed in parallel while the
/// fetches stay on the async workers.
async fn parse_off_thread(
    parser: &Arc<ScheduleParser>,
    content: Vec<u8>,
) -> std::result::Result<Vec<ScheduleRecord>, tokio::task::JoinError> {
    let parser = Arc::clone(parser);
    tokio::task::spawn_blocking(move || parser.parse(&content)).await
}
