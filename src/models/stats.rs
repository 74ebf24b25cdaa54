//! Crawl run statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Totals reported at the end of a crawl run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlStats {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,

    /// Work items in the run
    pub pages: usize,

    /// Items whose fetch ended in an error
    pub failures: usize,

    /// Schedule records parsed
    pub records: usize,

    /// Fraction of work items served from cache, measured before the run
    pub coverage: f64,

    /// Worker pool size
    pub workers: usize,
}

impl CrawlStats {
    /// Wall clock duration of the run.
    pub fn elapsed(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }

    /// Fraction of pages fetched without error.
    pub fn success_rate(&self) -> f64 {
        if self.pages == 0 {
            return 1.0;
        }
        (self.pages - self.failures) as f64 / self.pages as f64
    }
}
