//! Service layer for the room scanner.
//!
//! This module contains the business logic for:
//! - Cache-first page fetching (`Fetcher`)
//! - Schedule table parsing (`ScheduleParser`)
//! - Work set discovery (`discover`)
//! - Concurrent crawling (`ScheduleCrawler`)

mod crawler;
mod discovery;
mod fetcher;
mod parser;
#[cfg(test)]
pub(crate) mod testing;

pub use crawler::{CrawlOutcome, ScheduleCrawler, pool_size};
pub use discovery::{
    FormQuery, day_code, department_codes, discover, form_requests, hour_slot, semester_code,
};
pub use fetcher::{Fetcher, ProcessFn, RetryPolicy, Transport, TransportError};
pub use parser::{DAY_END, DAY_START, ScheduleParser, find_time_span, minify, normalize_hours};
