// src/models/mod.rs

//! Domain models for the room scanner.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod layout;
mod record;
mod request;
mod stats;

// Re-export all public types
pub use config::{CacheConfig, Config, CrawlerConfig, LoggingConfig, SourcesConfig};
pub use layout::{ColumnLayout, Source};
pub use record::ScheduleRecord;
pub use request::{Method, Request, WorkItem};
pub use stats::CrawlStats;
