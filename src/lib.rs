// src/lib.rs

//! Room schedule crawler library.
//!
//! Crawls university schedule pages through a persistent page cache and
//! indexes which rooms are free per building, semester, day and hour.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
