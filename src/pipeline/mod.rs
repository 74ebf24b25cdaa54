//! Pipeline entry points.
//!
//! - `run_crawler`: discover, fetch and parse one source into a `RoomIndex`
//! - `run_slot_crawler`: the same for one semester/day/hour slot
//! - `RoomIndex`: room registry plus occupancy index, answers free-room queries

pub mod crawl;
pub mod index;

pub use crawl::{CrawlReport, build_fetcher, run_crawler, run_slot_crawler};
pub use index::{FIRST_HOUR, LAST_HOUR, OccupancyIndex, RoomIndex, RoomRegistry};
