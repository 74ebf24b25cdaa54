//! Schedule row data structure.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::services::normalize_hours;

/// One occupied slot extracted from a schedule row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    /// Building name, never empty
    pub building: String,

    /// Room identifier, never empty
    pub room: String,

    /// Day token as printed by the source
    pub day: String,

    /// Semester token as printed by the source
    pub semester: String,

    /// Start time, `HHMM`
    pub start: String,

    /// End time, `HHMM`
    pub end: String,
}

impl ScheduleRecord {
    /// Whole hours this slot occupies.
    pub fn hours(&self) -> RangeInclusive<u8> {
        normalize_hours(&self.start, &self.end)
    }
}
