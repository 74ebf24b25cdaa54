//! Room registry and occupancy index.
//!
//! Built once per crawl from the full record set:
//!
//! > `rooms`: building -> every room ever seen there
//! >
//! > `occupancy`: building -> semester -> day -> hour -> occupied rooms
//!
//! Every `(building, semester, day)` triple with at least one record carries
//! all hours from [`FIRST_HOUR`] to [`LAST_HOUR`], so "nothing booked" is an
//! empty list rather than a missing key.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::ScheduleRecord;

/// First indexed hour.
pub const FIRST_HOUR: u8 = 7;

/// Last indexed hour.
pub const LAST_HOUR: u8 = 20;

/// Building -> set of known rooms.
pub type RoomRegistry = BTreeMap<String, BTreeSet<String>>;

/// Hour -> occupied rooms, in record order.
pub type HourSlots = BTreeMap<u8, Vec<String>>;

/// Building -> semester -> day -> hour -> occupied rooms.
pub type OccupancyIndex = BTreeMap<String, BTreeMap<String, BTreeMap<String, HourSlots>>>;

/// Queryable room index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomIndex {
    pub rooms: RoomRegistry,
    pub occupancy: OccupancyIndex,
}

impl RoomIndex {
    /// Build the index from aggregated records.
    pub fn build<'a>(records: impl IntoIterator<Item = &'a ScheduleRecord>) -> Self {
        let mut index = Self::default();
        for record in records {
            index.add(record);
        }
        index
    }

    fn add(&mut self, record: &ScheduleRecord) {
        self.rooms
            .entry(record.building.clone())
            .or_default()
            .insert(record.room.clone());

        let slots = self
            .occupancy
            .entry(record.building.clone())
            .or_default()
            .entry(record.semester.clone())
            .or_default()
            .entry(record.day.clone())
            .or_insert_with(|| (FIRST_HOUR..=LAST_HOUR).map(|h| (h, Vec::new())).collect());

        for hour in record.hours() {
            slots.entry(hour).or_default().push(record.room.clone());
        }
    }

    /// Add every room of another registry to this one.
    ///
    /// Used when occupancy comes from a slot-filtered crawl but the set of
    /// known rooms must come from an unfiltered one.
    pub fn extend_rooms(&mut self, rooms: &RoomRegistry) {
        for (building, known) in rooms {
            self.rooms
                .entry(building.clone())
                .or_default()
                .extend(known.iter().cloned());
        }
    }

    /// Rooms of a building not occupied at the given slot.
    ///
    /// A slot missing from the index counts as fully free. An unknown
    /// building has no rooms.
    pub fn free_rooms(&self, building: &str, semester: &str, day: &str, hour: u8) -> BTreeSet<String> {
        let Some(rooms) = self.rooms.get(building) else {
            return BTreeSet::new();
        };
        let occupied = self.occupied(building, semester, day, hour);
        rooms
            .iter()
            .filter(|room| !occupied.contains(room))
            .cloned()
            .collect()
    }

    /// Occupied rooms at a slot, empty when the slot is not indexed.
    pub fn occupied(&self, building: &str, semester: &str, day: &str, hour: u8) -> &[String] {
        self.occupancy
            .get(building)
            .and_then(|semesters| semesters.get(semester))
            .and_then(|days| days.get(day))
            .and_then(|hours| hours.get(&hour))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Known buildings, sorted.
    pub fn buildings(&self) -> Vec<&str> {
        self.rooms.keys().map(String::as_str).collect()
    }

    /// Semesters indexed for a building, sorted.
    pub fn semesters(&self, building: &str) -> Vec<&str> {
        self.occupancy
            .get(building)
            .map(|s| s.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Days indexed for a building and semester, sorted.
    pub fn days(&self, building: &str, semester: &str) -> Vec<&str> {
        self.occupancy
            .get(building)
            .and_then(|s| s.get(semester))
            .map(|d| d.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Hours indexed for a slot, ascending.
    pub fn hours(&self, building: &str, semester: &str, day: &str) -> Vec<u8> {
        self.occupancy
            .get(building)
            .and_then(|s| s.get(semester))
            .and_then(|d| d.get(day))
            .map(|h| h.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Distinct rooms across all buildings.
    pub fn room_count(&self) -> usize {
        self.rooms.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Write the index as pretty JSON.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Read an index written by [`RoomIndex::save`].
    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&json)?)
    }
}
