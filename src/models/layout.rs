//! Column layouts and the content sources they belong to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Positional cell mapping for one schedule table format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnLayout {
    /// Layout name for identification
    pub name: String,

    pub semester: usize,
    pub day: usize,
    pub room: usize,
    pub building: usize,

    /// Building, day and semester cells hold visually reversed text
    #[serde(default)]
    pub reversed_labels: bool,
}

impl ColumnLayout {
    /// Per-department syllabus pages.
    pub fn syllabus() -> Self {
        Self {
            name: "syllabus".to_string(),
            semester: 6,
            day: 4,
            room: 3,
            building: 2,
            reversed_labels: true,
        }
    }

    /// Result tables of the search form.
    pub fn form() -> Self {
        Self {
            name: "form".to_string(),
            semester: 0,
            day: 2,
            room: 3,
            building: 4,
            reversed_labels: false,
        }
    }

    /// Rows with fewer cells cannot be mapped.
    pub fn min_cells(&self) -> usize {
        [self.semester, self.day, self.room, self.building]
            .into_iter()
            .max()
            .unwrap_or(0)
            + 1
    }

    /// Normalize a label cell (building, day, semester).
    pub fn label(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        if self.reversed_labels {
            trimmed.chars().rev().collect()
        } else {
            trimmed.to_string()
        }
    }
}

/// Where the work set comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Discovery page + one GET per department code
    #[default]
    Syllabus,
    /// Fixed battery of POSTs against the search form
    Form,
}

impl Source {
    /// Column layout of this source's tables.
    pub fn layout(&self) -> ColumnLayout {
        match self {
            Source::Syllabus => ColumnLayout::syllabus(),
            Source::Form => ColumnLayout::form(),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Syllabus => write!(f, "syllabus"),
            Source::Form => write!(f, "form"),
        }
    }
}

impl FromStr for Source {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "syllabus" => Ok(Source::Syllabus),
            "form" => Ok(Source::Form),
            other => Err(AppError::config(format!("unknown source '{other}'"))),
        }
    }
}
