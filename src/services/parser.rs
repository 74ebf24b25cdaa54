// src/services/parser.rs

//! Schedule table parser.
//!
//! A row is a schedule row when one of its cells contains an `HHMM-HHMM`
//! span inside operating hours. Building, room, day and semester are then
//! read from fixed cell positions given by a [`ColumnLayout`]. Anything
//! else is skipped silently, so heterogeneous markup around the tables does
//! not matter.

use std::ops::RangeInclusive;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{ColumnLayout, ScheduleRecord};

/// Earliest accepted time (exclusive).
pub const DAY_START: &str = "0700";

/// Latest accepted time (exclusive).
pub const DAY_END: &str = "2100";

static TIME_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})\s*-\s*(\d{4})").expect("static regex"));

/// Parser for one column layout.
pub struct ScheduleParser {
    layout: ColumnLayout,
    row_sel: Selector,
    cell_sel: Selector,
}

impl ScheduleParser {
    pub fn new(layout: ColumnLayout) -> Result<Self> {
        Ok(Self {
            layout,
            row_sel: parse_selector("tr")?,
            cell_sel: parse_selector("td")?,
        })
    }

    /// Extract every schedule record from a page.
    pub fn parse(&self, raw: &[u8]) -> Vec<ScheduleRecord> {
        let html = String::from_utf8_lossy(raw);
        let document = Html::parse_document(&html);

        document
            .select(&self.row_sel)
            .filter_map(|row| {
                let cells: Vec<String> = row
                    .select(&self.cell_sel)
                    .map(|cell| cell.text().collect())
                    .collect();
                self.parse_row(&cells)
            })
            .collect()
    }

    /// Map one row's cell texts to a record.
    pub fn parse_row(&self, cells: &[String]) -> Option<ScheduleRecord> {
        let (start, end) = find_time_span(cells)?;
        if cells.len() < self.layout.min_cells() {
            return None;
        }

        let building = self.layout.label(&cells[self.layout.building]);
        let room = cells[self.layout.room].trim().to_string();
        if building.is_empty() || room.is_empty() {
            return None;
        }

        Some(ScheduleRecord {
            building,
            room,
            day: self.layout.label(&cells[self.layout.day]),
            semester: self.layout.label(&cells[self.layout.semester]),
            start,
            end,
        })
    }
}

/// First in-range `HHMM-HHMM` span found in the cells.
pub fn find_time_span(cells: &[String]) -> Option<(String, String)> {
    cells.iter().find_map(|text| {
        let caps = TIME_SPAN.captures(text)?;
        let (start, end) = (&caps[1], &caps[2]);
        let in_range = |t: &str| DAY_START < t && t < DAY_END;
        (in_range(start) && in_range(end)).then(|| (start.to_string(), end.to_string()))
    })
}

/// Whole hours occupied by a slot.
///
/// A slot ending exactly on the hour does not occupy that hour:
/// `1630-1800` covers 16 and 17, `1600-1830` covers 16, 17 and 18.
/// Unparseable times give an empty range.
pub fn normalize_hours(start: &str, end: &str) -> RangeInclusive<u8> {
    let (Some(a), Some(b)) = (parse_time(start), parse_time(end)) else {
        return RangeInclusive::new(1, 0);
    };
    let (start, end) = if a <= b { (a, b) } else { (b, a) };

    let first = (start / 100) as u8;
    let mut last = (end / 100) as u8;
    if end % 100 == 0 {
        last = last.saturating_sub(1);
    }
    first..=last
}

fn parse_time(s: &str) -> Option<u16> {
    let s = s.trim();
    if s.len() != 4 {
        return None;
    }
    s.parse().ok()
}

/// Strip markup noise from search form responses before caching.
pub fn minify(raw: &[u8]) -> Vec<u8> {
    static NOISE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
        [
            r"(?s)<a .*?</a>",
            r"(?s)<img .*?>",
            r"(?s)<th .*?</th>",
            r#"colspan=".*?""#,
            r#"class=".*?""#,
            r#"bgcolor=".*?""#,
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static regex"))
        .collect()
    });

    let mut html = String::from_utf8_lossy(raw)
        .replace("<A ", "<a ")
        .replace("</A>", "</a>")
        .replace("&nbsp;", "")
        .replace('\n', "");

    for pattern in NOISE.iter() {
        html = pattern.replace_all(&html, "").into_owned();
    }

    html.replace("align=\"right\"", "")
        .replace("dir=\"rtl\"", "")
        .replace("align =\"right\"", "")
        .replace("  ", " ")
        .into_bytes()
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn table(rows: &[&[&str]]) -> Vec<u8> {
        let mut html = String::from("<html><body><table>");
        for row in rows {
            html.push_str("<tr>");
            for cell in *row {
                html.push_str(&format!("<td>{cell}</td>"));
            }
            html.push_str("</tr>");
        }
        html.push_str("</table></body></html>");
        html.into_bytes()
    }

    #[test]
    fn test_normalize_hours() {
        assert_eq!(normalize_hours("1630", "1800").collect::<Vec<_>>(), vec![16, 17]);
        assert_eq!(
            normalize_hours("1600", "1830").collect::<Vec<_>>(),
            vec![16, 17, 18]
        );
        assert_eq!(normalize_hours("1800", "1630").collect::<Vec<_>>(), vec![16, 17]);
        assert_eq!(normalize_hours("0800", "0900").collect::<Vec<_>>(), vec![8]);
        assert!(normalize_hours("xx", "0900").is_empty());
    }

    #[test]
    fn test_find_time_span() {
        assert_eq!(
            find_time_span(&cells(&["Mon", "1630 - 1800"])),
            Some(("1630".to_string(), "1800".to_string()))
        );
        assert_eq!(
            find_time_span(&cells(&["1630-1800"])),
            Some(("1630".to_string(), "1800".to_string()))
        );
        assert_eq!(find_time_span(&cells(&["0600-0800"])), None);
        assert_eq!(find_time_span(&cells(&["2000-2100"])), None);
        assert_eq!(find_time_span(&cells(&["no time here"])), None);
    }

    #[test]
    fn test_out_of_range_cell_does_not_hide_later_span() {
        assert_eq!(
            find_time_span(&cells(&["0600-0800", "1000-1200"])),
            Some(("1000".to_string(), "1200".to_string()))
        );
    }

    #[test]
    fn test_parse_form_layout() {
        let parser = ScheduleParser::new(ColumnLayout::form()).unwrap();
        let page = table(&[
            &["א", "1000-1200", "ב", "101", "Gilman"],
            &["א", "0600-0800", "ב", "102", "Gilman"],
            &["א", "1400-1600", "ג", "103", "   "],
            &["header", "only"],
        ]);

        let records = parser.parse(&page);
        assert_eq!(
            records,
            vec![ScheduleRecord {
                building: "Gilman".to_string(),
                room: "101".to_string(),
                day: "ב".to_string(),
                semester: "א".to_string(),
                start: "1000".to_string(),
                end: "1200".to_string(),
            }]
        );
    }

    #[test]
    fn test_parse_syllabus_layout_reverses_labels() {
        let parser = ScheduleParser::new(ColumnLayout::syllabus()).unwrap();
        let page = table(&[&[
            "course", "1630 - 1800", "namliG", " 204 ", "noM", "x", "2",
        ]]);

        let records = parser.parse(&page);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].building, "Gilman");
        assert_eq!(records[0].room, "204");
        assert_eq!(records[0].day, "Mon");
        assert_eq!(records[0].semester, "2");
        assert_eq!(records[0].hours().collect::<Vec<_>>(), vec![16, 17]);
    }

    #[test]
    fn test_short_rows_are_dropped() {
        let parser = ScheduleParser::new(ColumnLayout::syllabus()).unwrap();
        assert!(parser.parse_row(&cells(&["1000-1200", "Gilman", "101"])).is_none());
    }

    #[test]
    fn test_minify() {
        let raw = b"<TD class=\"x\" align=\"right\">a&nbsp;b</TD>\n<A href=\"#\">link</A><img src=\"y.png\">";
        let out = String::from_utf8(minify(raw)).unwrap();
        assert_eq!(out, "<TD >ab</TD>");
    }
}
