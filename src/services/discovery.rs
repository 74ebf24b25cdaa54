// src/services/discovery.rs

//! Work set discovery.
//!
//! The syllabus source lists department codes on a static page; each code
//! becomes one GET. The form source needs no discovery: it is a fixed
//! battery of POSTs that pages through the department groups.

use std::collections::BTreeSet;

use scraper::{Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{Request, Source, SourcesConfig, WorkItem};
use crate::services::Fetcher;

/// Length of a department code.
const CODE_LEN: usize = 4;

/// Department group toggles sent with the first form request.
const DEPARTMENT_GROUPS: [(&str, &str); 13] = [
    ("department1", "08"),
    ("department2", "05"),
    ("department3", "10"),
    ("department4", "04"),
    ("department5", "06"),
    ("department6", "03"),
    ("department7", "14"),
    ("department8", "12"),
    ("department9", "01"),
    ("department10", "11"),
    ("department11", "21712172"),
    ("department12", "188018821883"),
    ("department13", "1843"),
];

/// Values cycled through `department10` once the group toggles are cleared.
const EXTRA_GROUP_10: [&str; 4] = ["11", "07", "09", "15"];

/// Optional slot filter for form requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormQuery {
    pub semester: Option<u8>,
    pub day: Option<u8>,
    /// Hour slot code, see [`hour_slot`]
    pub hour: Option<u8>,
}

/// Build the full work set for a source.
pub async fn discover(
    fetcher: &Fetcher,
    sources: &SourcesConfig,
    source: Source,
    query: &FormQuery,
) -> Result<Vec<WorkItem>> {
    match source {
        Source::Syllabus => {
            let page = fetcher
                .fetch(&Request::get(&sources.discovery_url), None)
                .await?
                .ok_or_else(|| {
                    AppError::discovery(format!(
                        "no content at discovery page {}",
                        sources.discovery_url
                    ))
                })?;

            let codes = department_codes(&String::from_utf8_lossy(&page))?;
            if codes.is_empty() {
                return Err(AppError::discovery(format!(
                    "no department codes found at {}",
                    sources.discovery_url
                )));
            }
            log::info!("Found {} department codes", codes.len());

            Ok(codes
                .iter()
                .map(|code| Request::get(sources.syllabus_url_for(code)))
                .collect())
        }
        Source::Form => Ok(form_requests(
            &sources.form_url,
            sources.year.as_deref().unwrap_or(""),
            query,
        )),
    }
}

/// Department codes listed in `<option value>` attributes.
///
/// A value may pack several codes back to back; incomplete trailing chunks
/// are ignored. The result is deduplicated and sorted.
pub fn department_codes(html: &str) -> Result<Vec<String>> {
    let selector = Selector::parse("option")
        .map_err(|e| AppError::selector("option", format!("{e:?}")))?;
    let document = Html::parse_document(html);

    let mut codes = BTreeSet::new();
    for option in document.select(&selector) {
        let Some(value) = option.value().attr("value") else {
            continue;
        };
        let chars: Vec<char> = value.chars().collect();
        for chunk in chars.chunks(CODE_LEN) {
            if chunk.len() == CODE_LEN {
                codes.insert(chunk.iter().collect::<String>());
            }
        }
    }
    Ok(codes.into_iter().collect())
}

/// Every POST needed to page through the search form.
pub fn form_requests(url: &str, year: &str, query: &FormQuery) -> Vec<Request> {
    let mut requests = vec![Request::post(url, form_fields(year, query, None))];
    for value in EXTRA_GROUP_10 {
        requests.push(Request::post(url, form_fields(year, query, Some(value))));
    }
    requests
}

/// Field set for one form request.
///
/// With `group_10 == None` every department group toggle is set; otherwise
/// all toggles are blank except `department10`.
fn form_fields(year: &str, query: &FormQuery, group_10: Option<&str>) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = Vec::new();
    let mut push = |name: &str, value: &str| fields.push((name.to_string(), value.to_string()));

    let toggle = |name: &str, value: &'static str| -> String {
        match group_10 {
            None => value.to_string(),
            Some(v) if name == "department10" => v.to_string(),
            Some(_) => String::new(),
        }
    };

    push("MfcISAPICommand", "but");
    push("year", year);
    if let Some(semester) = query.semester {
        push("semester", &semester.to_string());
    }
    if let Some(hour) = query.hour {
        push("hour", &hour.to_string());
    }
    if let Some(day) = query.day {
        push("yom", &day.to_string());
    }
    for &(name, value) in &DEPARTMENT_GROUPS[..7] {
        push(name, &toggle(name, value));
    }
    push("course_nam", "");
    push("teach_nam", "");
    for &(name, value) in &DEPARTMENT_GROUPS[7..] {
        push(name, &toggle(name, value));
    }
    fields
}

/// Form code for a day token (`א` = Sunday ... `ו` = Friday).
pub fn day_code(token: &str) -> Option<u8> {
    match token.trim() {
        "א" => Some(1),
        "ב" => Some(2),
        "ג" => Some(3),
        "ד" => Some(4),
        "ה" => Some(5),
        "ו" => Some(6),
        _ => None,
    }
}

/// Form code for a semester token.
pub fn semester_code(token: &str) -> Option<u8> {
    match token.trim() {
        "א" => Some(1),
        "ב" => Some(2),
        "קיץ" => Some(3),
        _ => None,
    }
}

/// Form slot containing a whole hour.
pub fn hour_slot(hour: u8) -> Option<u8> {
    match hour {
        7..=9 => Some(1),
        10..=11 => Some(2),
        12..=13 => Some(3),
        14..=15 => Some(4),
        16..=17 => Some(5),
        18..=19 => Some(6),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::services::testing::{ScriptedTransport, fast_retry};
    use crate::storage::LocalCache;
    use tempfile::TempDir;

    fn field<'a>(fields: &'a [(String, String)], name: &str) -> Option<&'a str> {
        fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_department_codes() {
        let html = r#"
            <select>
              <option value="">all</option>
              <option value="03210322">math</option>
              <option value="0321">math again</option>
              <option value="10611">with tail</option>
              <option>no value</option>
            </select>"#;

        let codes = department_codes(html).unwrap();
        assert_eq!(codes, vec!["0321", "0322", "1061"]);
    }

    #[test]
    fn test_form_requests() {
        let requests = form_requests("http://example.com/form.dll", "", &FormQuery::default());
        assert_eq!(requests.len(), 5);

        let first = &requests[0].params;
        assert_eq!(field(first, "department1"), Some("08"));
        assert_eq!(field(first, "department13"), Some("1843"));
        assert_eq!(field(first, "semester"), None);

        for (request, expected) in requests[1..].iter().zip(EXTRA_GROUP_10) {
            assert_eq!(field(&request.params, "department1"), Some(""));
            assert_eq!(field(&request.params, "department10"), Some(expected));
        }
    }

    #[test]
    fn test_form_query_fields() {
        let query = FormQuery {
            semester: semester_code("ב"),
            day: day_code("ג"),
            hour: hour_slot(14),
        };
        let requests = form_requests("http://example.com/form.dll", "2016", &query);
        let fields = &requests[0].params;

        assert_eq!(field(fields, "year"), Some("2016"));
        assert_eq!(field(fields, "semester"), Some("2"));
        assert_eq!(field(fields, "yom"), Some("3"));
        assert_eq!(field(fields, "hour"), Some("4"));
    }

    #[test]
    fn test_codes() {
        assert_eq!(day_code("ו"), Some(6));
        assert_eq!(day_code("ז"), None);
        assert_eq!(semester_code("קיץ"), Some(3));
        assert_eq!(hour_slot(9), Some(1));
        assert_eq!(hour_slot(19), Some(6));
        assert_eq!(hour_slot(20), None);
    }

    #[tokio::test]
    async fn test_discover_syllabus() {
        let tmp = TempDir::new().unwrap();
        let sources = SourcesConfig::default();
        let transport = ScriptedTransport::new().page(
            &sources.discovery_url,
            r#"<select><option value="03210322"></option></select>"#,
        );
        let cache = LocalCache::open(tmp.path(), Duration::from_secs(60))
            .await
            .unwrap();
        let fetcher = Fetcher::new(Arc::new(cache), Arc::new(transport), fast_retry(1));

        let work = discover(&fetcher, &sources, Source::Syllabus, &FormQuery::default())
            .await
            .unwrap();
        let urls: Vec<_> = work.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "http://www2.tau.ac.il/yedion/syllabus/?deployment=10&dep=0321&year=",
                "http://www2.tau.ac.il/yedion/syllabus/?deployment=10&dep=0322&year=",
            ]
        );
    }

    #[tokio::test]
    async fn test_discover_fails_without_discovery_page() {
        let tmp = TempDir::new().unwrap();
        let cache = LocalCache::open(tmp.path(), Duration::from_secs(60))
            .await
            .unwrap();
        let fetcher = Fetcher::new(
            Arc::new(cache),
            Arc::new(ScriptedTransport::new()),
            fast_retry(1),
        );

        let result = discover(
            &fetcher,
            &SourcesConfig::default(),
            Source::Syllabus,
            &FormQuery::default(),
        )
        .await;
        assert!(matches!(result, Err(AppError::Discovery(_))));
    }
}
