// src/pipeline/crawl.rs

//! Schedule crawling pipeline.

use std::future::Future;
use std::sync::Arc;

use tokio::pin;

use chrono::Utc;

use crate::error::Result;
use crate::models::{Config, CrawlStats, Source};
use crate::pipeline::RoomIndex;
use crate::services::{
    Fetcher, FormQuery, ProcessFn, RetryPolicy, ScheduleCrawler, ScheduleParser, discover, minify,
};
use crate::storage::LocalCache;
use crate::utils::http::HttpTransport;
use crate::utils::log::{header, summary};

/// Result of a completed crawl.
#[derive(Debug)]
pub struct CrawlReport {
    pub index: RoomIndex,
    pub stats: CrawlStats,
}

/// Build the cache-backed network fetcher described by the configuration.
pub async fn build_fetcher(config: &Config) -> Result<Arc<Fetcher>> {
    let cache = LocalCache::open(&config.cache.dir, config.cache.max_age()).await?;
    let transport = HttpTransport::new(&config.crawler)?;
    Ok(Arc::new(Fetcher::new(
        Arc::new(cache),
        Arc::new(transport),
        RetryPolicy::from(&config.crawler),
    )))
}

/// Discover, fetch and parse every page of a source, then index the records.
///
/// Resolves with [`crate::error::AppError::Cancelled`] if `cancel` completes
/// first.
pub async fn run_crawler<C>(
    config: &Config,
    fetcher: Arc<Fetcher>,
    source: Source,
    query: &FormQuery,
    cancel: C,
) -> Result<CrawlReport>
where
    C: Future<Output = ()>,
{
    let start_time = Utc::now();
    header(&format!("Crawling {} schedules", source));

    let work = discover(&fetcher, &config.sources, source, query).await?;
    log::info!("Discovered {} pages", work.len());

    let parser = ScheduleParser::new(source.layout())?;
    let mut crawler = ScheduleCrawler::new(Arc::clone(&fetcher), parser, config.crawler.max_workers)
        .with_progress(config.logging.show_progress);
    if source == Source::Form {
        let processor: Arc<ProcessFn> = Arc::new(minify);
        crawler = crawler.with_processor(processor);
    }

    let outcome = crawler.run(work, cancel).await?;
    let index = RoomIndex::build(&outcome.records);

    let stats = CrawlStats {
        start_time,
        end_time: Utc::now(),
        pages: outcome.total,
        failures: outcome.failures,
        records: outcome.records.len(),
        coverage: outcome.coverage,
        workers: outcome.workers,
    };

    summary(
        "Crawl complete",
        &[
            ("Pages", stats.pages.to_string()),
            ("Failures", stats.failures.to_string()),
            ("Success rate", format!("{:.1}%", stats.success_rate() * 100.0)),
            ("Records", stats.records.to_string()),
            ("Buildings", index.buildings().len().to_string()),
            ("Rooms", index.room_count().to_string()),
            ("Cache coverage", format!("{:.1}%", stats.coverage * 100.0)),
            ("Workers", stats.workers.to_string()),
            ("Elapsed", format!("{}s", stats.elapsed().num_seconds())),
        ],
    );

    Ok(CrawlReport { index, stats })
}

/// Crawl for a free-room query on one slot.
///
/// The form source can narrow its answer to a semester, day and hour slot,
/// but a narrowed answer only lists rooms booked in that slot. The room
/// registry is therefore taken from an unfiltered crawl and only the
/// occupancy from the narrowed one. Without a filter this is a plain
/// [`run_crawler`].
pub async fn run_slot_crawler<C>(
    config: &Config,
    fetcher: Arc<Fetcher>,
    source: Source,
    query: &FormQuery,
    cancel: C,
) -> Result<CrawlReport>
where
    C: Future<Output = ()>,
{
    if source != Source::Form || *query == FormQuery::default() {
        return run_crawler(config, fetcher, source, query, cancel).await;
    }

    pin!(cancel);
    let all = run_crawler(
        config,
        Arc::clone(&fetcher),
        source,
        &FormQuery::default(),
        cancel.as_mut(),
    )
    .await?;
    let mut slot = run_crawler(config, fetcher, source, query, cancel.as_mut()).await?;

    slot.index.extend_rooms(&all.index.rooms);
    slot.stats = CrawlStats {
        start_time: all.stats.start_time,
        end_time: slot.stats.end_time,
        pages: all.stats.pages + slot.stats.pages,
        failures: all.stats.failures + slot.stats.failures,
        records: all.stats.records + slot.stats.records,
        coverage: (all.stats.coverage * all.stats.pages as f64
            + slot.stats.coverage * slot.stats.pages as f64)
            / (all.stats.pages + slot.stats.pages).max(1) as f64,
        workers: all.stats.workers.max(slot.stats.workers),
    };
    Ok(slot)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::error::AppError;
    use crate::models::SourcesConfig;
    use crate::services::testing::{ScriptedTransport, fast_retry};
    use crate::services::{day_code, hour_slot, semester_code};
    use tempfile::TempDir;

    fn config(tmp: &TempDir) -> Config {
        let mut config = Config::default();
        config.cache.dir = tmp.path().to_path_buf();
        config.crawler.max_workers = 4;
        config.sources = SourcesConfig {
            discovery_url: "http://uni.test/list".to_string(),
            syllabus_url: "http://uni.test/dep?d={dep}&y={year}".to_string(),
            form_url: "http://uni.test/form".to_string(),
            year: Some("2016".to_string()),
        };
        config
    }

    async fn fetcher(config: &Config, transport: ScriptedTransport) -> Arc<Fetcher> {
        let cache = LocalCache::open(&config.cache.dir, config.cache.max_age())
            .await
            .unwrap();
        Arc::new(Fetcher::new(
            Arc::new(cache),
            Arc::new(transport),
            fast_retry(2),
        ))
    }

    #[tokio::test]
    async fn test_syllabus_crawl_end_to_end() {
        let tmp = TempDir::new().unwrap();
        let config = config(&tmp);

        let transport = ScriptedTransport::new()
            .page(
                "http://uni.test/list",
                r#"<select><option value="00010002"></option></select>"#,
            )
            .page(
                "http://uni.test/dep?d=0001&y=2016",
                "<table>\
                 <tr><td>c1</td><td>1000-1200</td><td>namliG</td><td>101</td><td>noM</td><td></td><td>A</td></tr>\
                 <tr><td>c2</td><td>0800-0900</td><td>namliG</td><td>102</td><td>euT</td><td></td><td>A</td></tr>\
                 </table>",
            )
            .page(
                "http://uni.test/dep?d=0002&y=2016",
                "<table><tr><td>c3</td><td>1400-1600</td><td>namliG</td><td>103</td><td>noM</td><td></td><td>A</td></tr></table>",
            );
        let fetcher = fetcher(&config, transport).await;

        let report = run_crawler(
            &config,
            fetcher,
            Source::Syllabus,
            &FormQuery::default(),
            std::future::pending(),
        )
        .await
        .unwrap();

        assert_eq!(report.stats.pages, 2);
        assert_eq!(report.stats.records, 3);
        assert_eq!(report.stats.failures, 0);
        assert!(report.stats.end_time >= report.stats.start_time);

        let free = report.index.free_rooms("Gilman", "A", "Mon", 10);
        let expected: BTreeSet<String> = ["102", "103"].iter().map(|s| s.to_string()).collect();
        assert_eq!(free, expected);
    }

    #[tokio::test]
    async fn test_form_crawl_minifies_before_caching() {
        let tmp = TempDir::new().unwrap();
        let config = config(&tmp);

        // Every POST to the form endpoint gets the same answer
        let transport = ScriptedTransport::new().page(
            "http://uni.test/form",
            "<table>\n<tr><td class=\"x\">א</td><td>1000-1200</td><td>ב</td><td>101</td><td>&nbsp;Gilman</td></tr></table>",
        );
        let fetcher = fetcher(&config, transport).await;

        let report = run_crawler(
            &config,
            Arc::clone(&fetcher),
            Source::Form,
            &FormQuery::default(),
            std::future::pending(),
        )
        .await
        .unwrap();

        assert_eq!(report.stats.pages, 5);
        assert_eq!(report.stats.records, 5);
        assert_eq!(report.index.buildings(), vec!["Gilman"]);

        let cached = std::fs::read_to_string(tmp.path().join("1")).unwrap();
        assert!(!cached.contains("class="));
        assert!(!cached.contains("&nbsp;"));
    }

    #[tokio::test]
    async fn test_slot_query_keeps_rooms_free_in_that_slot() {
        let tmp = TempDir::new().unwrap();
        let config = config(&tmp);

        let row = |start: &str, end: &str, room: &str| {
            format!("<tr><td>א</td><td>{start}-{end}</td><td>ב</td><td>{room}</td><td>Gilman</td></tr>")
        };
        let unfiltered = format!(
            "<table>{}{}</table>",
            row("1400", "1500", "101"),
            row("0800", "0900", "102")
        );
        let filtered = format!("<table>{}</table>", row("1400", "1500", "101"));

        // The form narrows its answer when an hour slot is sent
        let transport = ScriptedTransport::new().respond_with(move |request| {
            let narrowed = request.params.iter().any(|(name, _)| name == "hour");
            let body = if narrowed { &filtered } else { &unfiltered };
            Some(Ok(body.clone().into_bytes()))
        });
        let fetcher = fetcher(&config, transport).await;

        let query = FormQuery {
            semester: semester_code("א"),
            day: day_code("ב"),
            hour: hour_slot(14),
        };
        let report = run_slot_crawler(
            &config,
            fetcher,
            Source::Form,
            &query,
            std::future::pending(),
        )
        .await
        .unwrap();

        let free = report.index.free_rooms("Gilman", "א", "ב", 14);
        let expected: BTreeSet<String> = ["102".to_string()].into_iter().collect();
        assert_eq!(free, expected);
        assert_eq!(report.stats.pages, 10);
    }

    #[tokio::test]
    async fn test_slot_crawl_without_filter_is_single_pass() {
        let tmp = TempDir::new().unwrap();
        let config = config(&tmp);
        let transport = ScriptedTransport::new().page(
            "http://uni.test/form",
            "<table><tr><td>א</td><td>1000-1200</td><td>ב</td><td>101</td><td>Gilman</td></tr></table>",
        );
        let fetcher = fetcher(&config, transport).await;

        let report = run_slot_crawler(
            &config,
            fetcher,
            Source::Form,
            &FormQuery::default(),
            std::future::pending(),
        )
        .await
        .unwrap();
        assert_eq!(report.stats.pages, 5);
    }

    #[tokio::test]
    async fn test_discovery_failure_aborts_run() {
        let tmp = TempDir::new().unwrap();
        let config = config(&tmp);
        let fetcher = fetcher(&config, ScriptedTransport::new()).await;

        let result = run_crawler(
            &config,
            fetcher,
            Source::Syllabus,
            &FormQuery::default(),
            std::future::pending(),
        )
        .await;
        assert!(matches!(result, Err(AppError::Discovery(_))));
    }

    #[tokio::test]
    async fn test_build_fetcher_opens_cache_dir() {
        let tmp = TempDir::new().unwrap();
        let mut config = config(&tmp);
        config.cache.dir = tmp.path().join("nested/cache");

        let fetcher = build_fetcher(&config).await.unwrap();
        assert!(config.cache.dir.is_dir());
        assert_eq!(fetcher.store().coverage(&[]).await, 1.0);
    }
}
