//! roomscan CLI
//!
//! Crawls schedule pages through the local page cache and answers free-room
//! queries from the resulting index.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use roomscan::{
    error::{AppError, Result},
    models::{Config, Source},
    pipeline::{self, RoomIndex},
    services::{FormQuery, day_code, hour_slot, semester_code},
};

/// roomscan - free room finder
#[derive(Parser, Debug)]
#[command(
    name = "roomscan",
    version,
    about = "Crawl room schedules and find free rooms"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true, default_value = "roomscan.toml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl a source and build the room index
    Crawl {
        /// Content source: syllabus or form
        #[arg(long, default_value = "syllabus")]
        source: Source,

        /// Write the index as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List free rooms of a building at a given slot
    Free {
        #[arg(long)]
        building: String,
        #[arg(long)]
        semester: String,
        #[arg(long)]
        day: String,
        #[arg(long)]
        hour: u8,

        #[arg(long, default_value = "syllabus")]
        source: Source,

        /// Read a saved index instead of crawling
        #[arg(long)]
        index: Option<PathBuf>,
    },

    /// Browse the index: buildings, then semesters, days and hours
    List {
        #[arg(long)]
        building: Option<String>,
        #[arg(long, requires = "building")]
        semester: Option<String>,
        #[arg(long, requires = "semester")]
        day: Option<String>,

        #[arg(long, default_value = "syllabus")]
        source: Source,

        /// Read a saved index instead of crawling
        #[arg(long)]
        index: Option<PathBuf>,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging from the verbosity flag or the configured level.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    log::warn!("Interrupted, cancelling crawl");
}

/// Crawl a source, or load a previously saved index.
async fn obtain_index(
    config: &Config,
    source: Source,
    query: &FormQuery,
    saved: Option<&Path>,
) -> Result<RoomIndex> {
    if let Some(path) = saved {
        log::info!("Loading index from {}", path.display());
        return RoomIndex::load(path).await;
    }

    config.validate()?;
    let fetcher = pipeline::build_fetcher(config).await?;
    let report =
        pipeline::run_slot_crawler(config, fetcher, source, query, interrupted()).await?;
    Ok(report.index)
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = Config::load(&cli.config)
        .map(|c| c.logging.level)
        .unwrap_or_else(|_| "info".to_string());
    init_logging(cli.verbose, &level);

    match cli.command {
        Command::Validate => {
            let config = Config::load(&cli.config)?;
            config.validate()?;
            log::info!("Configuration at {} is valid", cli.config.display());
        }

        Command::Crawl { source, output } => {
            let config = Config::load_or_default(&cli.config);
            config.validate()?;
            let fetcher = pipeline::build_fetcher(&config).await?;
            let report = pipeline::run_crawler(
                &config,
                fetcher,
                source,
                &FormQuery::default(),
                interrupted(),
            )
            .await?;

            if let Some(path) = output {
                report.index.save(&path).await?;
                log::info!("Index saved to {}", path.display());
            }
        }

        Command::Free {
            building,
            semester,
            day,
            hour,
            source,
            index,
        } => {
            // The form endpoint can narrow its occupancy answer to the slot
            let query = match source {
                Source::Form => FormQuery {
                    semester: semester_code(&semester),
                    day: day_code(&day),
                    hour: hour_slot(hour),
                },
                Source::Syllabus => FormQuery::default(),
            };

            let config = Config::load_or_default(&cli.config);
            let index = obtain_index(&config, source, &query, index.as_deref()).await?;
            if !index.rooms.contains_key(&building) {
                return Err(AppError::validation(format!(
                    "unknown building '{building}'"
                )));
            }

            for room in index.free_rooms(&building, &semester, &day, hour) {
                println!("{room}");
            }
        }

        Command::List {
            building,
            semester,
            day,
            source,
            index,
        } => {
            let config = Config::load_or_default(&cli.config);
            let index =
                obtain_index(&config, source, &FormQuery::default(), index.as_deref()).await?;

            let lines: Vec<String> = match (building, semester, day) {
                (Some(b), Some(s), Some(d)) => {
                    index.hours(&b, &s, &d).iter().map(u8::to_string).collect()
                }
                (Some(b), Some(s), None) => index.days(&b, &s).into_iter().map(str::to_string).collect(),
                (Some(b), None, _) => index.semesters(&b).into_iter().map(str::to_string).collect(),
                (None, _, _) => index.buildings().into_iter().map(str::to_string).collect(),
            };
            for line in lines {
                println!("{line}");
            }
        }
    }

    Ok(())
}
