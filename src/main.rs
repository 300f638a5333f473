//! Catalog-Crawler main entry point
//!
//! This is the command-line interface for the catalog crawler.

use anyhow::Context;
use catalog_crawler::config::{load_config_with_hash, validate, Config};
use catalog_crawler::crawler::SearchQuery;
use catalog_crawler::thumbnails::ThumbnailDownloader;
use catalog_crawler::{
    Crawler, FetchMode, Lookup, ReqwestCatalogClient, VideoId, VideoIdSequence,
};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Catalog-Crawler: an early-stopping crawler for video catalogs
///
/// Walks the catalog by id or by search page, normalizes every record and
/// stops as soon as the responses say there is nothing more worth fetching.
#[derive(Parser, Debug)]
#[command(name = "catalog-crawler")]
#[command(version)]
#[command(about = "An early-stopping video catalog crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults are used when omitted)
    #[arg(long, global = true, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Look up consecutive video ids starting at an offset
    Crawl(CrawlArgs),

    /// Fetch search result pages 1..=N
    Search(SearchArgs),

    /// Look up a single video
    Get {
        /// Video id (decimal, ending in the marker digit 1)
        video_id: VideoId,
    },

    /// Download thumbnails and print their hash and encoded size
    Thumbs {
        /// Thumbnail URLs
        #[arg(required = true)]
        urls: Vec<String>,

        /// Maximum simultaneous downloads
        #[arg(long, default_value_t = 10)]
        max_concurrency: usize,
    },
}

#[derive(Args, Debug)]
struct ModeArgs {
    /// Issue requests concurrently, with retries
    #[arg(long)]
    concurrent: bool,

    /// Maximum simultaneous requests in concurrent mode (overrides config)
    #[arg(long, requires = "concurrent")]
    max_concurrency: Option<usize>,

    /// Write results to this file instead of stdout
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// Seed video id
    #[arg(short, long)]
    offset: VideoId,

    /// Number of ids to look up (unbounded when omitted)
    #[arg(short, long)]
    n_videos: Option<usize>,

    /// Walk towards lower ids, excluding the seed
    #[arg(long)]
    descending: bool,

    /// Stop at records published before this instant (RFC 3339)
    #[arg(long)]
    since: Option<String>,

    /// Stop at records published at or after this instant (RFC 3339)
    #[arg(long)]
    until: Option<String>,

    /// Stop after this many consecutive failed lookups
    #[arg(long)]
    failure_patience: Option<u32>,

    #[command(flatten)]
    mode: ModeArgs,
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Number of pages to fetch
    #[arg(short, long)]
    n_pages: u32,

    /// Free-text search query
    #[arg(long)]
    query: Option<String>,

    /// Sort order
    #[arg(long)]
    order: Option<String>,

    /// Results per page
    #[arg(long)]
    per_page: Option<u32>,

    #[command(flatten)]
    mode: ModeArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut config = load(cli.config.as_deref())?;

    match cli.command {
        Command::Crawl(args) => handle_crawl(&mut config, args).await,
        Command::Search(args) => handle_search(&mut config, args).await,
        Command::Get { video_id } => handle_get(&config, video_id).await,
        Command::Thumbs {
            urls,
            max_concurrency,
        } => handle_thumbs(&config, &urls, max_concurrency).await,
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_crawler=info,warn"),
            1 => EnvFilter::new("catalog_crawler=debug,info"),
            2 => EnvFilter::new("catalog_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the configuration file, or the defaults when none is given
fn load(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        tracing::debug!("No configuration file given, using defaults");
        return Ok(Config::default());
    };

    tracing::info!("Loading configuration from: {}", path.display());
    let (config, hash) = load_config_with_hash(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);
    Ok(config)
}

/// Builds a crawler for the validated configuration and the requested mode
fn build_crawler(
    config: &Config,
    mode: &ModeArgs,
) -> anyhow::Result<Crawler<ReqwestCatalogClient>> {
    validate(config).context("Invalid configuration")?;

    let fetch_mode = if mode.concurrent {
        FetchMode::Concurrent {
            max_concurrency: config.fetch.max_concurrency,
        }
    } else {
        FetchMode::Sequential
    };

    let crawler = Crawler::from_config(config)?.with_mode(fetch_mode);

    // Ctrl-C ends the run; whatever was accepted so far is discarded
    let cancel = crawler.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling traversal");
            cancel.cancel();
        }
    });

    Ok(crawler)
}

/// Handles the crawl subcommand: id traversal from a seed
async fn handle_crawl(config: &mut Config, args: CrawlArgs) -> anyhow::Result<()> {
    if args.since.is_some() {
        config.stopping.since = args.since;
    }
    if args.until.is_some() {
        config.stopping.until = args.until;
    }
    if let Some(patience) = args.failure_patience {
        config.stopping.failure_patience = patience;
    }
    if let Some(max) = args.mode.max_concurrency {
        config.fetch.max_concurrency = max;
    }

    let crawler = build_crawler(config, &args.mode)?;
    let ids = if args.descending {
        VideoIdSequence::descending(args.offset, args.n_videos)
    } else {
        VideoIdSequence::ascending(args.offset, args.n_videos)
    };

    tracing::info!(
        "Crawling from {} ({:?}, {:?})",
        args.offset,
        ids.direction(),
        crawler.mode()
    );
    let outcome = crawler.fetch_by_ids(ids).await?;

    write_json(&outcome.records, args.mode.output.as_deref())
}

/// Handles the search subcommand: page traversal
async fn handle_search(config: &mut Config, args: SearchArgs) -> anyhow::Result<()> {
    if let Some(max) = args.mode.max_concurrency {
        config.fetch.max_concurrency = max;
    }

    let crawler = build_crawler(config, &args.mode)?;
    let query = SearchQuery {
        query: args.query,
        order: args.order,
        per_page: args.per_page,
    };

    tracing::info!("Fetching {} search pages ({:?})", args.n_pages, crawler.mode());
    let outcome = crawler.fetch_by_pages(args.n_pages, &query).await?;

    write_json(&outcome.records, args.mode.output.as_deref())
}

/// Handles the get subcommand: one lookup
async fn handle_get(config: &Config, video_id: VideoId) -> anyhow::Result<()> {
    validate(config).context("Invalid configuration")?;
    let crawler = Crawler::from_config(config)?;

    match crawler.lookup_video(video_id).await? {
        Lookup::Found(record) => write_json(&record, None),
        Lookup::NotFound => anyhow::bail!("Video {} not found", video_id),
        Lookup::Stopped(signal) => anyhow::bail!("Lookup of {} stopped: {}", video_id, signal),
    }
}

/// Handles the thumbs subcommand
async fn handle_thumbs(
    config: &Config,
    urls: &[String],
    max_concurrency: usize,
) -> anyhow::Result<()> {
    let client = ReqwestCatalogClient::from_config(&config.api, &config.client)?;
    let downloader = ThumbnailDownloader::new(client.http().clone(), max_concurrency);

    let mut failed = 0;
    for (url, result) in urls.iter().zip(downloader.download(urls).await) {
        match result {
            Ok(thumb) => println!("{}  {:>8}  {}", thumb.hash(), thumb.base64().len(), url),
            Err(e) => {
                tracing::error!("Failed to download {}: {}", url, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} thumbnails failed", failed, urls.len());
    }
    Ok(())
}

/// Writes `value` as pretty JSON to `path`, or to stdout
fn write_json<T: Serialize + ?Sized>(value: &T, path: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;

    match path {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Results written to: {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
