use crate::config::{CrawlConfig, StoreConfig};
use crate::services::{build_store, ActivityLogger};
use crate::tools::fetch::HttpFetcher;
use crate::tools::links::extract_links;
use crate::tools::section::extract_section;
use crate::{ApiResponse, Engine, Page, PageFetcher, UploadRecord};
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "catscrape",
    version,
    about = "Scrape program requirements from a course catalogue into blob storage (JSON output)"
)]
pub struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl every department and upload one JSON record per program page
    Run(RunArgs),
    /// Fetch a page and print the hrefs containing KEYWORD
    Links(LinksArgs),
    /// Fetch a program page and print the record that would be uploaded
    Section(SectionArgs),
    /// Show the activity log, newest first
    Log(LogArgs),
}

#[derive(Args)]
struct RunArgs {
    /// JSON config file; unspecified fields keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,
    /// Only crawl these departments (repeatable)
    #[arg(long = "department", short = 'd')]
    departments: Vec<String>,
    #[arg(long)]
    concurrency: Option<usize>,
    /// Extra attempts on connection failures and timeouts
    #[arg(long)]
    retries: Option<u32>,
    /// Write blobs under this directory instead of the configured store
    #[arg(long, conflicts_with = "dry_run")]
    local: Option<PathBuf>,
    /// Keep records in memory; nothing is uploaded
    #[arg(long)]
    dry_run: bool,
    /// Do not append outcomes to the activity log
    #[arg(long)]
    no_activity_log: bool,
}

/// Fetch settings for single-page commands.
#[derive(Args)]
struct PageArgs {
    /// JSON config file supplying user agent, redirects and timeout
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides the configured timeout
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[derive(Args)]
struct LinksArgs {
    url: String,
    keyword: String,
    #[command(flatten)]
    page: PageArgs,
}

#[derive(Args)]
struct SectionArgs {
    url: String,
    #[command(flatten)]
    page: PageArgs,
}

#[derive(Args)]
struct LogArgs {
    /// Only failed links
    #[arg(long)]
    errors: bool,
    #[arg(long)]
    department: Option<String>,
    #[arg(long, short = 'n')]
    limit: Option<usize>,
}

pub async fn run() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let ok = match cli.cmd {
        Command::Run(args) => finish(run_cmd(args).await),
        Command::Links(args) => finish(links_cmd(args).await),
        Command::Section(args) => finish(section_cmd(args).await),
        Command::Log(args) => finish(log_cmd(args)),
    };

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Diagnostics go to stderr so stdout stays machine-readable.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<CrawlConfig> {
    match path {
        Some(path) => {
            CrawlConfig::load(path).with_context(|| format!("loading config {}", path.display()))
        }
        None => Ok(CrawlConfig::default()),
    }
}

async fn run_cmd(args: RunArgs) -> anyhow::Result<crate::RunReport> {
    let mut config = load_config(args.config.as_deref())?;

    config.retain_departments(&args.departments)?;
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(retries) = args.retries {
        config.retries = retries;
    }
    if let Some(root) = args.local {
        config.store = StoreConfig::Local { root: Some(root) };
    }
    if args.dry_run {
        config.store = StoreConfig::Memory;
    }
    config.validate()?;

    let fetcher = HttpFetcher::new(config.fetch_options()).context("building http client")?;
    let store = build_store(&config.store).context("opening blob store")?;

    let mut engine = Engine::new(config, Arc::new(fetcher), store);
    if !args.no_activity_log {
        match ActivityLogger::new() {
            Ok(logger) => engine = engine.with_activity_log(logger),
            Err(e) => warn!(error = %e, "activity log unavailable"),
        }
    }

    Ok(engine.run().await?)
}

/// One page, fetched with the configured user agent, redirect policy and timeout.
async fn fetch_page(args: &PageArgs, url: &str) -> anyhow::Result<Page> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(timeout_ms) = args.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    config.validate()?;

    let fetcher = HttpFetcher::new(config.fetch_options()).context("building http client")?;
    Ok(fetcher
        .fetch(url)
        .await
        .with_context(|| format!("fetching {url}"))?)
}

async fn links_cmd(args: LinksArgs) -> anyhow::Result<Vec<String>> {
    let page = fetch_page(&args.page, &args.url).await?;
    Ok(extract_links(&page, &args.keyword))
}

async fn section_cmd(args: SectionArgs) -> anyhow::Result<UploadRecord> {
    let page = fetch_page(&args.page, &args.url).await?;
    let text = extract_section(&page).with_context(|| format!("extracting {}", args.url))?;
    Ok(UploadRecord::new(args.url, text))
}

fn log_cmd(args: LogArgs) -> anyhow::Result<Vec<String>> {
    let logger = ActivityLogger::new()?;
    let mut lines = logger.read_logs(args.department.as_deref(), args.errors)?;
    if let Some(limit) = args.limit {
        lines.truncate(limit);
    }
    Ok(lines)
}

fn finish<T: serde::Serialize>(res: anyhow::Result<T>) -> bool {
    match res {
        Ok(v) => {
            print_json(&ApiResponse::ok(v));
            true
        }
        Err(e) => {
            print_json(&ApiResponse::<()>::err(format!("{e:#}")));
            false
        }
    }
}

fn print_json<T: serde::Serialize>(val: &T) {
    match serde_json::to_string_pretty(val) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("could not render output: {e}"),
    }
}
