use crate::config::CrawlConfig;
use crate::error::{CatscrapeError, FetchError, Result};
use crate::services::store::BlobStore;
use crate::services::log::ActivityLogger;
use crate::tools::batch::batch;
use crate::tools::fetch::fetch_with_retry;
use crate::tools::links::{blob_name, extract_links, resolve};
use crate::tools::section::extract_section;
use crate::types::*;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

/// Anything that can turn a URL into a [`Page`].
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> std::result::Result<Page, FetchError>;
}

/// Per-link settings shared by every job of a run.
struct LinkContext {
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn BlobStore>,
    activity: Option<Arc<ActivityLogger>>,
    base: Url,
    container: String,
    separator: char,
    retries: u32,
}

/// One pass over the catalogue: base page, department links, one blob per link.
pub struct Engine {
    config: CrawlConfig,
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn BlobStore>,
    activity: Option<Arc<ActivityLogger>>,
}

impl Engine {
    pub fn new(
        config: CrawlConfig,
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            config,
            fetcher,
            store,
            activity: None,
        }
    }

    /// Also append every link outcome to a persistent activity log.
    pub fn with_activity_log(mut self, logger: ActivityLogger) -> Self {
        self.activity = Some(Arc::new(logger));
        self
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Fetch the base page and list matching links per department, in config order.
    ///
    /// Fails only if the base URL is invalid or the base page cannot be fetched.
    pub async fn discover(&self) -> Result<Vec<LinkJob>> {
        let base = self.config.base_url()?;
        let page = fetch_with_retry(self.fetcher.as_ref(), base.as_str(), self.config.retries)
            .await?;

        let jobs: Vec<LinkJob> = self
            .config
            .departments
            .iter()
            .flat_map(|dept| {
                extract_links(&page, &dept.keyword)
                    .into_iter()
                    .map(move |link| LinkJob {
                        department: dept.name.clone(),
                        link,
                    })
            })
            .collect();

        info!(base = %base, links = jobs.len(), "discovered program links");
        Ok(jobs)
    }

    /// Run the whole pass. A failing link is logged and recorded, never fatal.
    pub async fn run(&self) -> Result<RunReport> {
        self.config.validate()?;
        let started_at = Utc::now();
        let base = self.config.base_url()?;

        let jobs = self.discover().await?;

        let mut discovered: BTreeMap<String, usize> = self
            .config
            .departments
            .iter()
            .map(|d| (d.name.clone(), 0))
            .collect();
        for job in &jobs {
            *discovered.entry(job.department.clone()).or_default() += 1;
        }

        let ctx = Arc::new(LinkContext {
            fetcher: Arc::clone(&self.fetcher),
            store: Arc::clone(&self.store),
            activity: self.activity.clone(),
            base: base.clone(),
            container: self.config.container.clone(),
            separator: self.config.blob_separator,
            retries: self.config.retries,
        });

        info!(
            jobs = jobs.len(),
            concurrency = self.config.concurrency,
            store = self.store.name(),
            container = %self.config.container,
            "upload beginning"
        );

        let outcomes = batch(jobs, self.config.concurrency, move |job| {
            let ctx = Arc::clone(&ctx);
            async move { process_link(job, &ctx).await }
        })
        .await;

        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            base_url: base.to_string(),
            container: self.config.container.clone(),
            discovered,
            outcomes,
        };
        for (name, urls) in report.shared_blob_names() {
            warn!(blob = name, urls = ?urls, "several links uploaded to the same blob");
        }
        info!(
            uploaded = report.uploaded().count(),
            failed = report.failed().count(),
            "run finished"
        );
        Ok(report)
    }
}

/// A per-link failure: where it happened and what went wrong.
struct LinkFailure {
    stage: Stage,
    error: String,
}

impl LinkFailure {
    fn at(stage: Stage, err: impl std::fmt::Display) -> Self {
        Self {
            stage,
            error: err.to_string(),
        }
    }
}

async fn process_link(job: LinkJob, ctx: &LinkContext) -> LinkOutcome {
    let mut outcome = LinkOutcome {
        department: job.department.clone(),
        link: job.link.clone(),
        url: None,
        blob_name: None,
        status: LinkStatus::Uploaded,
    };

    if let Err(failure) = upload_link(&job, ctx, &mut outcome).await {
        warn!(
            department = %job.department,
            link = %job.link,
            stage = %failure.stage,
            error = %failure.error,
            "failed to process link"
        );
        outcome.status = LinkStatus::Failed {
            stage: failure.stage,
            error: failure.error,
        };
    } else {
        info!(
            department = %job.department,
            url = outcome.url.as_deref().unwrap_or_default(),
            blob = outcome.blob_name.as_deref().unwrap_or_default(),
            "uploaded"
        );
    }

    if let Some(activity) = &ctx.activity {
        let activity = Arc::clone(activity);
        let entry = outcome.clone();
        // File appends block; keep them off the async workers.
        match tokio::task::spawn_blocking(move || activity.record(&entry)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "could not write activity log"),
            Err(e) => warn!(error = %e, "activity log task failed"),
        }
    }
    outcome
}

async fn upload_link(
    job: &LinkJob,
    ctx: &LinkContext,
    outcome: &mut LinkOutcome,
) -> std::result::Result<(), LinkFailure> {
    let url = resolve(&ctx.base, &job.link).map_err(|e| LinkFailure::at(Stage::Resolve, e))?;
    outcome.url = Some(url.to_string());

    // The parsed page is not Send; it must be gone before the upload await.
    let text = {
        let page = fetch_with_retry(ctx.fetcher.as_ref(), url.as_str(), ctx.retries)
            .await
            .map_err(|e| LinkFailure::at(Stage::Fetch, e))?;
        extract_section(&page).map_err(|e| LinkFailure::at(Stage::Extract, e))?
    };

    let record = UploadRecord::new(url.as_str(), text);
    let payload = record
        .to_json_bytes()
        .map_err(|e| LinkFailure::at(Stage::Encode, CatscrapeError::from(e)))?;

    let name = blob_name(&ctx.base, &url, ctx.separator);
    outcome.blob_name = Some(name.clone());

    ctx.store
        .write(&ctx.container, &name, payload)
        .await
        .map_err(|e| LinkFailure::at(Stage::Store, e))
}
