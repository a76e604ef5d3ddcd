use crate::error::{CatscrapeError, Result};
use crate::tools::fetch::{FetchOptions, DEFAULT_USER_AGENT};
use crate::types::Department;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Environment variable holding the Azure SAS URL when the config leaves it out.
pub const SAS_URL_ENV: &str = "CATSCRAPE_SAS_URL";

pub const DEFAULT_BASE_URL: &str = "https://coursecatalogue.mcgill.ca/en/undergraduate/";
pub const DEFAULT_CONTAINER: &str = "rawscrape";
pub const DEFAULT_TIMEOUT_MS: u64 = 100_000;

const DEFAULT_DEPARTMENTS: [&str; 9] = [
    "science",
    "arts",
    "agri-env-sci",
    "environment",
    "engineering",
    "arts-science",
    "education",
    "management",
    "music",
];

/// Where extracted records go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Files under `root` (platform data dir when unset).
    Local {
        #[serde(default)]
        root: Option<PathBuf>,
    },
    /// Azure Blob Storage through a SAS URL (falls back to `CATSCRAPE_SAS_URL`).
    Azure {
        #[serde(default)]
        sas_url: Option<String>,
    },
    /// Keep everything in process; nothing is persisted.
    Memory,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Local { root: None }
    }
}

/// Everything one crawl needs. Every field has a default, so a JSON file only
/// has to name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub base_url: String,
    pub departments: Vec<Department>,
    pub container: String,
    pub timeout_ms: u64,
    pub user_agent: String,
    pub follow_redirects: bool,
    /// Links processed at once; 1 is strictly sequential.
    pub concurrency: usize,
    /// Extra attempts for connection failures and timeouts only.
    pub retries: u32,
    pub blob_separator: char,
    pub store: StoreConfig,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            departments: default_departments(),
            container: DEFAULT_CONTAINER.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            follow_redirects: true,
            concurrency: 1,
            retries: 0,
            blob_separator: '.',
            store: StoreConfig::default(),
        }
    }
}

pub fn default_departments() -> Vec<Department> {
    DEFAULT_DEPARTMENTS
        .iter()
        .map(|d| Department::new(*d, format!("undergraduate/{d}/programs")))
        .collect()
}

impl CrawlConfig {
    /// Read a JSON config file; missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CatscrapeError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.base_url()?;
        if self.departments.is_empty() {
            return Err(CatscrapeError::config("at least one department is required"));
        }
        if self.concurrency == 0 {
            return Err(CatscrapeError::config("concurrency must be at least 1"));
        }
        if self.timeout_ms == 0 {
            return Err(CatscrapeError::config("timeout_ms must be positive"));
        }
        if self.container.trim().is_empty() {
            return Err(CatscrapeError::config("container must not be empty"));
        }
        Ok(())
    }

    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.base_url).map_err(|_| CatscrapeError::InvalidUrl(self.base_url.clone()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions::default()
            .with_timeout(self.timeout())
            .with_user_agent(self.user_agent.clone())
            .with_follow_redirects(self.follow_redirects)
    }

    /// Keep only the named departments, in config order.
    pub fn retain_departments(&mut self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        if let Some(unknown) = names
            .iter()
            .find(|n| !self.departments.iter().any(|d| &d.name == *n))
        {
            return Err(CatscrapeError::config(format!("unknown department: {unknown}")));
        }
        self.departments.retain(|d| names.contains(&d.name));
        Ok(())
    }
}

/// Pick the SAS URL from config first, then from the environment.
pub fn resolve_sas_url(configured: Option<&str>, env: Option<String>) -> Option<String> {
    configured
        .map(str::to_string)
        .or(env)
        .filter(|s| !s.trim().is_empty())
}

pub fn sas_url_from_env() -> Option<String> {
    std::env::var(SAS_URL_ENV).ok()
}
