mod client;
mod headers;
mod retry;

pub mod types;

// Re-export types for public use
pub use retry::fetch_with_retry;
pub use types::*;

use crate::engine::PageFetcher;
use crate::error::FetchError;
use crate::types::Page;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Fetch a page with a browser-like User-Agent and a whole-request timeout.
///
/// Single attempt. Non-2xx answers become `FetchError::HttpStatus`, connection
/// failures `ConnectionFailed`, an expired timeout `TimedOut`, anything else `Other`.
/// The body must be valid UTF-8; it is parsed into a [`Page`].
///
/// # Examples
/// ```no_run
/// use catscrape::tools::fetch::fetch;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), catscrape::FetchError> {
/// let page = fetch("https://coursecatalogue.mcgill.ca/en/undergraduate/", Duration::from_secs(30)).await?;
/// println!("{} bytes", page.body().len());
/// # Ok(())
/// # }
/// ```
pub async fn fetch(url: &str, timeout: Duration) -> Result<Page, FetchError> {
    let client = client::default_client()?;
    fetch_with_client(&client, url, timeout).await
}

async fn fetch_with_client(
    client: &Client,
    url: &str,
    timeout: Duration,
) -> Result<Page, FetchError> {
    debug!(url, "fetching");

    let response = client.get(url).timeout(timeout).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::HttpStatus(status.as_u16()));
    }

    let bytes = response.bytes().await?;
    let body = String::from_utf8(bytes.to_vec())
        .map_err(|e| FetchError::Other(format!("body is not valid utf-8: {e}")))?;

    debug!(url, bytes = body.len(), "fetched");
    Ok(Page::parse(url, body))
}

/// Reusable fetcher holding one configured client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(opts: FetchOptions) -> Result<Self, FetchError> {
        Ok(Self {
            client: client::build_client(&opts)?,
            timeout: opts.timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Page, FetchError> {
        fetch_with_client(&self.client, url, self.timeout).await
    }
}
