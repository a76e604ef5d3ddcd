use super::headers::page_headers;
use super::types::{FetchOptions, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
use crate::error::FetchError;
use once_cell::sync::OnceCell;
use reqwest::{redirect, Client};
use std::time::Duration;

const REDIRECT_LIMIT: usize = 10;
const POOL_IDLE_TIMEOUT_SEC: u64 = 90;

static DEFAULT_CLIENT: OnceCell<Client> = OnceCell::new();

/// Build a reqwest client for the given options.
pub(crate) fn build_client(opts: &FetchOptions) -> Result<Client, FetchError> {
    let redirect_policy = if opts.follow_redirects {
        redirect::Policy::limited(REDIRECT_LIMIT)
    } else {
        redirect::Policy::none()
    };

    Client::builder()
        .default_headers(page_headers(&opts.user_agent))
        .redirect(redirect_policy)
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .timeout(opts.timeout)
        .pool_idle_timeout(Duration::from_secs(POOL_IDLE_TIMEOUT_SEC))
        .build()
        .map_err(|e| FetchError::Other(format!("failed to build client: {e}")))
}

/// Shared client for the free `fetch` function; the timeout is set per request.
pub(crate) fn default_client() -> Result<Client, FetchError> {
    DEFAULT_CLIENT
        .get_or_try_init(|| {
            build_client(&FetchOptions {
                timeout: DEFAULT_TIMEOUT,
                user_agent: DEFAULT_USER_AGENT.to_string(),
                follow_redirects: true,
            })
        })
        .cloned()
}
