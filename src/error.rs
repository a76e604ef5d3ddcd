use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatscrapeError>;

/// Why a single page fetch failed. Never retried by `fetch` itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error("connection failed")]
    ConnectionFailed,
    #[error("timed out")]
    TimedOut,
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Connection and timeout failures are plausibly transient; everything else is final.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::ConnectionFailed | FetchError::TimedOut)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        // Order matters: a connect timeout reports both is_timeout and is_connect.
        if e.is_timeout() {
            FetchError::TimedOut
        } else if e.is_connect() {
            FetchError::ConnectionFailed
        } else {
            FetchError::Other(e.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("program section not found")]
    SectionNotFound,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("http: {0}")]
    Http(String),
    #[error("store returned status {code}: {body}")]
    Status { code: u16, body: String },
    #[error("invalid store url: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Http(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum CatscrapeError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
    #[error("store failed: {0}")]
    Store(#[from] StoreError),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("config: {0}")]
    Config(String),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl CatscrapeError {
    pub fn config(msg: impl Into<String>) -> Self {
        CatscrapeError::Config(msg.into())
    }
}
