use chrono::{DateTime, Utc};
use scraper::Html;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A fetched document: the raw body plus its parsed DOM.
///
/// The parsed tree is not `Send`, so a `Page` is built after the last `.await`
/// of a fetch and dropped before the next one.
#[derive(Debug, Clone)]
pub struct Page {
    url: String,
    body: String,
    document: Html,
}

impl Page {
    /// Parse a body into a page. Malformed markup degrades into a best-effort tree.
    pub fn parse(url: impl Into<String>, body: impl Into<String>) -> Self {
        let body = body.into();
        let document = Html::parse_document(&body);
        Self {
            url: url.into(),
            body,
            document,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn document(&self) -> &Html {
        &self.document
    }
}

/// The JSON blob persisted per scraped page.
///
/// `html` carries the extracted section text, not markup; the field name is kept
/// for compatibility with consumers of existing blobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub link: String,
    pub html: String,
}

impl UploadRecord {
    pub fn new(link: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            html: html.into(),
        }
    }

    /// UTF-8 JSON payload handed to the blob store.
    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_json_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// One academic department: a label plus the href substring selecting its programs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub name: String,
    pub keyword: String,
}

impl Department {
    pub fn new(name: impl Into<String>, keyword: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keyword: keyword.into(),
        }
    }
}

/// A link discovered on the base page, tagged with the department that matched it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkJob {
    pub department: String,
    pub link: String,
}

/// Where in the per-link pipeline a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Resolve,
    Fetch,
    Extract,
    Encode,
    Store,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Resolve => "resolve",
            Stage::Fetch => "fetch",
            Stage::Extract => "extract",
            Stage::Encode => "encode",
            Stage::Store => "store",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum LinkStatus {
    Uploaded,
    Failed { stage: Stage, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkOutcome {
    pub department: String,
    pub link: String,
    pub url: Option<String>,
    pub blob_name: Option<String>,
    #[serde(flatten)]
    pub status: LinkStatus,
}

impl LinkOutcome {
    pub fn is_uploaded(&self) -> bool {
        matches!(self.status, LinkStatus::Uploaded)
    }
}

/// Summary of one pass over the catalogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub base_url: String,
    pub container: String,
    /// Links discovered per department name, before any fetching.
    pub discovered: BTreeMap<String, usize>,
    pub outcomes: Vec<LinkOutcome>,
}

impl RunReport {
    pub fn uploaded(&self) -> impl Iterator<Item = &LinkOutcome> {
        self.outcomes.iter().filter(|o| o.is_uploaded())
    }

    pub fn failed(&self) -> impl Iterator<Item = &LinkOutcome> {
        self.outcomes.iter().filter(|o| !o.is_uploaded())
    }

    /// Blob names written by more than one uploaded link, with their URLs.
    /// The last upload wins, so earlier records under these names were overwritten.
    pub fn shared_blob_names(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut by_name: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for outcome in self.uploaded() {
            if let Some(name) = outcome.blob_name.as_deref() {
                let url = outcome.url.as_deref().unwrap_or(&outcome.link);
                by_name.entry(name).or_default().push(url);
            }
        }
        by_name.retain(|_, urls| urls.len() > 1);
        by_name
    }
}

/// Envelope for everything the CLI prints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}
impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }
    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
