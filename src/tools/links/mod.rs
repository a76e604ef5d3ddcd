//! Link Tools

mod utils;

use crate::selectors::LINK_SELECTOR;
use crate::types::Page;
use url::Url;

/// Collect every anchor `href` containing `keyword`, in document order.
///
/// Matching is a case-sensitive substring test on the raw attribute value.
/// Duplicates are kept and nothing is normalized. Anchors without an `href`
/// never match.
///
/// ```
/// use catscrape::{tools::links::extract_links, Page};
///
/// let page = Page::parse(
///     "https://example.com/",
///     r#"<a href="/undergraduate/science/programs/x">X</a><a href="/other/y">Y</a>"#,
/// );
/// assert_eq!(
///     extract_links(&page, "science/programs"),
///     vec!["/undergraduate/science/programs/x".to_string()]
/// );
/// ```
pub fn extract_links(page: &Page, keyword: &str) -> Vec<String> {
    page.document()
        .select(&LINK_SELECTOR)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| href.contains(keyword))
        .map(str::to_string)
        .collect()
}

/// Resolve a harvested link against the page it came from (RFC 3986 reference resolution).
pub fn resolve(base: &Url, link: &str) -> Result<Url, url::ParseError> {
    base.join(link)
}

/// Derive a storage key from a resolved URL.
///
/// The base path is stripped when the URL lives under it, surrounding slashes are
/// trimmed and the remaining slashes become `separator`. Query and fragment are
/// ignored; an empty key becomes `index`.
pub fn blob_name(base: &Url, url: &Url, separator: char) -> String {
    let relative = utils::strip_base_path(base.path(), url.path());
    let trimmed = relative.trim_matches('/');
    if trimmed.is_empty() {
        return "index".to_string();
    }
    trimmed
        .chars()
        .map(|c| if c == '/' { separator } else { c })
        .collect()
}
