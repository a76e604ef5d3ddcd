//! Shared Selectors

use once_cell::sync::Lazy;
use scraper::Selector;

/// Selector for anchor elements with hrefs.
pub static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("valid link selector"));

/// Id of the catalogue template's program requirements container.
pub const SECTION_ID: &str = "programoverviewtextcontainer";

/// Selector for the program requirements container.
pub static SECTION_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(&format!("div#{SECTION_ID}")).expect("valid section selector")
});
