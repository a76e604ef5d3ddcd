//! Section Tools


use crate::error::ExtractionError;
use crate::selectors::SECTION_SELECTOR;
use crate::types::Page;

/// Text of the program requirements container.
///
/// Text nodes are concatenated in document order with tags stripped and no
/// whitespace rewriting, so `Required: CS101<br/>CS102` reads `Required: CS101CS102`.
/// A page without the container is unusable: there is no fallback selector.
pub fn extract_section(page: &Page) -> Result<String, ExtractionError> {
    page.document()
        .select(&SECTION_SELECTOR)
        .next()
        .map(|container| container.text().collect::<String>())
        .ok_or(ExtractionError::SectionNotFound)
}
