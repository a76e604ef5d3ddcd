/// Strip `base` from the front of `path`, only on a segment boundary.
///
/// `/en/undergraduate` strips from `/en/undergraduate/science` but not from
/// `/en/undergraduate-old/science`. Without a match the path is returned as is.
pub(super) fn strip_base_path<'a>(base: &str, path: &'a str) -> &'a str {
    match path.strip_prefix(base) {
        Some(rest) if base.ends_with('/') || rest.is_empty() || rest.starts_with('/') => rest,
        _ => path,
    }
}
