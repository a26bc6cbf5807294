// Document path helpers.

/// Final `/`-separated component of a document path or URL.
///
/// Matches what the server reports in `adddoc` notifications: a path
/// without separators is returned whole, and a trailing separator yields
/// an empty name.
pub fn basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => &path[index + 1..],
        None => path,
    }
}
