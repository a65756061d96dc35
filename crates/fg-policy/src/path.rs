// path.rs — Path normalization and separator-bounded prefix matching.

/// Normalize a URL path for comparison.
///
/// Strips any run of trailing `/`, maps the empty path to `/`, and
/// lower-cases the result so `/r/Foo/` and `/r/foo` compare equal.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_lowercase()
    }
}

/// True when `path` equals `base` or lives below it.
///
/// Both arguments must already be normalized. Nesting is separator-bounded:
/// `/r/foo/bar` is under `/r/foo`, `/r/foobar` is not. The root `/` only
/// matches itself.
pub fn is_nested_under(path: &str, base: &str) -> bool {
    if path == base {
        return true;
    }
    if base == "/" {
        return false;
    }
    path.strip_prefix(base)
        .is_some_and(|rest| rest.starts_with('/'))
}
