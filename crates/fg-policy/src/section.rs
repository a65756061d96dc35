// section.rs — Section identifier sanitization.
//
// Every section name that enters a rule set passes through here, whether it
// came from the synced allowlist, a temporary grant, or the CLI. The rules:
//
// 1. Trim surrounding whitespace and lower-case.
// 2. Strip one optional leading "/" + "r/" marker ("r/foo", "/r/foo" → "foo").
// 3. Drop every character outside [a-z0-9_].
// 4. Drop entries that end up empty.
//
// List sanitization additionally de-duplicates (first occurrence wins) and
// falls back to the configured defaults when nothing usable remains.

use serde_json::Value;

/// Compiled-in fallback allowlist.
pub const DEFAULT_SECTIONS: &[&str] = &["freelance"];

/// The default section list as owned strings.
pub fn default_sections() -> Vec<String> {
    DEFAULT_SECTIONS.iter().map(|s| s.to_string()).collect()
}

/// Sanitize one raw section name. Returns `None` when nothing usable remains.
pub fn sanitize_section(raw: &str) -> Option<String> {
    let lowered = raw.trim().to_lowercase();
    let cleaned: String = strip_marker(&lowered)
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Sanitize a list of raw names, de-duplicating in first-seen order.
///
/// Falls back to `fallback` when the list yields no usable section.
pub fn sanitize_sections<I, S>(raw: I, fallback: &[String]) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for item in raw {
        if let Some(section) = sanitize_section(item.as_ref()) {
            if !out.contains(&section) {
                out.push(section);
            }
        }
    }
    if out.is_empty() {
        fallback.to_vec()
    } else {
        out
    }
}

/// Sanitize a stored JSON value (expected: an array of strings).
///
/// Anything that isn't an array yields the fallback. Scalar elements are
/// stringified; nulls, objects and nested arrays are skipped.
pub fn sections_from_value(value: &Value, fallback: &[String]) -> Vec<String> {
    let Some(items) = value.as_array() else {
        return fallback.to_vec();
    };
    let raw = items.iter().filter_map(|item| match item {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    });
    sanitize_sections(raw, fallback)
}

/// Strip a single leading "r/" marker, optionally preceded by "/".
fn strip_marker(s: &str) -> &str {
    let rest = s.strip_prefix('/').unwrap_or(s);
    rest.strip_prefix("r/").unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fallback() -> Vec<String> {
        default_sections()
    }

    #[test]
    fn strips_marker_and_lowercases() {
        assert_eq!(sanitize_section("r/WebDev").as_deref(), Some("webdev"));
        assert_eq!(sanitize_section("/r/ChatGPT").as_deref(), Some("chatgpt"));
        assert_eq!(sanitize_section("  graphic_design ").as_deref(), Some("graphic_design"));
    }

    #[test]
    fn only_one_marker_is_stripped() {
        // The second "r/" is not a marker; its slash falls to the char filter.
        assert_eq!(sanitize_section("r/r/foo").as_deref(), Some("rfoo"));
    }

    #[test]
    fn leading_slash_without_marker_is_filtered_not_stripped() {
        assert_eq!(sanitize_section("/foo").as_deref(), Some("foo"));
    }

    #[test]
    fn unsafe_characters_are_removed() {
        assert_eq!(sanitize_section("foo-bar!").as_deref(), Some("foobar"));
        assert_eq!(sanitize_section("r/ñandú").as_deref(), Some("and"));
    }

    #[test]
    fn empty_after_stripping_is_dropped() {
        assert_eq!(sanitize_section("r/"), None);
        assert_eq!(sanitize_section("   "), None);
        assert_eq!(sanitize_section("/r/---"), None);
    }

    #[test]
    fn list_deduplicates_preserving_first_seen_order() {
        let out = sanitize_sections(["Foo", "bar", "r/foo", "/r/BAR", "baz"], &fallback());
        assert_eq!(out, vec!["foo", "bar", "baz"]);
    }

    #[test]
    fn empty_list_falls_back_to_defaults() {
        let empty: [&str; 0] = [];
        assert_eq!(sanitize_sections(empty, &fallback()), vec!["freelance"]);
        assert_eq!(sanitize_sections(["", "r/"], &fallback()), vec!["freelance"]);
    }

    #[test]
    fn json_non_array_falls_back() {
        assert_eq!(sections_from_value(&json!(null), &fallback()), vec!["freelance"]);
        assert_eq!(sections_from_value(&json!("foo"), &fallback()), vec!["freelance"]);
    }

    #[test]
    fn json_array_skips_non_scalars() {
        let value = json!(["r/Rust", null, {"a": 1}, 42, "rust"]);
        assert_eq!(sections_from_value(&value, &fallback()), vec!["rust", "42"]);
    }
}
