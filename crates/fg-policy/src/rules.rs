// rules.rs — Static policy configuration.
//
// The parts of the rule set that don't change at runtime: where sections
// live in the URL space, which sections to fall back to, which utility
// routes are always reachable, and which feed entry points are always
// denied. Loaded from the `[policy]` table of feedgate.toml.

use serde::{Deserialize, Serialize};

use crate::path::normalize_path;
use crate::section::{default_sections, sanitize_sections};

/// Static policy configuration (`[policy]` in feedgate.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// First path segment of section URLs (`r` → `/r/<section>`).
    #[serde(default = "default_section_root")]
    pub section_root: String,

    /// Allowlist used until (or instead of) a persisted one.
    #[serde(default = "default_sections")]
    pub default_sections: Vec<String>,

    /// Routes reachable regardless of section (auth, account, messaging, profile).
    #[serde(default = "default_utility_prefixes")]
    pub utility_prefixes: Vec<String>,

    /// Feed entry points denied on exact match.
    #[serde(default = "default_blocked_feed_paths")]
    pub blocked_feed_paths: Vec<String>,

    /// Feed entry points denied on exact or nested match.
    #[serde(default = "default_blocked_feed_prefixes")]
    pub blocked_feed_prefixes: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            section_root: default_section_root(),
            default_sections: default_sections(),
            utility_prefixes: default_utility_prefixes(),
            blocked_feed_paths: default_blocked_feed_paths(),
            blocked_feed_prefixes: default_blocked_feed_prefixes(),
        }
    }
}

impl PolicyConfig {
    /// Return a copy with every path normalized and the default sections
    /// sanitized, so matching never has to re-normalize rule entries.
    pub fn normalized(&self) -> Self {
        let root = self.section_root.trim_matches('/').to_lowercase();
        Self {
            section_root: if root.is_empty() {
                default_section_root()
            } else {
                root
            },
            default_sections: sanitize_sections(&self.default_sections, &default_sections()),
            utility_prefixes: normalize_all(&self.utility_prefixes),
            blocked_feed_paths: normalize_all(&self.blocked_feed_paths),
            blocked_feed_prefixes: normalize_all(&self.blocked_feed_prefixes),
        }
    }

    /// The path of a section's landing page, e.g. `/r/freelance`.
    pub fn section_path(&self, section: &str) -> String {
        format!("/{}/{}", self.section_root, section)
    }
}

fn normalize_all(paths: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for p in paths {
        let n = normalize_path(p.trim());
        if !out.contains(&n) {
            out.push(n);
        }
    }
    out
}

// Serde default functions
fn default_section_root() -> String {
    "r".to_string()
}

fn default_utility_prefixes() -> Vec<String> {
    [
        "/login",
        "/logout",
        "/register",
        "/password",
        "/account",
        "/settings",
        "/prefs",
        "/message",
        "/chat",
        "/notifications",
        "/user",
        "/u",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_blocked_feed_paths() -> Vec<String> {
    ["/", "/best", "/hot", "/new", "/top", "/rising"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_blocked_feed_prefixes() -> Vec<String> {
    ["/r/all", "/r/popular"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_the_feed_surface() {
        let config = PolicyConfig::default();
        assert!(config.blocked_feed_paths.contains(&"/".to_string()));
        assert!(config.blocked_feed_prefixes.contains(&"/r/popular".to_string()));
        assert_eq!(config.default_sections, vec!["freelance"]);
    }

    #[test]
    fn normalized_cleans_every_entry() {
        let config = PolicyConfig {
            section_root: "/R/".to_string(),
            default_sections: vec!["r/Rust".to_string(), "rust".to_string()],
            utility_prefixes: vec!["/u/".to_string(), "/U".to_string()],
            blocked_feed_paths: vec!["/Best/".to_string()],
            blocked_feed_prefixes: vec!["/r/All/".to_string()],
        }
        .normalized();
        assert_eq!(config.section_root, "r");
        assert_eq!(config.default_sections, vec!["rust"]);
        assert_eq!(config.utility_prefixes, vec!["/u"]);
        assert_eq!(config.blocked_feed_paths, vec!["/best"]);
        assert_eq!(config.blocked_feed_prefixes, vec!["/r/all"]);
    }

    #[test]
    fn empty_defaults_fall_back_to_compiled_in() {
        let config = PolicyConfig {
            default_sections: vec!["   ".to_string()],
            ..PolicyConfig::default()
        }
        .normalized();
        assert_eq!(config.default_sections, vec!["freelance"]);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: PolicyConfig = toml_like_json(r#"{"default_sections": ["rust"]}"#);
        assert_eq!(config.section_root, "r");
        assert_eq!(config.default_sections, vec!["rust"]);
        assert!(!config.utility_prefixes.is_empty());
    }

    fn toml_like_json(s: &str) -> PolicyConfig {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn section_path_uses_root() {
        let config = PolicyConfig::default();
        assert_eq!(config.section_path("freelance"), "/r/freelance");
    }
}
