//! feedgate.toml: one file configuring the whole pipeline.
//!
//! ```toml
//! [site]
//! domain = "reddit.com"
//! canonical_host = "www.reddit.com"
//!
//! [policy]
//! section_root = "r"
//! default_sections = ["freelance"]
//!
//! [scheduler]
//! flush_delay_ms = 120
//! max_batch = 60
//!
//! [navigation]
//! poll_interval_ms = 500
//! reason_ttl_ms = 5000
//!
//! [grants]
//! ttl_minutes = 360
//! unlock_delay_secs = 180
//! ```
//!
//! Every table and every field is optional.

use std::path::Path;

use serde::{Deserialize, Serialize};

use fg_policy::unlock::{DEFAULT_GRANT_TTL_MINUTES, DEFAULT_UNLOCK_DELAY_SECS};
use fg_policy::PolicyConfig;

use crate::error::PageError;
use crate::navigation::NavigationConfig;
use crate::rail::RailConfig;
use crate::scheduler::SchedulerConfig;
use crate::site::SiteConfig;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedgateConfig {
    #[serde(default)]
    pub site: SiteConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub navigation: NavigationConfig,

    #[serde(default)]
    pub grants: GrantsConfig,

    #[serde(default)]
    pub rail: RailConfig,
}

/// Temporary grant timing (`[grants]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantsConfig {
    /// Lifetime of a confirmed grant.
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: i64,
    /// Wait between starting an unlock and confirming it.
    #[serde(default = "default_unlock_delay_secs")]
    pub unlock_delay_secs: i64,
}

impl Default for GrantsConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
            unlock_delay_secs: default_unlock_delay_secs(),
        }
    }
}

impl GrantsConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.ttl_minutes.max(1))
    }

    pub fn unlock_delay(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.unlock_delay_secs.max(0))
    }
}

fn default_ttl_minutes() -> i64 {
    DEFAULT_GRANT_TTL_MINUTES
}

fn default_unlock_delay_secs() -> i64 {
    DEFAULT_UNLOCK_DELAY_SECS
}

impl FeedgateConfig {
    /// Parse a feedgate.toml document.
    pub fn parse(content: &str, origin: &str) -> Result<Self, PageError> {
        toml::from_str(content).map_err(|source| PageError::Config {
            path: origin.to_string(),
            source,
        })
    }

    /// Load feedgate.toml from `path`.
    pub fn load(path: &Path) -> Result<Self, PageError> {
        let content = std::fs::read_to_string(path).map_err(|source| PageError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Load feedgate.toml, falling back to defaults when the file is
    /// missing or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file; using defaults");
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config");
                config
            }
            Err(e) => {
                tracing::warn!(error = %e, "config unusable; using defaults");
                Self::default()
            }
        }
    }
}
