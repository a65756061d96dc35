// site.rs — The target site's host layout.
//
// Feedgate polices exactly one site. Any host equal to the site domain or
// below it is a "target host"; exactly one of those is canonical and all
// navigation is forced onto it.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::PageError;

/// Host layout of the target site (`[site]` in feedgate.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Registrable domain; every host at or below it is in scope.
    #[serde(default = "default_domain")]
    pub domain: String,
    /// The single host variant navigation is forced onto.
    #[serde(default = "default_canonical_host")]
    pub canonical_host: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            canonical_host: default_canonical_host(),
        }
    }
}

fn default_domain() -> String {
    "reddit.com".to_string()
}

fn default_canonical_host() -> String {
    "www.reddit.com".to_string()
}

/// Validated site profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteProfile {
    domain: String,
    canonical_host: String,
    origin: Url,
}

impl SiteProfile {
    pub fn new(config: &SiteConfig) -> Result<Self, PageError> {
        let domain = config.domain.trim().trim_matches('.').to_lowercase();
        let canonical_host = config.canonical_host.trim().to_lowercase();
        let origin = Url::parse(&format!("https://{canonical_host}/")).map_err(|e| {
            PageError::InvalidSite {
                host: canonical_host.clone(),
                reason: e.to_string(),
            }
        })?;
        let profile = Self {
            domain,
            canonical_host,
            origin,
        };
        if !profile.is_target_host(&profile.canonical_host) {
            return Err(PageError::InvalidSite {
                host: profile.canonical_host,
                reason: format!("not under domain '{}'", profile.domain),
            });
        }
        Ok(profile)
    }

    pub fn canonical_host(&self) -> &str {
        &self.canonical_host
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// `https://<canonical>/`
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// True for the domain itself and every host below it.
    pub fn is_target_host(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        host == self.domain
            || host
                .strip_suffix(self.domain.as_str())
                .is_some_and(|sub| sub.ends_with('.'))
    }

    pub fn is_canonical_host(&self, host: &str) -> bool {
        host.eq_ignore_ascii_case(&self.canonical_host)
    }

    /// `https://<canonical>/<section_root>/<section>/`
    pub fn section_url(&self, section_root: &str, section: &str) -> Url {
        let mut url = self.origin.clone();
        url.set_path(&format!("/{section_root}/{section}/"));
        url
    }

    /// Resolve a (possibly relative) href against the page URL.
    pub fn resolve(&self, page: &Url, href: &str) -> Result<Url, url::ParseError> {
        page.join(href)
    }
}
