// links.rs — LinkInterceptor: disable anchors that lead off-policy.
//
// Each anchor is classified exactly once and then flagged. Target-domain
// links go through the policy store first (feed block wins there), then the
// canonical-host rule. Denied anchors lose their href, which kills left
// click, middle click and "open in new tab" alike, and are styled disabled.
// External links and hrefs that don't resolve are flagged and left alone.

use std::sync::Arc;

use url::Url;

use fg_policy::{DenyReason, PolicyError, PolicyStore, Verdict};

use crate::dom::Document;
use crate::site::SiteProfile;

/// Set on every anchor the interceptor has classified.
pub const LINK_FLAG: &str = "data-fg-link-locked";
/// Tooltip on disabled anchors.
pub const BLOCKED_TITLE: &str = "Blocked by Feedgate";

const DISABLED_STYLES: &[(&str, &str)] = &[
    ("pointer-events", "none"),
    ("opacity", "0.35"),
    ("filter", "grayscale(1)"),
    ("cursor", "not-allowed"),
];

/// Why a target-domain link was denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkDenial {
    Policy(DenyReason),
    NonCanonicalHost(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkVerdict {
    /// Not on the target domain.
    External,
    Allowed,
    Denied(LinkDenial),
}

impl LinkVerdict {
    pub fn is_denied(&self) -> bool {
        matches!(self, LinkVerdict::Denied(_))
    }
}

/// Counts from one `classify_and_lock()` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Anchors classified in this pass.
    pub examined: usize,
    /// Anchors skipped because an earlier pass already flagged them.
    pub already_flagged: usize,
    pub allowed: usize,
    pub locked: usize,
    pub external: usize,
    pub malformed: usize,
}

impl ScanReport {
    pub fn merge(&mut self, other: ScanReport) {
        self.examined += other.examined;
        self.already_flagged += other.already_flagged;
        self.allowed += other.allowed;
        self.locked += other.locked;
        self.external += other.external;
        self.malformed += other.malformed;
    }
}

#[derive(Clone)]
pub struct LinkInterceptor {
    store: Arc<PolicyStore>,
    site: SiteProfile,
}

impl LinkInterceptor {
    pub fn new(store: Arc<PolicyStore>, site: SiteProfile) -> Self {
        Self { store, site }
    }

    /// Resolve `href` against the page URL.
    pub fn resolve(&self, page: &Url, href: &str) -> Result<Url, PolicyError> {
        self.site
            .resolve(page, href)
            .map_err(|e| PolicyError::MalformedLinkTarget {
                href: href.to_string(),
                reason: e.to_string(),
            })
    }

    /// Classify an absolute URL.
    pub fn evaluate_url(&self, url: &Url) -> LinkVerdict {
        let Some(host) = url.host_str() else {
            return LinkVerdict::External;
        };
        if !self.site.is_target_host(host) {
            return LinkVerdict::External;
        }
        if let Verdict::Deny { reason } = self.store.decide(url.path()) {
            return LinkVerdict::Denied(LinkDenial::Policy(reason));
        }
        if !self.site.is_canonical_host(host) {
            return LinkVerdict::Denied(LinkDenial::NonCanonicalHost(host.to_string()));
        }
        LinkVerdict::Allowed
    }

    /// Classify and flag every unflagged `<a href>` at or below `root`.
    pub fn classify_and_lock<D: Document>(
        &self,
        doc: &D,
        root: &D::Element,
        page: &Url,
    ) -> ScanReport {
        let mut report = ScanReport::default();
        for anchor in doc.anchors_within(root) {
            if is_flagged(doc, &anchor) {
                report.already_flagged += 1;
                continue;
            }
            report.examined += 1;
            doc.set_attribute(&anchor, LINK_FLAG, "1");

            let Some(href) = doc.attribute(&anchor, "href") else {
                continue;
            };
            let url = match self.resolve(page, &href) {
                Ok(url) => url,
                Err(e) => {
                    tracing::debug!(error = %e, "leaving unresolvable link untouched");
                    report.malformed += 1;
                    continue;
                }
            };
            match self.evaluate_url(&url) {
                LinkVerdict::External => report.external += 1,
                LinkVerdict::Allowed => report.allowed += 1,
                LinkVerdict::Denied(denial) => {
                    tracing::debug!(url = %url, ?denial, "locking link");
                    doc.remove_attribute(&anchor, "href");
                    disable_anchor(doc, &anchor);
                    report.locked += 1;
                }
            }
        }
        if report.locked > 0 {
            tracing::debug!(?report, "link scan");
        }
        report
    }
}

fn is_flagged<D: Document>(doc: &D, el: &D::Element) -> bool {
    doc.attribute(el, LINK_FLAG).as_deref() == Some("1")
}

/// Style an anchor as disabled and give it the blocked tooltip.
pub fn disable_anchor<D: Document>(doc: &D, anchor: &D::Element) {
    for (property, value) in DISABLED_STYLES {
        doc.set_style(anchor, property, value);
    }
    doc.set_attribute(anchor, "title", BLOCKED_TITLE);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_dom::MemoryDocument;
    use crate::site::SiteConfig;
    use fg_policy::{PolicyConfig, SystemClock};

    fn interceptor() -> LinkInterceptor {
        let store = Arc::new(PolicyStore::new(
            PolicyConfig::default(),
            None,
            Arc::new(SystemClock),
        ));
        LinkInterceptor::new(store, SiteProfile::new(&SiteConfig::default()).unwrap())
    }

    fn page() -> Url {
        Url::parse("https://www.reddit.com/r/freelance/").unwrap()
    }

    fn verdict(href: &str) -> LinkVerdict {
        let i = interceptor();
        i.evaluate_url(&i.resolve(&page(), href).unwrap())
    }

    #[test]
    fn classifies_by_policy_then_host() {
        assert_eq!(verdict("/r/freelance/comments/abc"), LinkVerdict::Allowed);
        assert_eq!(verdict("/user/someone"), LinkVerdict::Allowed);
        assert_eq!(verdict("https://example.com/r/all"), LinkVerdict::External);
        assert_eq!(verdict("mailto:someone@example.com"), LinkVerdict::External);
        assert_eq!(
            verdict("https://old.reddit.com/r/freelance/"),
            LinkVerdict::Denied(LinkDenial::NonCanonicalHost("old.reddit.com".into()))
        );
        // Feed block is reported even on a non-canonical host.
        assert_eq!(
            verdict("https://old.reddit.com/r/popular"),
            LinkVerdict::Denied(LinkDenial::Policy(DenyReason::FeedBlocked(
                "/r/popular".into()
            )))
        );
        assert!(verdict("/r/freelance2").is_denied());
    }

    #[test]
    fn denied_links_lose_href_and_get_disabled() {
        let doc = MemoryDocument::new();
        let body = doc.append_new(doc.root(), "body");
        let good = doc.append_link(body, "/r/freelance/new");
        let bad = doc.append_link(body, "/r/all");
        let external = doc.append_link(body, "https://example.com/");

        let report = interceptor().classify_and_lock(&doc, &body, &page());
        assert_eq!(report.examined, 3);
        assert_eq!(report.allowed, 1);
        assert_eq!(report.locked, 1);
        assert_eq!(report.external, 1);

        assert!(doc.attribute(&good, "href").is_some());
        assert!(doc.attribute(&external, "href").is_some());
        assert_eq!(doc.attribute(&bad, "href"), None);
        assert_eq!(doc.style(bad, "pointer-events").as_deref(), Some("none"));
        assert_eq!(doc.style(bad, "opacity").as_deref(), Some("0.35"));
        assert_eq!(doc.attribute(&bad, "title").as_deref(), Some(BLOCKED_TITLE));
        for el in [good, bad, external] {
            assert_eq!(doc.attribute(&el, LINK_FLAG).as_deref(), Some("1"));
        }
    }

    #[test]
    fn second_pass_mutates_nothing() {
        let doc = MemoryDocument::new();
        let body = doc.append_new(doc.root(), "body");
        let good = doc.append_link(body, "/r/freelance/");
        let i = interceptor();
        i.classify_and_lock(&doc, &body, &page());

        // A later href change on a flagged anchor is not re-examined.
        doc.set_attribute(&good, "href", "/r/all");
        let report = i.classify_and_lock(&doc, &body, &page());
        assert_eq!(report.examined, 0);
        assert_eq!(report.already_flagged, 1);
        assert_eq!(doc.attribute(&good, "href").as_deref(), Some("/r/all"));
    }

    #[test]
    fn replaced_anchor_is_classified_again() {
        let doc = MemoryDocument::new();
        let body = doc.append_new(doc.root(), "body");
        let link = doc.append_link(body, "/r/freelance/");
        let i = interceptor();
        i.classify_and_lock(&doc, &body, &page());

        doc.set_attribute(&link, "href", "/r/all");
        let fresh = doc.replace_with_clone(link).unwrap();
        let report = i.classify_and_lock(&doc, &fresh, &page());
        assert_eq!(report.examined, 1);
        assert_eq!(report.already_flagged, 0);
        assert_eq!(report.locked, 1);
        assert_eq!(doc.attribute(&fresh, "href"), None);
        assert_eq!(doc.attribute(&fresh, LINK_FLAG).as_deref(), Some("1"));
    }

    #[test]
    fn unresolvable_href_fails_open() {
        let doc = MemoryDocument::new();
        let body = doc.append_new(doc.root(), "body");
        let weird = doc.append_link(body, "https://[::1");
        let report = interceptor().classify_and_lock(&doc, &body, &page());
        assert_eq!(report.malformed, 1);
        assert_eq!(doc.attribute(&weird, "href").as_deref(), Some("https://[::1"));
        assert_eq!(doc.attribute(&weird, LINK_FLAG).as_deref(), Some("1"));
    }

    #[test]
    fn root_anchor_itself_is_scanned() {
        let doc = MemoryDocument::new();
        let body = doc.append_new(doc.root(), "body");
        let link = doc.append_link(body, "/best");
        let report = interceptor().classify_and_lock(&doc, &link, &page());
        assert_eq!(report.locked, 1);
    }
}
