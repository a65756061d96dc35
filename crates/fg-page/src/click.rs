// click.rs — Capture-phase click guard.
//
// Anchors inserted since the last flush haven't been classified yet. The
// guard evaluates the clicked anchor on the spot: a plain primary click on
// a denied link is cancelled and sent home, a middle click is cancelled
// without navigation. Modified clicks, clicks outside anchors and clicks
// already handled by someone else pass through.

use url::Url;

use crate::dom::Document;
use crate::links::{disable_anchor, LinkInterceptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Primary,
    Middle,
    Other(u16),
}

impl MouseButton {
    /// Map a DOM `MouseEvent.button` value.
    pub fn from_dom(button: u16) -> Self {
        match button {
            0 => MouseButton::Primary,
            1 => MouseButton::Middle,
            other => MouseButton::Other(other),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub meta: bool,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub fn any(&self) -> bool {
        self.meta || self.ctrl || self.shift || self.alt
    }
}

#[derive(Debug, Clone)]
pub struct ClickEvent<E> {
    /// The element that received the click.
    pub target: E,
    pub button: MouseButton,
    pub modifiers: Modifiers,
    pub default_prevented: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickVerdict {
    PassThrough,
    /// Cancel the event. Navigate to `redirect_to` when set.
    Block {
        redirect_to: Option<Url>,
        reason: String,
    },
}

pub struct ClickGuard {
    interceptor: LinkInterceptor,
}

impl ClickGuard {
    pub fn new(interceptor: LinkInterceptor) -> Self {
        Self { interceptor }
    }

    /// Judge one click. `home` is only called for a redirecting block.
    pub fn on_click<D: Document>(
        &self,
        doc: &D,
        event: &ClickEvent<D::Element>,
        page: &Url,
        home: impl FnOnce() -> Url,
    ) -> ClickVerdict {
        if event.default_prevented {
            return ClickVerdict::PassThrough;
        }
        let redirect = match event.button {
            MouseButton::Primary if !event.modifiers.any() => true,
            MouseButton::Middle => false,
            _ => return ClickVerdict::PassThrough,
        };

        let Some(anchor) = doc.closest(&event.target, &|d, el| {
            d.tag_name(el) == "a" && d.attribute(el, "href").is_some()
        }) else {
            return ClickVerdict::PassThrough;
        };
        let Some(href) = doc.attribute(&anchor, "href") else {
            return ClickVerdict::PassThrough;
        };
        let Ok(url) = self.interceptor.resolve(page, &href) else {
            return ClickVerdict::PassThrough;
        };
        if !self.interceptor.evaluate_url(&url).is_denied() {
            return ClickVerdict::PassThrough;
        }

        disable_anchor(doc, &anchor);
        let reason = format!("Blocked click: {}", url.path());
        tracing::info!(url = %url, button = ?event.button, "blocked click");
        ClickVerdict::Block {
            redirect_to: redirect.then(home),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::memory_dom::{ElementId, MemoryDocument};
    use crate::site::{SiteConfig, SiteProfile};
    use fg_policy::{PolicyConfig, PolicyStore, SystemClock};

    fn guard() -> ClickGuard {
        let store = Arc::new(PolicyStore::new(
            PolicyConfig::default(),
            None,
            Arc::new(SystemClock),
        ));
        let site = SiteProfile::new(&SiteConfig::default()).unwrap();
        ClickGuard::new(LinkInterceptor::new(store, site))
    }

    fn page() -> Url {
        Url::parse("https://www.reddit.com/r/freelance/").unwrap()
    }

    fn home() -> Url {
        page()
    }

    fn click(target: ElementId, button: MouseButton) -> ClickEvent<ElementId> {
        ClickEvent {
            target,
            button,
            modifiers: Modifiers::default(),
            default_prevented: false,
        }
    }

    fn doc_with_link(href: &str) -> (MemoryDocument, ElementId, ElementId) {
        let doc = MemoryDocument::new();
        let body = doc.append_new(doc.root(), "body");
        let link = doc.append_link(body, href);
        let span = doc.append_new(link, "span");
        (doc, link, span)
    }

    #[test]
    fn primary_click_on_feed_link_redirects_home() {
        let (doc, link, span) = doc_with_link("/r/popular/");
        let verdict = guard().on_click(&doc, &click(span, MouseButton::Primary), &page(), home);
        assert_eq!(
            verdict,
            ClickVerdict::Block {
                redirect_to: Some(home()),
                reason: "Blocked click: /r/popular/".to_string(),
            }
        );
        assert_eq!(doc.style(link, "cursor").as_deref(), Some("not-allowed"));
    }

    #[test]
    fn middle_click_blocks_without_redirect() {
        let (doc, link, _) = doc_with_link("/r/other");
        let verdict = guard().on_click(&doc, &click(link, MouseButton::Middle), &page(), || {
            panic!("home must not be computed")
        });
        assert!(matches!(verdict, ClickVerdict::Block { redirect_to: None, .. }));
    }

    #[test]
    fn modified_and_handled_clicks_pass() {
        let (doc, link, _) = doc_with_link("/r/all");
        let g = guard();

        let mut event = click(link, MouseButton::Primary);
        event.modifiers.ctrl = true;
        assert_eq!(g.on_click(&doc, &event, &page(), home), ClickVerdict::PassThrough);

        let mut event = click(link, MouseButton::Primary);
        event.default_prevented = true;
        assert_eq!(g.on_click(&doc, &event, &page(), home), ClickVerdict::PassThrough);

        let event = click(link, MouseButton::from_dom(2));
        assert_eq!(g.on_click(&doc, &event, &page(), home), ClickVerdict::PassThrough);
    }

    #[test]
    fn allowed_external_and_non_anchor_targets_pass() {
        let g = guard();
        for href in ["/r/freelance/comments/1", "https://example.com/"] {
            let (doc, link, _) = doc_with_link(href);
            let event = click(link, MouseButton::Primary);
            assert_eq!(g.on_click(&doc, &event, &page(), home), ClickVerdict::PassThrough);
        }

        let doc = MemoryDocument::new();
        let div = doc.append_new(doc.root(), "div");
        let event = click(div, MouseButton::Primary);
        assert_eq!(g.on_click(&doc, &event, &page(), home), ClickVerdict::PassThrough);
    }
}
