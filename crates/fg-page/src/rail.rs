// rail.rs — Recommendation rail suppression.
//
// Best-effort, heuristic and site-specific. The one hard rule is that
// nothing inside the primary content region (`main`, `[role="main"]`) is
// ever hidden. Everything below the explicit rail check is additionally
// geometry-gated: the element must be shaped and placed like a right-hand
// rail.
//
// Checks per element, first hit wins:
//
// 1. `aside` / `[role="complementary"]`
// 2. sidebar-ish id/class/test-id, right-rail shaped
// 3. inline `position: sticky`, right-rail shaped
// 4. `section`/`div`/`aside` whose text mentions a recommendation widget,
//    right-rail shaped
//
// Each check flags what it looked at, so repeated passes are cheap and
// never re-hide.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::dom::Document;
use crate::error::PageError;

/// Set on elements the structural checks have hidden.
pub const RAIL_FLAG: &str = "data-fg-rail-killed";
/// Set on every element the keyword check has examined.
pub const TEXT_FLAG: &str = "data-fg-text-killed";
/// Which check hid an element.
pub const HIDE_WHY: &str = "data-fg-hide-why";

const RAIL_MIN_WIDTH: f64 = 220.0;
const RAIL_MAX_WIDTH: f64 = 650.0;
const RAIL_MIN_HEIGHT: f64 = 80.0;
const RAIL_MIN_LEFT_FRACTION: f64 = 0.55;

/// Rail suppression settings (`[rail]` in feedgate.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RailConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Widget headings that mark a block as a recommendation rail.
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
}

impl Default for RailConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            keywords: default_keywords(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_keywords() -> Vec<String> {
    [
        "recent posts",
        "recently viewed",
        "recent communities",
        "related posts",
        "related communities",
        "recommended",
        "you might like",
        "similar to",
        "trending",
        "popular on reddit",
        "more posts you may like",
        "because you visited",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Hides recommendation UI below a root.
pub trait RailSuppressor<D: Document> {
    /// One pass over `root` and its descendants. Returns how many elements
    /// were hidden.
    fn suppress(&self, doc: &D, root: &D::Element) -> usize;
}

/// Suppressor that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRailSuppressor;

impl<D: Document> RailSuppressor<D> for NoopRailSuppressor {
    fn suppress(&self, _doc: &D, _root: &D::Element) -> usize {
        0
    }
}

#[derive(Debug, Clone)]
pub struct HeuristicRailSuppressor {
    keywords: Option<Regex>,
}

impl HeuristicRailSuppressor {
    pub fn new(config: &RailConfig) -> Result<Self, PageError> {
        let words: Vec<String> = config
            .keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(regex::escape)
            .collect();
        let keywords = if words.is_empty() {
            None
        } else {
            Some(
                RegexBuilder::new(&words.join("|"))
                    .case_insensitive(true)
                    .build()?,
            )
        };
        Ok(Self { keywords })
    }

    fn classify<D: Document>(&self, doc: &D, el: &D::Element) -> Option<&'static str> {
        if doc.attribute(el, RAIL_FLAG).as_deref() == Some("1") {
            return None;
        }
        let tag = doc.tag_name(el);

        let role = doc.attribute(el, "role").unwrap_or_default();
        if tag == "aside" || role.eq_ignore_ascii_case("complementary") {
            doc.set_attribute(el, RAIL_FLAG, "1");
            return Some("explicit-rail");
        }
        if looks_sidebar_like(doc, el) && looks_like_right_rail(doc, el) {
            doc.set_attribute(el, RAIL_FLAG, "1");
            return Some("sidebar-like-shape");
        }
        if is_sticky(doc, el) && looks_like_right_rail(doc, el) {
            doc.set_attribute(el, RAIL_FLAG, "1");
            return Some("sticky-right-rail");
        }

        if matches!(tag.as_str(), "section" | "div" | "aside")
            && doc.attribute(el, TEXT_FLAG).as_deref() != Some("1")
        {
            doc.set_attribute(el, TEXT_FLAG, "1");
            let keywords = self.keywords.as_ref()?;
            if looks_like_right_rail(doc, el) && keywords.is_match(doc.text_content(el).trim()) {
                return Some("rail-text");
            }
        }
        None
    }
}

impl<D: Document> RailSuppressor<D> for HeuristicRailSuppressor {
    fn suppress(&self, doc: &D, root: &D::Element) -> usize {
        let mut hidden = 0;
        for el in doc.descendants(root) {
            if in_primary_content(doc, &el) {
                continue;
            }
            if let Some(why) = self.classify(doc, &el) {
                hide(doc, &el, why);
                hidden += 1;
            }
        }
        if hidden > 0 {
            tracing::debug!(hidden, "suppressed rail elements");
        }
        hidden
    }
}

fn hide<D: Document>(doc: &D, el: &D::Element, why: &str) {
    doc.set_style(el, "display", "none");
    doc.set_style(el, "visibility", "hidden");
    doc.set_attribute(el, HIDE_WHY, why);
}

fn in_primary_content<D: Document>(doc: &D, el: &D::Element) -> bool {
    doc.closest(el, &|d, e| {
        d.tag_name(e) == "main" || d.attribute(e, "role").as_deref() == Some("main")
    })
    .is_some()
}

fn looks_like_right_rail<D: Document>(doc: &D, el: &D::Element) -> bool {
    let Some(rect) = doc.bounding_rect(el) else {
        return false;
    };
    if rect.width < RAIL_MIN_WIDTH || rect.height < RAIL_MIN_HEIGHT {
        return false;
    }
    if rect.width > RAIL_MAX_WIDTH {
        return false;
    }
    rect.left > doc.viewport_width() * RAIL_MIN_LEFT_FRACTION
}

fn looks_sidebar_like<D: Document>(doc: &D, el: &D::Element) -> bool {
    let attr = |name: &str| doc.attribute(el, name).unwrap_or_default().to_lowercase();
    let class = attr("class");
    attr("data-testid").contains("sidebar")
        || attr("id").contains("sidebar")
        || class.contains("sidebar")
        || (class.contains("right") && class.contains("rail"))
}

fn is_sticky<D: Document>(doc: &D, el: &D::Element) -> bool {
    let style = doc.attribute(el, "style").unwrap_or_default().to_lowercase();
    style.contains("position:sticky") || style.contains("position: sticky")
}
