// dom.rs — The slice of the DOM the page pipeline needs.
//
// The gate, link interceptor and rail suppressor never touch a concrete
// DOM. They work through this trait, implemented by the host binding in
// the browser and by `MemoryDocument` in tests and tooling. Methods take
// `&self`: DOM handles are shared, mutation goes through the document.

use std::fmt::Debug;
use std::hash::Hash;

/// An element's layout box in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

/// Read and write access to a live document.
pub trait Document {
    /// A cheap, comparable handle to one element.
    type Element: Clone + Eq + Hash + Debug;

    /// The document element (`<html>`).
    fn root(&self) -> Self::Element;

    /// Lower-case tag name.
    fn tag_name(&self, el: &Self::Element) -> String;

    fn attribute(&self, el: &Self::Element, name: &str) -> Option<String>;

    fn set_attribute(&self, el: &Self::Element, name: &str, value: &str);

    fn remove_attribute(&self, el: &Self::Element, name: &str);

    /// Set an inline style property with `!important` priority.
    fn set_style(&self, el: &Self::Element, property: &str, value: &str);

    fn parent(&self, el: &Self::Element) -> Option<Self::Element>;

    /// `root` followed by every element below it, in document order.
    fn descendants(&self, root: &Self::Element) -> Vec<Self::Element>;

    fn text_content(&self, el: &Self::Element) -> String;

    /// Layout box, or `None` when the element isn't rendered.
    fn bounding_rect(&self, el: &Self::Element) -> Option<Rect>;

    fn viewport_width(&self) -> f64;

    /// True while the element is attached to the document.
    fn is_connected(&self, el: &Self::Element) -> bool;

    /// Every `<a href>` at or below `root`.
    fn anchors_within(&self, root: &Self::Element) -> Vec<Self::Element> {
        self.descendants(root)
            .into_iter()
            .filter(|el| self.tag_name(el) == "a" && self.attribute(el, "href").is_some())
            .collect()
    }

    /// Nearest inclusive ancestor matching `pred`.
    fn closest(
        &self,
        el: &Self::Element,
        pred: &dyn Fn(&Self, &Self::Element) -> bool,
    ) -> Option<Self::Element> {
        let mut current = Some(el.clone());
        while let Some(node) = current {
            if pred(self, &node) {
                return Some(node);
            }
            current = self.parent(&node);
        }
        None
    }
}
