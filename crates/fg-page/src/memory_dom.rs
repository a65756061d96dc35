// memory_dom.rs — In-memory document for tests and tooling.
//
// A small arena DOM: elements are `ElementId`s into a node table, with
// attributes, inline styles, text, an optional layout box and parent/child
// links. Tree insertions and removals are recorded as mutation records the
// way a subtree MutationObserver would report them, so callers can feed
// them to the reconciler. Attribute and style writes are not recorded.

use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::dom::{Document, Rect};
use crate::scheduler::MutationRecord;

const FLAG_PREFIX: &str = "data-fg-";

/// Handle to an element of a [`MemoryDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(usize);

#[derive(Debug, Default)]
struct Node {
    tag: String,
    attributes: BTreeMap<String, String>,
    styles: BTreeMap<String, String>,
    text: String,
    rect: Option<Rect>,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
}

#[derive(Debug)]
struct Tree {
    nodes: Vec<Node>,
    viewport_width: f64,
    mutations: Vec<MutationRecord<ElementId>>,
}

/// An arena-backed document with a single `<html>` root.
#[derive(Debug)]
pub struct MemoryDocument {
    tree: RefCell<Tree>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        let root = Node {
            tag: "html".to_string(),
            ..Node::default()
        };
        Self {
            tree: RefCell::new(Tree {
                nodes: vec![root],
                viewport_width: 1280.0,
                mutations: Vec::new(),
            }),
        }
    }

    pub fn set_viewport_width(&self, width: f64) {
        self.tree.borrow_mut().viewport_width = width;
    }

    /// Create a detached element.
    pub fn create_element(&self, tag: &str) -> ElementId {
        let mut tree = self.tree.borrow_mut();
        tree.nodes.push(Node {
            tag: tag.to_lowercase(),
            ..Node::default()
        });
        ElementId(tree.nodes.len() - 1)
    }

    /// Create an element and append it under `parent` in one step.
    pub fn append_new(&self, parent: ElementId, tag: &str) -> ElementId {
        let el = self.create_element(tag);
        self.append_child(parent, el);
        el
    }

    /// Create an `<a href>` under `parent`.
    pub fn append_link(&self, parent: ElementId, href: &str) -> ElementId {
        let el = self.create_element("a");
        self.set_attribute(&el, "href", href);
        self.append_child(parent, el);
        el
    }

    /// Attach `child` under `parent`, detaching it from any previous parent.
    /// Recorded as an insertion when `parent` is connected.
    pub fn append_child(&self, parent: ElementId, child: ElementId) {
        if self.tree.borrow().nodes[child.0].parent.is_some() {
            self.detach(child, false);
        }
        let connected = self.is_connected(&parent);
        let mut tree = self.tree.borrow_mut();
        tree.nodes[child.0].parent = Some(parent);
        tree.nodes[parent.0].children.push(child);
        if connected {
            tree.mutations.push(MutationRecord::Inserted(child));
        }
    }

    /// Detach `el` from its parent. Recorded as a removal when it was connected.
    pub fn remove(&self, el: ElementId) {
        self.detach(el, true);
    }

    /// Swap `old` for a fresh element with the same tag and attributes,
    /// minus the pipeline's own `data-fg-*` markers, as a framework
    /// re-render would produce. Returns the replacement.
    pub fn replace_with_clone(&self, old: ElementId) -> Option<ElementId> {
        let (parent, tag, attributes, text) = {
            let tree = self.tree.borrow();
            let node = &tree.nodes[old.0];
            (
                node.parent?,
                node.tag.clone(),
                node.attributes.clone(),
                node.text.clone(),
            )
        };
        self.remove(old);
        let fresh = self.create_element(&tag);
        {
            let mut tree = self.tree.borrow_mut();
            tree.nodes[fresh.0].attributes = attributes
                .into_iter()
                .filter(|(name, _)| !name.starts_with(FLAG_PREFIX))
                .collect();
            tree.nodes[fresh.0].text = text;
        }
        self.append_child(parent, fresh);
        Some(fresh)
    }

    pub fn set_text(&self, el: ElementId, text: &str) {
        self.tree.borrow_mut().nodes[el.0].text = text.to_string();
    }

    pub fn set_rect(&self, el: ElementId, rect: Rect) {
        self.tree.borrow_mut().nodes[el.0].rect = Some(rect);
    }

    /// Read back an inline style property.
    pub fn style(&self, el: ElementId, property: &str) -> Option<String> {
        self.tree.borrow().nodes[el.0].styles.get(property).cloned()
    }

    /// Drain the recorded insertions and removals.
    pub fn take_mutations(&self) -> Vec<MutationRecord<ElementId>> {
        std::mem::take(&mut self.tree.borrow_mut().mutations)
    }

    fn detach(&self, el: ElementId, record: bool) {
        let connected = self.is_connected(&el);
        let mut tree = self.tree.borrow_mut();
        if let Some(parent) = tree.nodes[el.0].parent.take() {
            tree.nodes[parent.0].children.retain(|c| *c != el);
            if record && connected {
                tree.mutations.push(MutationRecord::Removed(el));
            }
        }
    }
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl Document for MemoryDocument {
    type Element = ElementId;

    fn root(&self) -> ElementId {
        ElementId(0)
    }

    fn tag_name(&self, el: &ElementId) -> String {
        self.tree.borrow().nodes[el.0].tag.clone()
    }

    fn attribute(&self, el: &ElementId, name: &str) -> Option<String> {
        self.tree.borrow().nodes[el.0].attributes.get(name).cloned()
    }

    fn set_attribute(&self, el: &ElementId, name: &str, value: &str) {
        self.tree.borrow_mut().nodes[el.0]
            .attributes
            .insert(name.to_string(), value.to_string());
    }

    fn remove_attribute(&self, el: &ElementId, name: &str) {
        self.tree.borrow_mut().nodes[el.0].attributes.remove(name);
    }

    fn set_style(&self, el: &ElementId, property: &str, value: &str) {
        self.tree.borrow_mut().nodes[el.0]
            .styles
            .insert(property.to_string(), value.to_string());
    }

    fn parent(&self, el: &ElementId) -> Option<ElementId> {
        self.tree.borrow().nodes[el.0].parent
    }

    fn descendants(&self, root: &ElementId) -> Vec<ElementId> {
        let tree = self.tree.borrow();
        let mut out = Vec::new();
        let mut stack = vec![*root];
        while let Some(el) = stack.pop() {
            out.push(el);
            stack.extend(tree.nodes[el.0].children.iter().rev().copied());
        }
        out
    }

    fn text_content(&self, el: &ElementId) -> String {
        let parts: Vec<String> = self
            .descendants(el)
            .iter()
            .map(|d| self.tree.borrow().nodes[d.0].text.clone())
            .filter(|t| !t.is_empty())
            .collect();
        parts.join(" ")
    }

    fn bounding_rect(&self, el: &ElementId) -> Option<Rect> {
        self.tree.borrow().nodes[el.0].rect
    }

    fn viewport_width(&self) -> f64 {
        self.tree.borrow().viewport_width
    }

    fn is_connected(&self, el: &ElementId) -> bool {
        let root = self.root();
        let mut current = Some(*el);
        while let Some(node) = current {
            if node == root {
                return true;
            }
            current = self.parent(&node);
        }
        false
    }
}
