use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::html::parse_html;
use crate::selector::{
    NthChildSelector, SelectorAttrCondition, SelectorCombinator, SelectorPart,
    SelectorPseudoClass, SelectorStep, parse_selector_groups,
};
use crate::{Error, Result};

mod content;
mod matching;
mod serialize;
mod tree;

pub(crate) use serialize::is_void_tag;

/// Stable handle of a node inside one document's arena.
///
/// Handles stay valid for the lifetime of the document; nodes replaced through
/// `innerHTML` become detached but are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone)]
pub(crate) enum NodeType {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) node_type: NodeType,
}

#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub(crate) tag_name: String,
    pub(crate) attrs: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub(crate) struct Dom {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
}

/// Shared, mutable document tree.
///
/// Cloning a `Document` clones the handle, not the tree: every clone observes
/// and performs the same mutations. Use [`Document::deep_clone`] for an
/// independent copy.
#[derive(Debug, Clone)]
pub struct Document {
    dom: Rc<RefCell<Dom>>,
}

impl Document {
    pub fn parse(html: &str) -> Self {
        Self::from_dom(parse_html(html))
    }

    pub(crate) fn from_dom(dom: Dom) -> Self {
        Self {
            dom: Rc::new(RefCell::new(dom)),
        }
    }

    pub(crate) fn with_dom<R>(&self, f: impl FnOnce(&Dom) -> R) -> R {
        f(&self.dom.borrow())
    }

    pub(crate) fn with_dom_mut<R>(&self, f: impl FnOnce(&mut Dom) -> R) -> R {
        f(&mut self.dom.borrow_mut())
    }

    pub fn deep_clone(&self) -> Self {
        Self::from_dom(self.dom.borrow().clone())
    }

    /// Whether both handles point at the same tree.
    pub fn same_tree(&self, other: &Document) -> bool {
        Rc::ptr_eq(&self.dom, &other.dom)
    }

    /// Live handles to this tree, including the ones held by script wrappers.
    #[cfg(test)]
    pub(crate) fn handle_count(&self) -> usize {
        Rc::strong_count(&self.dom)
    }

    pub fn root(&self) -> NodeId {
        self.with_dom(|dom| dom.root)
    }

    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.with_dom(|dom| dom.element_by_id(id))
    }

    pub fn elements_by_tag_name(&self, tag: &str) -> Vec<NodeId> {
        self.with_dom(|dom| dom.elements_by_tag_name(dom.root, tag))
    }

    pub fn query_selector(&self, selector: &str) -> Result<Option<NodeId>> {
        self.with_dom(|dom| dom.query_selector(selector))
    }

    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        self.with_dom(|dom| dom.query_selector_all(selector))
    }

    /// Selector matches among the descendants of `scope`, in document order.
    pub fn query_selector_all_within(&self, scope: NodeId, selector: &str) -> Result<Vec<NodeId>> {
        self.with_dom(|dom| dom.query_selector_all_from(scope, selector))
    }

    /// Lower-case tag name, or `None` for non-element nodes.
    pub fn tag_name(&self, node: NodeId) -> Option<String> {
        self.with_dom(|dom| dom.tag_name(node).map(str::to_string))
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.with_dom(|dom| dom.attribute(node, name).map(str::to_string))
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.with_dom(|dom| dom.attribute(node, name).is_some())
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<()> {
        self.with_dom_mut(|dom| dom.set_attribute(node, name, value))
    }

    pub fn text_content(&self, node: NodeId) -> String {
        self.with_dom(|dom| dom.text_content(node))
    }

    pub fn set_text_content(&self, node: NodeId, text: &str) -> Result<()> {
        self.with_dom_mut(|dom| dom.set_text_content(node, text))
    }

    pub fn inner_text(&self, node: NodeId) -> String {
        self.with_dom(|dom| dom.inner_text(node))
    }

    pub fn inner_html(&self, node: NodeId) -> Result<String> {
        self.with_dom(|dom| dom.inner_html(node))
    }

    pub fn set_inner_html(&self, node: NodeId, html: &str) -> Result<()> {
        self.with_dom_mut(|dom| dom.set_inner_html(node, html))
    }

    pub fn outer_html(&self, node: NodeId) -> Result<String> {
        self.with_dom(|dom| dom.outer_html(node))
    }

    pub fn title(&self) -> String {
        self.with_dom(|dom| dom.document_title())
    }

    pub fn set_title(&self, title: &str) -> Result<()> {
        self.with_dom_mut(|dom| dom.set_document_title(title))
    }

    /// Text content of the first element matching `selector`.
    pub fn text(&self, selector: &str) -> Result<Option<String>> {
        self.with_dom(|dom| {
            Ok(dom
                .query_selector(selector)?
                .map(|node| dom.text_content(node)))
        })
    }

    /// Serializes the whole document.
    pub fn to_html(&self) -> String {
        self.with_dom(|dom| dom.dump_node(dom.root))
    }
}
