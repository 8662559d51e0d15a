//! WebPage: `PageTree` over the live browser DOM
//!
//! Queries go straight to `querySelector`/`closest` using the selector source
//! text, so the browser's own matcher is authoritative here. Text leaves are
//! enumerated with a `TreeWalker` restricted to text nodes.

use crate::dom::{MarkerTemplate, PageTree, Piece, SelectorList, VisitedSet};
use crate::error::DomError;
use js_sys::{Object, WeakSet};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, Node};

/// `NodeFilter.SHOW_TEXT`
const SHOW_TEXT: u32 = 0x4;

fn host(err: JsValue) -> DomError {
    DomError::Host(err.as_string().unwrap_or_else(|| format!("{:?}", err)))
}

// =============================================================================
// WeakNodeSet
// =============================================================================

/// Visited set backed by a JS `WeakSet`: removed nodes are collected normally.
#[derive(Debug, Clone)]
pub struct WeakNodeSet {
    inner: WeakSet,
}

impl Default for WeakNodeSet {
    fn default() -> Self {
        Self {
            inner: WeakSet::new(),
        }
    }
}

impl VisitedSet<Node> for WeakNodeSet {
    fn contains(&self, node: &Node) -> bool {
        let object: &Object = node.as_ref();
        self.inner.has(object)
    }

    fn insert(&mut self, node: &Node) {
        let object: &Object = node.as_ref();
        self.inner.add(object);
    }
}

// =============================================================================
// WebPage
// =============================================================================

#[derive(Debug, Clone)]
pub struct WebPage {
    document: Document,
}

impl WebPage {
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    /// The page this script runs in.
    pub fn current() -> Result<Self, JsValue> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| JsValue::from_str("no document"))?;
        Ok(Self::new(document))
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    fn element(&self, tag: &str, class: &str, style: &str) -> Result<Element, DomError> {
        let element = self.document.create_element(tag).map_err(host)?;
        element.set_class_name(class);
        element.set_attribute("style", style).map_err(host)?;
        Ok(element)
    }

    fn build_piece(&self, piece: &Piece, template: &MarkerTemplate) -> Result<Node, DomError> {
        match piece {
            Piece::Text(text) => Ok(self.document.create_text_node(text).into()),
            Piece::Year { text, age } => {
                let wrapper = self.element("span", &template.wrapper_class, &template.wrapper_style)?;
                wrapper
                    .append_child(&self.document.create_text_node(text))
                    .map_err(host)?;
                let marker = self.element("span", &template.marker_class, &template.marker_style)?;
                marker.set_text_content(Some(Piece::age_label(*age).as_str()));
                wrapper.append_child(&marker).map_err(host)?;
                Ok(wrapper.into())
            }
        }
    }
}

fn list_nodes(list: &web_sys::NodeList) -> Vec<Node> {
    (0..list.length()).filter_map(|i| list.get(i)).collect()
}

impl PageTree for WebPage {
    type Node = Node;
    type Visited = WeakNodeSet;

    fn query(&self, scope: Option<&Node>, selector: &SelectorList) -> Option<Node> {
        let found = match scope {
            Some(node) => node.dyn_ref::<Element>()?.query_selector(selector.as_str()),
            None => self.document.query_selector(selector.as_str()),
        };
        found.ok().flatten().map(Into::into)
    }

    fn query_all(&self, scope: Option<&Node>, selector: &SelectorList) -> Vec<Node> {
        let found = match scope {
            Some(node) => match node.dyn_ref::<Element>() {
                Some(element) => element.query_selector_all(selector.as_str()),
                None => return Vec::new(),
            },
            None => self.document.query_selector_all(selector.as_str()),
        };
        found.map(|list| list_nodes(&list)).unwrap_or_default()
    }

    fn text_content(&self, node: &Node) -> String {
        node.text_content().unwrap_or_default()
    }

    fn text_fragments(&self, root: &Node) -> Vec<Node> {
        let Ok(walker) = self.document.create_tree_walker_with_what_to_show(root, SHOW_TEXT) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        while let Ok(Some(node)) = walker.next_node() {
            out.push(node);
        }
        out
    }

    fn fragment_text(&self, fragment: &Node) -> Option<String> {
        if fragment.node_type() != Node::TEXT_NODE {
            return None;
        }
        fragment.node_value()
    }

    fn parent_element(&self, node: &Node) -> Option<Node> {
        node.parent_element().map(Into::into)
    }

    fn closest(&self, element: &Node, selector: &SelectorList) -> Option<Node> {
        element
            .dyn_ref::<Element>()?
            .closest(selector.as_str())
            .ok()
            .flatten()
            .map(Into::into)
    }

    fn tag_name(&self, element: &Node) -> Option<String> {
        element
            .dyn_ref::<Element>()
            .map(|e| e.tag_name().to_ascii_lowercase())
    }

    fn is_within(&self, ancestor: &Node, node: &Node) -> bool {
        ancestor.contains(Some(node))
    }

    fn splice(
        &mut self,
        fragment: &Node,
        pieces: &[Piece],
        template: &MarkerTemplate,
    ) -> Result<Vec<Node>, DomError> {
        if fragment.node_type() != Node::TEXT_NODE {
            return Err(DomError::WrongKind { expected: "text" });
        }
        let parent = fragment.parent_node().ok_or(DomError::Detached)?;

        let mut inserted = Vec::with_capacity(pieces.len());
        let mut literals = Vec::new();
        for piece in pieces {
            let result = self
                .build_piece(piece, template)
                .and_then(|node| parent.insert_before(&node, Some(fragment)).map_err(host));
            match result {
                Ok(node) => {
                    if matches!(piece, Piece::Text(_)) {
                        literals.push(node.clone());
                    }
                    inserted.push(node);
                }
                Err(err) => {
                    for node in &inserted {
                        let _ = parent.remove_child(node);
                    }
                    return Err(err);
                }
            }
        }
        parent.remove_child(fragment).map_err(host)?;
        Ok(literals)
    }

    fn unwrap_markers(&mut self, wrappers: &SelectorList, markers: &SelectorList) -> usize {
        let mut removed = 0;
        for wrapper in self.query_all(None, wrappers) {
            let Some(parent) = wrapper.parent_node() else {
                continue;
            };
            for marker in self.query_all(Some(&wrapper), markers) {
                if let Some(element) = marker.dyn_ref::<Element>() {
                    element.remove();
                }
            }
            let plain = self
                .document
                .create_text_node(&wrapper.text_content().unwrap_or_default());
            if parent.replace_child(&plain, &wrapper).is_ok() {
                removed += 1;
            }
        }
        for marker in self.query_all(None, markers) {
            if let Some(element) = marker.dyn_ref::<Element>() {
                element.remove();
                removed += 1;
            }
        }
        removed
    }

    fn root_flag(&self, name: &str) -> bool {
        self.document
            .document_element()
            .map_or(false, |root| root.has_attribute(name))
    }

    fn set_root_flag(&mut self, name: &str, on: bool) {
        let Some(root) = self.document.document_element() else {
            return;
        };
        let result = if on {
            root.set_attribute(name, "true")
        } else {
            root.remove_attribute(name)
        };
        if let Err(err) = result {
            log::warn!("[WebPage] could not update {}: {:?}", name, err);
        }
    }
}
