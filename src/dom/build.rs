//! El - declarative builder for `Document` subtrees
//!
//! ```rust
//! use wikiage::dom::{el, Document};
//!
//! let doc = Document::with_body(
//!     el("div").class("mw-parser-output")
//!         .child(el("p").text("Ada Lovelace (born 1815) was a mathematician.")),
//! );
//! assert_eq!(doc.text_content(doc.root()), "Ada Lovelace (born 1815) was a mathematician.");
//! ```

use super::document::{Document, NodeId};
use crate::error::DomError;

/// Node description consumed by `Document::build`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Markup {
    Element(El),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct El {
    tag: String,
    attributes: Vec<(String, String)>,
    children: Vec<Markup>,
}

/// Start an element description.
pub fn el(tag: &str) -> El {
    El {
        tag: tag.to_string(),
        attributes: Vec::new(),
        children: Vec::new(),
    }
}

impl El {
    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    pub fn id(self, id: &str) -> Self {
        self.attr("id", id)
    }

    /// Add a class, merging with any class already set.
    pub fn class(mut self, class: &str) -> Self {
        match self.attributes.iter_mut().find(|(n, _)| n == "class") {
            Some((_, v)) => {
                v.push(' ');
                v.push_str(class);
            }
            None => self.attributes.push(("class".to_string(), class.to_string())),
        }
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.children.push(Markup::Text(text.to_string()));
        self
    }

    pub fn child(mut self, child: El) -> Self {
        self.children.push(Markup::Element(child));
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = El>) -> Self {
        self.children
            .extend(children.into_iter().map(Markup::Element));
        self
    }
}

impl Document {
    /// Materialize `markup` and append it to `parent`.
    pub fn build(&mut self, parent: NodeId, markup: El) -> Result<NodeId, DomError> {
        let node = self.build_detached(markup)?;
        self.append_child(parent, node)?;
        Ok(node)
    }

    fn build_detached(&mut self, markup: El) -> Result<NodeId, DomError> {
        let node = self.create_element(&markup.tag);
        for (name, value) in &markup.attributes {
            self.set_attribute(node, name, value)?;
        }
        for child in markup.children {
            let child_node = match child {
                Markup::Text(text) => self.create_text(&text),
                Markup::Element(el) => self.build_detached(el)?,
            };
            self.append_child(node, child_node)?;
        }
        Ok(node)
    }

    /// Document whose root holds `body`. Construction records are discarded.
    pub fn with_body(body: El) -> Self {
        let mut doc = Document::new();
        let root = doc.root();
        // a fresh document always accepts an element child
        let _ = doc.build(root, body);
        doc.take_records();
        doc
    }
}
