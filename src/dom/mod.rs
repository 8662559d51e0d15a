//! Document layer
//!
//! The annotator never talks to a concrete DOM directly. Everything it needs
//! from a page goes through [`PageTree`]:
//! - `document.rs` - `Document`, an arena-backed in-memory tree (native runs, tests)
//! - `selector.rs` - the CSS subset the configuration is written in
//! - `build.rs` - `El` builder for assembling documents
//! - `serialize.rs` - `to_html` rendering for diagnostics
//!
//! The browser implementation lives in `crate::web` and is only compiled for
//! `wasm32`.

pub mod build;
pub mod document;
pub mod selector;
pub mod serialize;

pub use build::*;
pub use document::*;
pub use selector::*;
pub use serialize::*;

use crate::error::DomError;
use std::fmt;

// =============================================================================
// Splice model
// =============================================================================

/// One piece of a rewritten fragment, in left-to-right order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    /// Literal text carried over from the original fragment
    Text(String),
    /// A qualifying year: literal year text followed by an `(age N)` marker
    Year { text: String, age: i32 },
}

impl Piece {
    /// Text the marker element displays for an age.
    pub fn age_label(age: i32) -> String {
        format!("(age {})", age)
    }
}

/// Classes and inline styles stamped onto inserted wrappers and markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerTemplate {
    pub wrapper_class: String,
    pub wrapper_style: String,
    pub marker_class: String,
    pub marker_style: String,
}

// =============================================================================
// Mutations
// =============================================================================

/// A change observed in the document, in the shape a `MutationObserver`
/// reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord<N> {
    ChildList {
        target: N,
        added: usize,
        removed: usize,
    },
    Attributes {
        target: N,
        name: String,
    },
    CharacterData {
        target: N,
    },
}

impl<N> MutationRecord<N> {
    pub fn target(&self) -> &N {
        match self {
            MutationRecord::ChildList { target, .. }
            | MutationRecord::Attributes { target, .. }
            | MutationRecord::CharacterData { target } => target,
        }
    }
}

// =============================================================================
// Traits
// =============================================================================

/// Set of fragment identities already inspected during a page view.
///
/// Implementations must not keep removed nodes alive.
pub trait VisitedSet<N>: Default {
    fn contains(&self, node: &N) -> bool;
    fn insert(&mut self, node: &N);
}

/// Read/rewrite access to a rendered page.
pub trait PageTree {
    type Node: Clone + fmt::Debug;
    type Visited: VisitedSet<Self::Node>;

    /// First element matching `selector` under `scope` (whole document if `None`).
    fn query(&self, scope: Option<&Self::Node>, selector: &SelectorList) -> Option<Self::Node>;

    /// All elements matching `selector` under `scope`, in document order.
    fn query_all(&self, scope: Option<&Self::Node>, selector: &SelectorList) -> Vec<Self::Node>;

    fn text_content(&self, node: &Self::Node) -> String;

    /// Text leaves under `root`, in document order.
    fn text_fragments(&self, root: &Self::Node) -> Vec<Self::Node>;

    /// Character data of a text leaf. `None` for elements and dead nodes.
    fn fragment_text(&self, fragment: &Self::Node) -> Option<String>;

    fn parent_element(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Nearest inclusive ancestor of `element` matching `selector`.
    fn closest(&self, element: &Self::Node, selector: &SelectorList) -> Option<Self::Node>;

    /// Lowercase tag name of an element.
    fn tag_name(&self, element: &Self::Node) -> Option<String>;

    /// True if `node` is `ancestor` or lies beneath it.
    fn is_within(&self, ancestor: &Self::Node, node: &Self::Node) -> bool;

    /// Replace `fragment` by `pieces`. Returns the literal text nodes created.
    fn splice(
        &mut self,
        fragment: &Self::Node,
        pieces: &[Piece],
        template: &MarkerTemplate,
    ) -> Result<Vec<Self::Node>, DomError>;

    /// Turn every wrapper back into plain year text and drop stray markers.
    /// Returns the number of wrappers and markers removed.
    fn unwrap_markers(&mut self, wrappers: &SelectorList, markers: &SelectorList) -> usize;

    /// Drop visited entries whose nodes are gone. Returns how many were
    /// dropped; sets that forget on their own report 0.
    fn forget_removed(&self, _visited: &mut Self::Visited) -> usize {
        0
    }

    fn root_flag(&self, name: &str) -> bool;

    fn set_root_flag(&mut self, name: &str, on: bool);
}
