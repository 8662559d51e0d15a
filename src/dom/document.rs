//! Document: arena-backed in-memory page tree
//!
//! Nodes live in a slot arena addressed by `NodeId` (slot index + generation).
//! Removing a node frees its whole subtree and bumps the slot generation, so
//! stale ids held elsewhere (visited sets, pending mutation records) simply
//! stop resolving instead of keeping memory alive.
//!
//! Structural changes made to nodes connected to the root are queued as
//! `MutationRecord`s and drained with `take_records`, mirroring what a
//! `MutationObserver` on the live page would deliver.

use super::selector::{SelectorList, Subject};
use super::{MarkerTemplate, MutationRecord, PageTree, Piece};
use crate::annotate::NodeSet;
use crate::error::DomError;

// =============================================================================
// Types
// =============================================================================

/// Stable handle to a node. Dead handles never alias a newer node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    tag: String,
    attributes: Vec<(String, String)>,
}

impl ElementData {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attribute("class")
            .map_or(false, |v| v.split_ascii_whitespace().any(|c| c == class))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element(ElementData),
    Text(String),
}

#[derive(Debug)]
struct NodeEntry {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    entry: Option<NodeEntry>,
}

/// In-memory page tree.
#[derive(Debug)]
pub struct Document {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    records: Vec<MutationRecord<NodeId>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Arena
// =============================================================================

impl Document {
    /// Empty document holding a single `<html>` root element.
    pub fn new() -> Self {
        let mut doc = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            records: Vec::new(),
        };
        doc.root = doc.alloc(NodeKind::Element(ElementData {
            tag: "html".to_string(),
            attributes: Vec::new(),
        }));
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let entry = NodeEntry {
            kind,
            parent: None,
            children: Vec::new(),
        };
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entry = Some(entry);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                NodeId {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        }
    }

    fn entry(&self, id: NodeId) -> Option<&NodeEntry> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    fn entry_mut(&mut self, id: NodeId) -> Option<&mut NodeEntry> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_mut())
    }

    fn live(&self, id: NodeId) -> Result<&NodeEntry, DomError> {
        self.entry(id).ok_or(DomError::DeadNode)
    }

    /// Free `id` and everything beneath it.
    fn release(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(slot) = self.slots.get_mut(current.index as usize) else {
                continue;
            };
            if slot.generation != current.generation {
                continue;
            }
            if let Some(entry) = slot.entry.take() {
                stack.extend(entry.children);
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(current.index);
            }
        }
    }

    /// True while the node has not been removed.
    pub fn contains(&self, id: NodeId) -> bool {
        self.entry(id).is_some()
    }

    /// Number of live nodes, including the root.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.entry.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if the node's ancestor chain reaches the root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root {
                return true;
            }
            current = self.entry(node).and_then(|e| e.parent);
        }
        false
    }

    fn record(&mut self, target: NodeId, record: MutationRecord<NodeId>) {
        if self.is_connected(target) {
            self.records.push(record);
        }
    }

    /// Drain queued mutation records.
    pub fn take_records(&mut self) -> Vec<MutationRecord<NodeId>> {
        std::mem::take(&mut self.records)
    }
}

// =============================================================================
// Construction and mutation
// =============================================================================

impl Document {
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeKind::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeKind::Text(text.to_string()))
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let entry = self.entry_mut(id).ok_or(DomError::DeadNode)?;
        let NodeKind::Element(data) = &mut entry.kind else {
            return Err(DomError::WrongKind { expected: "element" });
        };
        match data.attributes.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value.to_string(),
            None => data.attributes.push((name.to_string(), value.to_string())),
        }
        self.record(
            id,
            MutationRecord::Attributes {
                target: id,
                name: name.to_string(),
            },
        );
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<(), DomError> {
        let entry = self.entry_mut(id).ok_or(DomError::DeadNode)?;
        let NodeKind::Element(data) = &mut entry.kind else {
            return Err(DomError::WrongKind { expected: "element" });
        };
        let before = data.attributes.len();
        data.attributes.retain(|(n, _)| n != name);
        if data.attributes.len() != before {
            self.record(
                id,
                MutationRecord::Attributes {
                    target: id,
                    name: name.to_string(),
                },
            );
        }
        Ok(())
    }

    /// Replace the character data of a text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) -> Result<(), DomError> {
        let entry = self.entry_mut(id).ok_or(DomError::DeadNode)?;
        let NodeKind::Text(data) = &mut entry.kind else {
            return Err(DomError::WrongKind { expected: "text" });
        };
        *data = text.to_string();
        self.record(id, MutationRecord::CharacterData { target: id });
        Ok(())
    }

    fn unlink(&mut self, id: NodeId) -> Option<NodeId> {
        let parent = self.entry_mut(id)?.parent.take()?;
        if let Some(p) = self.entry_mut(parent) {
            p.children.retain(|c| *c != id);
        }
        Some(parent)
    }

    fn check_insertable(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let p = self.live(parent)?;
        self.live(child)?;
        if !matches!(p.kind, NodeKind::Element(_)) {
            return Err(DomError::WrongKind { expected: "element" });
        }
        let mut current = Some(parent);
        while let Some(node) = current {
            if node == child {
                return Err(DomError::Cycle);
            }
            current = self.entry(node).and_then(|e| e.parent);
        }
        Ok(())
    }

    /// Append `child` to `parent`, moving it if it is already attached.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.check_insertable(parent, child)?;
        if let Some(old) = self.unlink(child) {
            self.record(
                old,
                MutationRecord::ChildList {
                    target: old,
                    added: 0,
                    removed: 1,
                },
            );
        }
        if let Some(entry) = self.entry_mut(child) {
            entry.parent = Some(parent);
        }
        if let Some(entry) = self.entry_mut(parent) {
            entry.children.push(child);
        }
        self.record(
            parent,
            MutationRecord::ChildList {
                target: parent,
                added: 1,
                removed: 0,
            },
        );
        Ok(())
    }

    /// Detach a node from its parent without freeing it.
    pub fn detach(&mut self, id: NodeId) -> Result<(), DomError> {
        self.live(id)?;
        let parent = self.unlink(id).ok_or(DomError::Detached)?;
        self.record(
            parent,
            MutationRecord::ChildList {
                target: parent,
                added: 0,
                removed: 1,
            },
        );
        Ok(())
    }

    /// Detach a node and free its subtree.
    pub fn remove(&mut self, id: NodeId) -> Result<(), DomError> {
        if id == self.root {
            return Err(DomError::Host("the root element cannot be removed".to_string()));
        }
        self.live(id)?;
        if let Some(parent) = self.unlink(id) {
            self.record(
                parent,
                MutationRecord::ChildList {
                    target: parent,
                    added: 0,
                    removed: 1,
                },
            );
        }
        self.release(id);
        Ok(())
    }

    /// Put `replacements` (detached nodes) where `id` is, then free `id`.
    pub fn replace_with(&mut self, id: NodeId, replacements: &[NodeId]) -> Result<(), DomError> {
        let parent = self.live(id)?.parent.ok_or(DomError::Detached)?;
        for r in replacements {
            let entry = self.live(*r)?;
            if entry.parent.is_some() || *r == self.root || *r == id {
                return Err(DomError::Host("replacement node is already attached".to_string()));
            }
        }
        let position = self
            .live(parent)?
            .children
            .iter()
            .position(|c| *c == id)
            .ok_or(DomError::Detached)?;

        for r in replacements {
            if let Some(entry) = self.entry_mut(*r) {
                entry.parent = Some(parent);
            }
        }
        if let Some(p) = self.entry_mut(parent) {
            let _replaced: Vec<NodeId> = p
                .children
                .splice(position..=position, replacements.iter().copied())
                .collect();
        }
        if let Some(entry) = self.entry_mut(id) {
            entry.parent = None;
        }
        self.release(id);
        self.record(
            parent,
            MutationRecord::ChildList {
                target: parent,
                added: replacements.len(),
                removed: 1,
            },
        );
        Ok(())
    }
}

// =============================================================================
// Reading
// =============================================================================

impl Document {
    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.entry(id).map(|e| &e.kind)
    }

    pub fn element_data(&self, id: NodeId) -> Option<&ElementData> {
        match self.kind(id)? {
            NodeKind::Element(data) => Some(data),
            NodeKind::Text(_) => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Text(text) => Some(text),
            NodeKind::Element(_) => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.entry(id).and_then(|e| e.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.entry(id).map_or(&[], |e| e.children.as_slice())
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element_data(id).map(ElementData::tag)
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element_data(id).and_then(|d| d.attribute(name))
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element_data(id).map_or(false, |d| d.has_class(class))
    }

    /// Nodes beneath `id` in document (pre-)order, `id` excluded.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.text(id) {
            return text.to_string();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|d| self.text(d))
            .collect()
    }

    /// Selector view of an element, `None` for text or dead nodes.
    pub fn element(&self, id: NodeId) -> Option<ElementRef<'_>> {
        self.element_data(id).map(|_| ElementRef { doc: self, id })
    }

    pub fn matches(&self, id: NodeId, selector: &SelectorList) -> bool {
        self.element(id).map_or(false, |el| selector.matches(&el))
    }

    pub fn query_selector_all(&self, scope: Option<NodeId>, selector: &SelectorList) -> Vec<NodeId> {
        let candidates = match scope {
            Some(scope) => self.descendants(scope),
            None => {
                let mut all = vec![self.root];
                all.extend(self.descendants(self.root));
                all
            }
        };
        candidates
            .into_iter()
            .filter(|id| self.matches(*id, selector))
            .collect()
    }

    pub fn query_selector(&self, scope: Option<NodeId>, selector: &SelectorList) -> Option<NodeId> {
        self.query_selector_all(scope, selector).into_iter().next()
    }

    pub fn closest(&self, id: NodeId, selector: &SelectorList) -> Option<NodeId> {
        self.element(id)
            .and_then(|el| selector.closest(el))
            .map(|el| el.id)
    }
}

/// Borrowed element handle used for selector matching.
#[derive(Debug, Clone, Copy)]
pub struct ElementRef<'a> {
    doc: &'a Document,
    id: NodeId,
}

impl<'a> ElementRef<'a> {
    pub fn node_id(&self) -> NodeId {
        self.id
    }

    fn data(&self) -> Option<&'a ElementData> {
        self.doc.element_data(self.id)
    }
}

impl<'a> Subject for ElementRef<'a> {
    fn tag_name(&self) -> &str {
        self.data().map_or("", ElementData::tag)
    }

    fn id(&self) -> Option<&str> {
        self.data().and_then(|d| d.attribute("id"))
    }

    fn has_class(&self, class: &str) -> bool {
        self.data().map_or(false, |d| d.has_class(class))
    }

    fn parent(&self) -> Option<Self> {
        self.doc.parent(self.id).and_then(|p| self.doc.element(p))
    }
}

// =============================================================================
// PageTree
// =============================================================================

impl PageTree for Document {
    type Node = NodeId;
    type Visited = NodeSet;

    fn query(&self, scope: Option<&NodeId>, selector: &SelectorList) -> Option<NodeId> {
        self.query_selector(scope.copied(), selector)
    }

    fn query_all(&self, scope: Option<&NodeId>, selector: &SelectorList) -> Vec<NodeId> {
        self.query_selector_all(scope.copied(), selector)
    }

    fn text_content(&self, node: &NodeId) -> String {
        Document::text_content(self, *node)
    }

    fn text_fragments(&self, root: &NodeId) -> Vec<NodeId> {
        self.descendants(*root)
            .into_iter()
            .filter(|id| self.text(*id).is_some())
            .collect()
    }

    fn fragment_text(&self, fragment: &NodeId) -> Option<String> {
        self.text(*fragment).map(str::to_string)
    }

    fn parent_element(&self, node: &NodeId) -> Option<NodeId> {
        self.parent(*node)
    }

    fn closest(&self, element: &NodeId, selector: &SelectorList) -> Option<NodeId> {
        Document::closest(self, *element, selector)
    }

    fn tag_name(&self, element: &NodeId) -> Option<String> {
        self.tag(*element).map(str::to_string)
    }

    fn is_within(&self, ancestor: &NodeId, node: &NodeId) -> bool {
        let mut current = Some(*node);
        while let Some(id) = current {
            if !self.contains(id) {
                return false;
            }
            if id == *ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    fn splice(
        &mut self,
        fragment: &NodeId,
        pieces: &[Piece],
        template: &MarkerTemplate,
    ) -> Result<Vec<NodeId>, DomError> {
        let entry = self.live(*fragment)?;
        if !matches!(entry.kind, NodeKind::Text(_)) {
            return Err(DomError::WrongKind { expected: "text" });
        }
        if entry.parent.is_none() {
            return Err(DomError::Detached);
        }

        let mut created = Vec::with_capacity(pieces.len());
        let mut literals = Vec::new();
        for piece in pieces {
            match piece {
                Piece::Text(text) => {
                    let node = self.create_text(text);
                    literals.push(node);
                    created.push(node);
                }
                Piece::Year { text, age } => {
                    let wrapper = self.create_element("span");
                    self.set_attribute(wrapper, "class", &template.wrapper_class)?;
                    self.set_attribute(wrapper, "style", &template.wrapper_style)?;
                    let year = self.create_text(text);
                    self.append_child(wrapper, year)?;

                    let marker = self.create_element("span");
                    self.set_attribute(marker, "class", &template.marker_class)?;
                    self.set_attribute(marker, "style", &template.marker_style)?;
                    let label = self.create_text(&Piece::age_label(*age));
                    self.append_child(marker, label)?;
                    self.append_child(wrapper, marker)?;
                    created.push(wrapper);
                }
            }
        }

        if let Err(err) = self.replace_with(*fragment, &created) {
            for node in created {
                self.release(node);
            }
            return Err(err);
        }
        Ok(literals)
    }

    fn unwrap_markers(&mut self, wrappers: &SelectorList, markers: &SelectorList) -> usize {
        let mut removed = 0;
        for wrapper in self.query_selector_all(None, wrappers) {
            if !self.contains(wrapper) {
                continue;
            }
            let year_text: String = self
                .descendants(wrapper)
                .into_iter()
                .filter(|id| {
                    self.text(*id).is_some()
                        && self
                            .parent(*id)
                            .map_or(true, |p| Document::closest(self, p, markers).is_none())
                })
                .filter_map(|id| self.text(id))
                .collect();
            let plain = self.create_text(&year_text);
            match self.replace_with(wrapper, &[plain]) {
                Ok(()) => removed += 1,
                Err(_) => self.release(plain),
            }
        }
        for marker in self.query_selector_all(None, markers) {
            if self.contains(marker) && self.remove(marker).is_ok() {
                removed += 1;
            }
        }
        removed
    }

    fn forget_removed(&self, visited: &mut NodeSet) -> usize {
        visited.prune(self)
    }

    fn root_flag(&self, name: &str) -> bool {
        self.attribute(self.root, name).is_some()
    }

    fn set_root_flag(&mut self, name: &str, on: bool) {
        let root = self.root;
        let _ = if on {
            self.set_attribute(root, name, "true")
        } else {
            self.remove_attribute(root, name)
        };
    }
}

// =============================================================================
// Tests
// =============================================================================
