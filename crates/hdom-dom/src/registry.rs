//! Element identity registry
//!
//! Hands out one stable [`ElementId`] per node so that script wrappers keep
//! their identity: asking twice for the same node yields the same id. Also
//! owns the document fragments, ordered lists of detached root nodes.

use std::collections::HashMap;

use crate::{DomError, NodeId};

/// Index of an element record in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub u32);

/// Index of a fragment in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FragmentId(pub u32);

#[derive(Debug)]
struct ElementRecord {
    node: NodeId,
    /// Set while the node is a root member of a fragment
    fragment: Option<FragmentId>,
}

/// A document fragment: detached roots in order
#[derive(Debug, Default)]
pub struct Fragment {
    pub children: Vec<NodeId>,
}

#[derive(Debug, Default)]
pub struct Registry {
    elements: Vec<ElementRecord>,
    by_node: HashMap<NodeId, ElementId>,
    fragments: Vec<Fragment>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the element record for a node
    pub fn element(&mut self, node: NodeId) -> ElementId {
        if let Some(id) = self.by_node.get(&node) {
            return *id;
        }
        let id = ElementId(self.elements.len() as u32);
        self.elements.push(ElementRecord { node, fragment: None });
        self.by_node.insert(node, id);
        id
    }

    /// Existing element record for a node
    pub fn lookup(&self, node: NodeId) -> Option<ElementId> {
        self.by_node.get(&node).copied()
    }

    pub fn node(&self, id: ElementId) -> Option<NodeId> {
        self.elements.get(id.0 as usize).map(|r| r.node)
    }

    /// Number of element records handed out
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    // ---- fragments ------------------------------------------------------

    pub fn create_fragment(&mut self) -> FragmentId {
        let id = FragmentId(self.fragments.len() as u32);
        self.fragments.push(Fragment::default());
        id
    }

    pub fn fragment(&self, id: FragmentId) -> Option<&Fragment> {
        self.fragments.get(id.0 as usize)
    }

    /// Fragment the node is a root member of
    pub fn fragment_of(&self, node: NodeId) -> Option<FragmentId> {
        let id = self.lookup(node)?;
        self.elements.get(id.0 as usize)?.fragment
    }

    fn set_fragment(&mut self, node: NodeId, fragment: Option<FragmentId>) {
        let id = self.element(node);
        if let Some(record) = self.elements.get_mut(id.0 as usize) {
            record.fragment = fragment;
        }
    }

    /// Append a detached node to a fragment, leaving any fragment it was in
    pub fn fragment_append(&mut self, fragment: FragmentId, node: NodeId) -> Result<(), DomError> {
        self.fragment_insert_before(fragment, node, None)
    }

    pub fn fragment_insert_before(
        &mut self,
        fragment: FragmentId,
        node: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        self.leave_fragment(node);
        let list = self
            .fragments
            .get_mut(fragment.0 as usize)
            .ok_or_else(|| DomError::Structural(format!("unknown fragment {fragment:?}")))?;
        let at = match reference {
            Some(r) => list.children.iter().position(|c| *c == r).ok_or_else(|| {
                DomError::Structural(format!("{r:?} is not a member of {fragment:?}"))
            })?,
            None => list.children.len(),
        };
        list.children.insert(at, node);
        self.set_fragment(node, Some(fragment));
        Ok(())
    }

    pub fn fragment_remove(&mut self, fragment: FragmentId, node: NodeId) -> Result<(), DomError> {
        if self.fragment_of(node) != Some(fragment) {
            return Err(DomError::Structural(format!(
                "{node:?} is not a member of {fragment:?}"
            )));
        }
        self.leave_fragment(node);
        Ok(())
    }

    /// Drop the node from whatever fragment holds it
    pub fn leave_fragment(&mut self, node: NodeId) {
        if let Some(f) = self.fragment_of(node) {
            if let Some(list) = self.fragments.get_mut(f.0 as usize) {
                list.children.retain(|c| *c != node);
            }
            self.set_fragment(node, None);
        }
    }

    /// Empty a fragment, returning its former members in order
    pub fn take_fragment_children(&mut self, fragment: FragmentId) -> Vec<NodeId> {
        let children = self
            .fragments
            .get_mut(fragment.0 as usize)
            .map(|f| std::mem::take(&mut f.children))
            .unwrap_or_default();
        for c in &children {
            self.set_fragment(*c, None);
        }
        children
    }
}
