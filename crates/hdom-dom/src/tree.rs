//! DOM Tree (arena-based allocation)
//!
//! Every node of every document the session creates lives in one arena.
//! Slot 0 is the main document; `createHTMLDocument` adds further document
//! roots to the same arena. Nodes are never freed, detached nodes simply
//! lose their links.

use crate::node::{AttrChange, Attribute, ElementData, Node, NodeData, NodeType};
use crate::{DomError, NodeId};

/// Arena-based DOM tree
#[derive(Debug)]
pub struct DomTree {
    nodes: Vec<Node>,
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the children of a node
pub struct Children<'a> {
    tree: &'a DomTree,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = self.tree.get(id).and_then(|n| n.next_sibling);
        Some(id)
    }
}

impl DomTree {
    /// Create a tree holding an empty main document
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeData::Document)],
        }
    }

    /// Get a node by ID
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    /// Get a mutable node by ID
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0 as usize)
    }

    /// Number of nodes in the arena
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(data));
        id
    }

    // ---- creation -------------------------------------------------------

    /// Allocate an additional document root
    pub fn create_document(&mut self) -> NodeId {
        self.push(NodeData::Document)
    }

    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.push(NodeData::Element(ElementData::new(name)))
    }

    /// Create an element in a namespace. The HTML namespace (or none) gives
    /// a regular HTML element.
    pub fn create_element_ns(&mut self, namespace: Option<&str>, name: &str) -> NodeId {
        match namespace {
            Some(ns) if !ns.is_empty() && ns != "http://www.w3.org/1999/xhtml" => {
                self.push(NodeData::Element(ElementData::with_namespace(ns, name)))
            }
            _ => self.create_element(name),
        }
    }

    pub fn create_doctype(&mut self, name: &str) -> NodeId {
        self.push(NodeData::Doctype { name: name.to_string() })
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Comment(text.to_string()))
    }

    // ---- navigation -----------------------------------------------------

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.parent
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.first_child
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.last_child
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.next_sibling
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.prev_sibling
    }

    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            tree: self,
            next: self.first_child(id),
        }
    }

    /// Element children only
    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id).filter(|c| self.is_element(*c))
    }

    /// All descendants in document order, excluding `id` itself
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).collect();
        stack.reverse();
        while let Some(n) = stack.pop() {
            out.push(n);
            let start = stack.len();
            stack.extend(self.children(n));
            stack[start..].reverse();
        }
        out
    }

    /// Ancestors from the parent upwards
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |p| self.parent(*p))
    }

    /// Topmost ancestor (the node itself when detached)
    pub fn root_of(&self, id: NodeId) -> NodeId {
        self.ancestors(id).last().unwrap_or(id)
    }

    /// Inclusive descendant check
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).any(|a| a == ancestor)
    }

    /// Index of `id` among its parent's children
    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).position(|c| c == id)
    }

    // ---- editing --------------------------------------------------------

    /// Unlink a node from its parent and siblings
    pub fn detach(&mut self, id: NodeId) {
        let Some(node) = self.get(id) else {
            return;
        };
        let (parent, prev, next) = (node.parent, node.prev_sibling, node.next_sibling);

        if let Some(p) = prev.and_then(|p| self.get_mut(p)) {
            p.next_sibling = next;
        } else if let Some(parent) = parent.and_then(|p| self.get_mut(p)) {
            parent.first_child = next;
        }
        if let Some(n) = next.and_then(|n| self.get_mut(n)) {
            n.prev_sibling = prev;
        } else if let Some(parent) = parent.and_then(|p| self.get_mut(p)) {
            parent.last_child = prev;
        }
        if let Some(node) = self.get_mut(id) {
            node.parent = None;
            node.prev_sibling = None;
            node.next_sibling = None;
        }
    }

    fn check_insert(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let child_node = self.get(child).ok_or(DomError::NoSuchNode(child))?;
        let parent_node = self.get(parent).ok_or(DomError::NoSuchNode(parent))?;
        let invalid_parent = matches!(parent_node.data, NodeData::Text(_) | NodeData::Comment(_) | NodeData::Doctype { .. });
        if child_node.is_document() || invalid_parent || self.contains(child, parent) {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        Ok(())
    }

    /// Append a child, moving it out of its previous position
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` before `reference`, or append when `reference` is `None`
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        self.check_insert(parent, child)?;
        if reference == Some(child) {
            return Ok(());
        }
        if let Some(r) = reference {
            if self.parent(r) != Some(parent) {
                return Err(DomError::NotAChild { parent, child: r });
            }
        }
        self.detach(child);

        let prev = match reference {
            Some(r) => self.prev_sibling(r),
            None => self.last_child(parent),
        };
        if let Some(node) = self.get_mut(child) {
            node.parent = Some(parent);
            node.prev_sibling = prev;
            node.next_sibling = reference;
        }
        match prev.and_then(|p| self.get_mut(p)) {
            Some(p) => p.next_sibling = Some(child),
            None => {
                if let Some(p) = self.get_mut(parent) {
                    p.first_child = Some(child);
                }
            }
        }
        match reference.and_then(|r| self.get_mut(r)) {
            Some(r) => r.prev_sibling = Some(child),
            None => {
                if let Some(p) = self.get_mut(parent) {
                    p.last_child = Some(child);
                }
            }
        }
        Ok(())
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        if self.parent(child) != Some(parent) {
            return Err(DomError::NotAChild { parent, child });
        }
        self.detach(child);
        Ok(())
    }

    /// Put `new` where `old` is and detach `old`
    pub fn replace_child(&mut self, parent: NodeId, new: NodeId, old: NodeId) -> Result<(), DomError> {
        if self.parent(old) != Some(parent) {
            return Err(DomError::NotAChild { parent, child: old });
        }
        if new == old {
            return Ok(());
        }
        self.check_insert(parent, new)?;
        let anchor = if self.next_sibling(old) == Some(new) {
            self.next_sibling(new)
        } else {
            self.next_sibling(old)
        };
        self.detach(old);
        self.insert_before(parent, new, anchor)
    }

    pub fn remove_children(&mut self, parent: NodeId) {
        while let Some(c) = self.first_child(parent) {
            self.detach(c);
        }
    }

    // ---- node data ------------------------------------------------------

    pub fn node_type(&self, id: NodeId) -> Option<NodeType> {
        self.get(id).map(Node::node_type)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(Node::is_element)
    }

    pub fn is_document(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(Node::is_document)
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.get(id)?.as_element()
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        self.get_mut(id)?.as_element_mut()
    }

    /// Local name of an element
    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.name.as_str())
    }

    /// Whether `id` is an HTML element with the given local name
    pub fn is_tag(&self, id: NodeId, name: &str) -> bool {
        self.element(id)
            .is_some_and(|e| e.name.eq_ignore_ascii_case(name))
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attr(name)
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn attrs(&self, id: NodeId) -> &[Attribute] {
        self.element(id).map(|e| e.attrs.as_slice()).unwrap_or(&[])
    }

    /// Set an attribute; `None` when `id` is not an element
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> Option<AttrChange> {
        Some(self.element_mut(id)?.set_attr(name, value))
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> bool {
        self.element_mut(id).is_some_and(|e| e.remove_attr(name))
    }

    /// Text or comment payload
    pub fn character_data(&self, id: NodeId) -> Option<&str> {
        self.get(id)?.character_data()
    }

    pub fn set_character_data(&mut self, id: NodeId, data: &str) -> bool {
        match self.get_mut(id).map(|n| &mut n.data) {
            Some(NodeData::Text(s)) | Some(NodeData::Comment(s)) => {
                *s = data.to_string();
                true
            }
            _ => false,
        }
    }

    /// Concatenated text of the descendant text nodes. Comments do not
    /// contribute; a text or comment node returns its own data.
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(data) = self.character_data(id) {
            return data.to_string();
        }
        let mut out = String::new();
        for d in self.descendants(id) {
            if let Some(NodeData::Text(t)) = self.get(d).map(|n| &n.data) {
                out.push_str(t);
            }
        }
        out
    }

    /// Copy a node, with its subtree when `deep`. The copy is detached.
    pub fn clone_node(&mut self, id: NodeId, deep: bool) -> Option<NodeId> {
        let data = self.get(id)?.data.clone();
        let copy = self.push(data);
        if deep {
            let children: Vec<NodeId> = self.children(id).collect();
            for child in children {
                if let Some(c) = self.clone_node(child, true) {
                    // the copy is a fresh node without ancestors, so this cannot fail
                    let _ = self.append_child(copy, c);
                }
            }
        }
        Some(copy)
    }

    /// Merge adjacent text nodes and drop empty ones, recursively
    pub fn normalize(&mut self, id: NodeId) {
        let mut child = self.first_child(id);
        while let Some(c) = child {
            let next = self.next_sibling(c);
            match self.get(c).map(|n| &n.data) {
                Some(NodeData::Text(t)) if t.is_empty() => self.detach(c),
                Some(NodeData::Text(_)) => {
                    let mut merged = self.character_data(c).unwrap_or("").to_string();
                    let mut n = next;
                    while let Some(t) = n.and_then(|n| match self.get(n).map(|x| &x.data) {
                        Some(NodeData::Text(t)) => Some((n, t.clone())),
                        _ => None,
                    }) {
                        merged.push_str(&t.1);
                        n = self.next_sibling(t.0);
                        self.detach(t.0);
                    }
                    if merged.is_empty() {
                        self.detach(c);
                    } else {
                        self.set_character_data(c, &merged);
                    }
                    child = n;
                    continue;
                }
                Some(NodeData::Element(_)) => self.normalize(c),
                _ => {}
            }
            child = next;
        }
    }

    /// Structural equality: same data and equal children
    pub fn is_equal_node(&self, a: NodeId, b: NodeId) -> bool {
        let (Some(na), Some(nb)) = (self.get(a), self.get(b)) else {
            return false;
        };
        if na.data != nb.data {
            return false;
        }
        let ca: Vec<NodeId> = self.children(a).collect();
        let cb: Vec<NodeId> = self.children(b).collect();
        ca.len() == cb.len() && ca.iter().zip(&cb).all(|(x, y)| self.is_equal_node(*x, *y))
    }

    // ---- document helpers -----------------------------------------------

    /// The `<html>` element of a document
    pub fn document_element(&self, doc: NodeId) -> Option<NodeId> {
        self.element_children(doc).next()
    }

    /// First descendant element with the given tag
    pub fn find_tag(&self, root: NodeId, tag: &str) -> Option<NodeId> {
        self.descendants(root).into_iter().find(|n| self.is_tag(*n, tag))
    }

    pub fn body(&self, doc: NodeId) -> Option<NodeId> {
        let html = self.document_element(doc)?;
        self.element_children(html).find(|c| self.is_tag(*c, "body"))
    }

    pub fn head(&self, doc: NodeId) -> Option<NodeId> {
        let html = self.document_element(doc)?;
        self.element_children(html).find(|c| self.is_tag(*c, "head"))
    }

    /// Geometry path of a node: `/0` for `<body>`, then the index among the
    /// element and non-blank text siblings at every level below it.
    pub fn path(&self, id: NodeId) -> Option<String> {
        if self.is_tag(id, "body") {
            return Some("/0".to_string());
        }
        let parent = self.parent(id)?;
        let index = self
            .children(parent)
            .take_while(|c| *c != id)
            .filter(|c| self.counts_for_path(*c))
            .count();
        Some(format!("{}/{}", self.path(parent)?, index))
    }

    /// Child at `index` using the same counting as [`DomTree::path`]
    pub fn path_child(&self, parent: NodeId, index: usize) -> Option<NodeId> {
        self.children(parent)
            .filter(|c| self.counts_for_path(*c))
            .nth(index)
    }

    fn counts_for_path(&self, id: NodeId) -> bool {
        match self.get(id).map(|n| &n.data) {
            Some(NodeData::Element(_)) => true,
            Some(NodeData::Text(t)) => !t.trim().is_empty(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (DomTree, NodeId, NodeId, NodeId) {
        let mut tree = DomTree::new();
        let html = tree.create_element("html");
        let body = tree.create_element("BODY");
        let p = tree.create_element("p");
        tree.append_child(NodeId::ROOT, html).unwrap();
        tree.append_child(html, body).unwrap();
        tree.append_child(body, p).unwrap();
        (tree, html, body, p)
    }

    #[test]
    fn test_append_and_links() {
        let (mut tree, _, body, p) = sample();
        let q = tree.create_element("q");
        tree.append_child(body, q).unwrap();

        assert_eq!(tree.first_child(body), Some(p));
        assert_eq!(tree.last_child(body), Some(q));
        assert_eq!(tree.next_sibling(p), Some(q));
        assert_eq!(tree.prev_sibling(q), Some(p));
        assert_eq!(tree.tag_name(body), Some("body"));
    }

    #[test]
    fn test_insert_before_moves_node() {
        let (mut tree, _, body, p) = sample();
        let a = tree.create_text("a");
        tree.append_child(body, a).unwrap();
        tree.insert_before(body, a, Some(p)).unwrap();

        let children: Vec<_> = tree.children(body).collect();
        assert_eq!(children, vec![a, p]);
    }

    #[test]
    fn test_cycle_rejected() {
        let (mut tree, html, _, p) = sample();
        assert!(matches!(
            tree.append_child(p, html),
            Err(DomError::HierarchyRequest { .. })
        ));
    }

    #[test]
    fn test_remove_child_requires_parent() {
        let (mut tree, html, body, p) = sample();
        assert!(tree.remove_child(html, p).is_err());
        tree.remove_child(body, p).unwrap();
        assert_eq!(tree.parent(p), None);
        assert_eq!(tree.first_child(body), None);
    }

    #[test]
    fn test_replace_child() {
        let (mut tree, _, body, p) = sample();
        let div = tree.create_element("div");
        tree.replace_child(body, div, p).unwrap();
        assert_eq!(tree.children(body).collect::<Vec<_>>(), vec![div]);
        assert_eq!(tree.parent(p), None);
    }

    #[test]
    fn test_descendants_document_order() {
        let (mut tree, html, body, p) = sample();
        let t = tree.create_text("x");
        tree.append_child(p, t).unwrap();
        assert_eq!(tree.descendants(NodeId::ROOT), vec![html, body, p, t]);
    }

    #[test]
    fn test_text_content_skips_comments() {
        let (mut tree, _, body, p) = sample();
        let t = tree.create_text("hello ");
        let c = tree.create_comment("hidden");
        let t2 = tree.create_text("world");
        tree.append_child(p, t).unwrap();
        tree.append_child(p, c).unwrap();
        tree.append_child(body, t2).unwrap();
        assert_eq!(tree.text_content(body), "hello world");
    }

    #[test]
    fn test_clone_deep() {
        let (mut tree, _, body, p) = sample();
        tree.set_attr(p, "id", "x");
        let t = tree.create_text("x");
        tree.append_child(p, t).unwrap();

        let copy = tree.clone_node(body, true).unwrap();
        assert!(tree.is_equal_node(body, copy));
        assert_eq!(tree.parent(copy), None);
        let shallow = tree.clone_node(body, false).unwrap();
        assert!(!tree.is_equal_node(body, shallow));
    }

    #[test]
    fn test_normalize_merges_text() {
        let (mut tree, _, _, p) = sample();
        for s in ["a", "", "b"] {
            let t = tree.create_text(s);
            tree.append_child(p, t).unwrap();
        }
        tree.normalize(p);
        let children: Vec<_> = tree.children(p).collect();
        assert_eq!(children.len(), 1);
        assert_eq!(tree.character_data(children[0]), Some("ab"));
    }

    #[test]
    fn test_attributes() {
        let (mut tree, _, _, p) = sample();
        assert_eq!(tree.set_attr(p, "class", "a"), Some(AttrChange::Added));
        assert_eq!(tree.set_attr(p, "class", "b"), Some(AttrChange::Changed));
        assert_eq!(tree.attr(p, "class"), Some("b"));
        assert!(tree.remove_attr(p, "class"));
        assert!(!tree.has_attr(p, "class"));
    }

    #[test]
    fn test_path() {
        let (mut tree, _, body, p) = sample();
        let blank = tree.create_text("  \n");
        let span = tree.create_element("span");
        tree.append_child(body, blank).unwrap();
        tree.append_child(body, span).unwrap();

        assert_eq!(tree.path(body).as_deref(), Some("/0"));
        assert_eq!(tree.path(p).as_deref(), Some("/0/0"));
        assert_eq!(tree.path(span).as_deref(), Some("/0/1"));
        assert_eq!(tree.path_child(body, 1), Some(span));
    }

    #[test]
    fn test_document_helpers() {
        let (tree, html, body, _) = sample();
        assert_eq!(tree.document_element(NodeId::ROOT), Some(html));
        assert_eq!(tree.body(NodeId::ROOT), Some(body));
        assert_eq!(tree.head(NodeId::ROOT), None);
    }
}
