//! Page state
//!
//! Everything the DOM API touches for one session: the node arena, the
//! identity registry, events and the live collections. Every mutating
//! operation goes through here and records a [`Mutation`] snapshot, so the
//! script bindings never edit the tree directly.

use std::collections::HashMap;
use std::time::SystemTime;

use hdom_css::{SelectorError, SelectorGroup, StyleDeclaration};
use hdom_dom::{
    render_inner, DomError, DomTree, EventArena, FragmentId, Mutation, MutationKind,
    MutationSender, NodeData, NodeId, Registry,
};
use hdom_html::HtmlParser;

/// A tree node or a document fragment, the two things nodes can be
/// inserted into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Node(NodeId),
    Fragment(FragmentId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

impl ReadyState {
    pub fn as_str(self) -> &'static str {
        match self {
            ReadyState::Loading => "loading",
            ReadyState::Interactive => "interactive",
            ReadyState::Complete => "complete",
        }
    }
}

/// What a live collection selects from its source
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    ChildNodes,
    Children,
    /// `getElementsByTagName`, `*` selects every element
    TagName(String),
    /// `getElementsByClassName`, all listed classes must be present
    ClassName(String),
    /// `getElementsByName`
    Name(String),
}

type Selection = Box<dyn Fn(&DomTree, &Registry) -> Vec<NodeId>>;

pub struct Page {
    pub tree: DomTree,
    pub registry: Registry,
    pub events: EventArena,
    mutations: MutationSender,
    collections: Vec<Selection>,
    collection_ids: HashMap<(NodeRef, CollectionKind), u32>,
    /// Nodes created by documents other than the main one
    owners: HashMap<NodeId, NodeId>,
    ready_state: ReadyState,
    active: Option<NodeId>,
    cookies: Vec<(String, String)>,
}

impl Page {
    pub fn new(tree: DomTree, mutations: MutationSender) -> Self {
        Self {
            tree,
            registry: Registry::new(),
            events: EventArena::new(),
            mutations,
            collections: Vec::new(),
            collection_ids: HashMap::new(),
            owners: HashMap::new(),
            ready_state: ReadyState::Loading,
            active: None,
            cookies: Vec::new(),
        }
    }

    /// Queue a snapshot of `node`. Attribute changes carry no HTML.
    pub fn record(&self, kind: MutationKind, node: NodeId) {
        let attr_only = matches!(kind, MutationKind::ChangeAttr | MutationKind::RemoveAttr);
        let mutation = Mutation {
            time: SystemTime::now(),
            kind,
            node,
            connected: self.tree.root_of(node) == NodeId::ROOT,
            tag: self.tree.tag_name(node).map(str::to_string),
            attributes: self.tree.attrs(node).to_vec(),
            inner_html: (!attr_only).then(|| render_inner(&self.tree, node)),
        };
        tracing::trace!("mutation {} on {:?}", kind, mutation.tag);
        self.mutations.push(mutation);
    }

    // ---- documents ------------------------------------------------------

    pub fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    pub fn set_ready_state(&mut self, state: ReadyState) {
        self.ready_state = state;
    }

    /// Document a node belongs to, the main document unless it was created
    /// by (or lives in) another one
    pub fn owner_document(&self, node: NodeId) -> NodeId {
        let root = self.tree.root_of(node);
        if self.tree.is_document(root) {
            return root;
        }
        self.owners
            .get(&node)
            .or_else(|| self.owners.get(&root))
            .copied()
            .unwrap_or(NodeId::ROOT)
    }

    fn adopt(&mut self, doc: NodeId, node: NodeId) -> NodeId {
        if doc != NodeId::ROOT {
            self.owners.insert(node, doc);
        }
        node
    }

    pub fn create_element(&mut self, doc: NodeId, name: &str) -> NodeId {
        let node = self.tree.create_element(name);
        self.adopt(doc, node)
    }

    pub fn create_element_ns(&mut self, doc: NodeId, namespace: Option<&str>, name: &str) -> NodeId {
        let namespace = namespace.filter(|ns| *ns != "http://www.w3.org/1999/xhtml" && !ns.is_empty());
        let node = self.tree.create_element_ns(namespace, name);
        self.adopt(doc, node)
    }

    pub fn create_text(&mut self, doc: NodeId, data: &str) -> NodeId {
        let node = self.tree.create_text(data);
        self.adopt(doc, node)
    }

    pub fn create_comment(&mut self, doc: NodeId, data: &str) -> NodeId {
        let node = self.tree.create_comment(data);
        self.adopt(doc, node)
    }

    pub fn create_fragment(&mut self) -> FragmentId {
        self.registry.create_fragment()
    }

    /// Parse a complete, independent document into the arena
    pub fn create_document(&mut self, html: &str) -> NodeId {
        HtmlParser::new().parse_into(&mut self.tree, html)
    }

    /// `implementation.createHTMLDocument(title)`
    pub fn create_html_document(&mut self, title: &str) -> NodeId {
        let title = title.replace('&', "&amp;").replace('<', "&lt;");
        self.create_document(&format!(
            "<!DOCTYPE html><html><head><title>{title}</title></head><body></body></html>"
        ))
    }

    pub fn clone_node(&mut self, node: NodeId, deep: bool) -> Option<NodeId> {
        let owner = self.owner_document(node);
        let copy = self.tree.clone_node(node, deep)?;
        Some(self.adopt(owner, copy))
    }

    // ---- tree editing ---------------------------------------------------

    pub fn fragment_of(&self, node: NodeId) -> Option<FragmentId> {
        self.registry.fragment_of(node)
    }

    /// Children of a node, or the members of a fragment
    pub fn children(&self, of: NodeRef) -> Vec<NodeId> {
        match of {
            NodeRef::Node(n) => self.tree.children(n).collect(),
            NodeRef::Fragment(f) => self
                .registry
                .fragment(f)
                .map(|fr| fr.children.clone())
                .unwrap_or_default(),
        }
    }

    /// `insertBefore`/`appendChild`. A fragment child moves all of its
    /// members. Returns the nodes that were inserted.
    pub fn insert(
        &mut self,
        parent: NodeRef,
        child: NodeRef,
        reference: Option<NodeId>,
    ) -> Result<Vec<NodeId>, DomError> {
        let nodes = match child {
            NodeRef::Node(n) => vec![n],
            NodeRef::Fragment(_) if child == parent => {
                return Err(DomError::Structural("cannot insert a fragment into itself".into()));
            }
            NodeRef::Fragment(f) => self.registry.take_fragment_children(f),
        };

        for &node in &nodes {
            match parent {
                NodeRef::Node(p) => {
                    let moved = self.tree.parent(node).is_some();
                    self.tree.insert_before(p, node, reference)?;
                    self.registry.leave_fragment(node);
                    self.record(if moved { MutationKind::Move } else { MutationKind::Insert }, node);
                }
                NodeRef::Fragment(f) => {
                    if let Some(old) = self.tree.parent(node) {
                        self.tree.detach(node);
                        self.record(MutationKind::Remove, old);
                    }
                    self.registry.fragment_insert_before(f, node, reference)?;
                }
            }
        }
        Ok(nodes)
    }

    pub fn remove_child(&mut self, parent: NodeRef, child: NodeId) -> Result<(), DomError> {
        match parent {
            NodeRef::Node(p) => {
                self.tree.remove_child(p, child)?;
                self.record(MutationKind::Remove, p);
            }
            NodeRef::Fragment(f) => self.registry.fragment_remove(f, child)?,
        }
        Ok(())
    }

    /// `ChildNode.remove()`
    pub fn remove(&mut self, node: NodeId) {
        match self.tree.parent(node) {
            Some(parent) => {
                self.tree.detach(node);
                self.record(MutationKind::Remove, parent);
                self.record(MutationKind::Value, parent);
            }
            None => self.registry.leave_fragment(node),
        }
    }

    pub fn replace_child(&mut self, parent: NodeRef, new: NodeRef, old: NodeId) -> Result<(), DomError> {
        match (parent, new) {
            (NodeRef::Node(p), NodeRef::Node(n)) => {
                self.tree.replace_child(p, n, old)?;
                self.registry.leave_fragment(n);
                self.record(MutationKind::Insert, n);
            }
            (NodeRef::Node(p), NodeRef::Fragment(_)) => {
                if self.tree.parent(old) != Some(p) {
                    return Err(DomError::NotAChild { parent: p, child: old });
                }
                self.insert(parent, new, Some(old))?;
                self.tree.detach(old);
            }
            (NodeRef::Fragment(f), _) => {
                if self.registry.fragment_of(old) != Some(f) {
                    return Err(DomError::Structural(format!("{old:?} is not a member of {f:?}")));
                }
                self.insert(parent, new, Some(old))?;
                self.registry.fragment_remove(f, old)?;
            }
        }
        Ok(())
    }

    // ---- content --------------------------------------------------------

    fn context_tag(&self, node: NodeId) -> Result<String, DomError> {
        match self.tree.get(node).map(|n| &n.data) {
            Some(NodeData::Element(e)) => Ok(e.name.clone()),
            Some(NodeData::Document) => Ok("html".to_string()),
            _ => Err(DomError::Structural(format!("{node:?} cannot hold markup"))),
        }
    }

    pub fn set_inner_html(&mut self, node: NodeId, html: &str) -> Result<(), DomError> {
        let context = self.context_tag(node)?;
        let nodes = HtmlParser::new().parse_fragment(&mut self.tree, &context, html);
        self.tree.remove_children(node);
        for n in nodes {
            self.tree.append_child(node, n)?;
        }
        self.record(MutationKind::Value, node);
        Ok(())
    }

    /// Replace `node` with the single node `html` parses to
    pub fn set_outer_html(&mut self, node: NodeId, html: &str) -> Result<NodeId, DomError> {
        let parent = self
            .tree
            .parent(node)
            .ok_or_else(|| DomError::Structural("outerHTML on a detached node".into()))?;
        let context = if self.tree.is_document(parent) {
            "html".to_string()
        } else {
            self.context_tag(parent)?
        };
        let nodes = HtmlParser::new().parse_fragment(&mut self.tree, &context, html);
        let [new] = nodes[..] else {
            return Err(DomError::Structural(format!(
                "outerHTML produced {} top-level nodes, expected 1",
                nodes.len()
            )));
        };
        self.tree.replace_child(parent, new, node)?;
        self.record(MutationKind::Value, new);
        Ok(new)
    }

    /// `textContent` getter: `None` for documents
    pub fn text_content(&self, node: NodeId) -> Option<String> {
        if self.tree.is_document(node) {
            return None;
        }
        Some(self.tree.text_content(node))
    }

    pub fn set_text_content(&mut self, node: NodeId, text: &str) -> Result<(), DomError> {
        if self.tree.character_data(node).is_some() {
            self.tree.set_character_data(node, text);
        } else if self.tree.is_element(node) {
            self.tree.remove_children(node);
            if !text.is_empty() {
                let t = self.tree.create_text(text);
                self.tree.append_child(node, t)?;
            }
        } else {
            return Err(DomError::Structural(format!("{node:?} has no text content")));
        }
        self.record(MutationKind::Value, node);
        Ok(())
    }

    /// Replace `count` UTF-16 units at `offset` of a text or comment node
    pub fn replace_data(&mut self, node: NodeId, offset: usize, count: usize, data: &str) -> Result<(), DomError> {
        let current = self
            .tree
            .character_data(node)
            .ok_or_else(|| DomError::Structural(format!("{node:?} is not character data")))?;
        let mut units: Vec<u16> = current.encode_utf16().collect();
        if offset > units.len() {
            return Err(DomError::Structural(format!("offset {offset} is out of range")));
        }
        let end = offset.saturating_add(count).min(units.len());
        units.splice(offset..end, data.encode_utf16());
        self.tree.set_character_data(node, &String::from_utf16_lossy(&units));
        self.record(MutationKind::Value, node);
        Ok(())
    }

    pub fn substring_data(&self, node: NodeId, offset: usize, count: usize) -> Option<String> {
        let units: Vec<u16> = self.tree.character_data(node)?.encode_utf16().collect();
        if offset > units.len() {
            return None;
        }
        let end = offset.saturating_add(count).min(units.len());
        Some(String::from_utf16_lossy(&units[offset..end]))
    }

    /// Split a text node at `offset`; the tail becomes the next sibling
    pub fn split_text(&mut self, node: NodeId, offset: usize) -> Result<NodeId, DomError> {
        let units: Vec<u16> = match self.tree.get(node).map(|n| &n.data) {
            Some(NodeData::Text(t)) => t.encode_utf16().collect(),
            _ => return Err(DomError::Structural(format!("{node:?} is not a text node"))),
        };
        if offset > units.len() {
            return Err(DomError::Structural(format!("offset {offset} is out of range")));
        }
        self.tree.set_character_data(node, &String::from_utf16_lossy(&units[..offset]));
        let tail = self.tree.create_text(&String::from_utf16_lossy(&units[offset..]));
        if let Some(parent) = self.tree.parent(node) {
            let next = self.tree.next_sibling(node);
            self.tree.insert_before(parent, tail, next)?;
            self.record(MutationKind::Value, parent);
        }
        Ok(tail)
    }

    pub fn normalize(&mut self, node: NodeId) {
        self.tree.normalize(node);
        self.record(MutationKind::Value, node);
    }

    /// `document.write`: parse in body context and append to the body
    pub fn write(&mut self, doc: NodeId, html: &str) -> Result<(), DomError> {
        let body = self
            .tree
            .body(doc)
            .ok_or_else(|| DomError::Structural("document has no body".into()))?;
        for node in HtmlParser::new().parse_fragment(&mut self.tree, "body", html) {
            self.tree.append_child(body, node)?;
            self.record(MutationKind::Insert, node);
        }
        Ok(())
    }

    // ---- attributes -----------------------------------------------------

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let name = match self.tree.element(node) {
            Some(e) if e.namespace.is_none() => name.to_ascii_lowercase(),
            Some(_) => name.to_string(),
            None => return Err(DomError::Structural(format!("{node:?} is not an element"))),
        };
        self.tree.set_attr(node, &name, value);
        self.record(MutationKind::ChangeAttr, node);
        Ok(())
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        let name = name.to_ascii_lowercase();
        if self.tree.remove_attr(node, &name) {
            self.record(MutationKind::RemoveAttr, node);
        }
    }

    pub fn style(&self, node: NodeId) -> StyleDeclaration {
        StyleDeclaration::parse(self.tree.attr(node, "style").unwrap_or(""))
    }

    pub fn set_style(&mut self, node: NodeId, style: &StyleDeclaration) -> Result<(), DomError> {
        self.set_attribute(node, "style", &style.to_css())
    }

    /// `value` of form controls: the selected option of a `<select>`, the
    /// text of a `<textarea>`, the `value` attribute otherwise
    pub fn form_value(&self, node: NodeId) -> String {
        let tree = &self.tree;
        match tree.tag_name(node) {
            Some("select") => {
                let options: Vec<NodeId> = tree
                    .descendants(node)
                    .into_iter()
                    .filter(|n| tree.is_tag(*n, "option"))
                    .collect();
                options
                    .iter()
                    .find(|o| tree.has_attr(**o, "selected"))
                    .or(options.first())
                    .map(|o| self.form_value(*o))
                    .unwrap_or_default()
            }
            Some("option") => tree
                .attr(node, "value")
                .map(str::to_string)
                .unwrap_or_else(|| tree.text_content(node).trim().to_string()),
            Some("textarea") => tree.text_content(node),
            _ => tree.attr(node, "value").unwrap_or("").to_string(),
        }
    }

    pub fn set_form_value(&mut self, node: NodeId, value: &str) -> Result<(), DomError> {
        match self.tree.tag_name(node) {
            Some("select") => {
                let options: Vec<NodeId> = self
                    .tree
                    .descendants(node)
                    .into_iter()
                    .filter(|n| self.tree.is_tag(*n, "option"))
                    .collect();
                for option in options {
                    if self.form_value(option) == value {
                        self.set_attribute(option, "selected", "")?;
                    } else {
                        self.remove_attribute(option, "selected");
                    }
                }
                Ok(())
            }
            Some("textarea") => self.set_text_content(node, value),
            _ => self.set_attribute(node, "value", value),
        }
    }

    // ---- queries --------------------------------------------------------

    /// Nodes searched by queries on `root`: descendants of a node, or the
    /// members of a fragment with their descendants
    fn scope(tree: &DomTree, registry: &Registry, root: NodeRef) -> Vec<NodeId> {
        match root {
            NodeRef::Node(n) => tree.descendants(n),
            NodeRef::Fragment(f) => registry
                .fragment(f)
                .map(|fr| {
                    fr.children
                        .iter()
                        .flat_map(|m| std::iter::once(*m).chain(tree.descendants(*m)))
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    pub fn element_by_id(&self, root: NodeRef, id: &str) -> Option<NodeId> {
        Self::scope(&self.tree, &self.registry, root)
            .into_iter()
            .find(|n| self.tree.attr(*n, "id") == Some(id))
    }

    pub fn query_all(&self, root: NodeRef, selector: &str) -> Result<Vec<NodeId>, SelectorError> {
        let group = SelectorGroup::parse(selector)?;
        Ok(match root {
            NodeRef::Node(n) => group.select(&self.tree, n),
            NodeRef::Fragment(_) => self
                .children(root)
                .into_iter()
                .flat_map(|m| group.select_with(&self.tree, m, false, false))
                .collect(),
        })
    }

    pub fn query_first(&self, root: NodeRef, selector: &str) -> Result<Option<NodeId>, SelectorError> {
        match root {
            NodeRef::Node(n) => Ok(SelectorGroup::parse(selector)?.select_first(&self.tree, n)),
            NodeRef::Fragment(_) => Ok(self.query_all(root, selector)?.into_iter().next()),
        }
    }

    pub fn matches(&self, node: NodeId, selector: &str) -> Result<bool, SelectorError> {
        Ok(SelectorGroup::parse(selector)?.matches(&self.tree, node))
    }

    // ---- live collections -----------------------------------------------

    /// Id of the live collection selecting `kind` from `source`. Asking
    /// twice returns the same collection.
    pub fn collection(&mut self, source: NodeRef, kind: CollectionKind) -> u32 {
        if let Some(id) = self.collection_ids.get(&(source, kind.clone())) {
            return *id;
        }
        let select: Selection = match kind.clone() {
            CollectionKind::ChildNodes => match source {
                NodeRef::Node(n) => Box::new(move |t, _| t.children(n).collect()),
                NodeRef::Fragment(f) => Box::new(move |_, r| {
                    r.fragment(f).map(|fr| fr.children.clone()).unwrap_or_default()
                }),
            },
            CollectionKind::Children => match source {
                NodeRef::Node(n) => Box::new(move |t, _| t.element_children(n).collect()),
                NodeRef::Fragment(f) => Box::new(move |t, r| {
                    r.fragment(f)
                        .map(|fr| fr.children.iter().copied().filter(|c| t.is_element(*c)).collect())
                        .unwrap_or_default()
                }),
            },
            CollectionKind::TagName(tag) => Box::new(move |t, r| {
                Self::scope(t, r, source)
                    .into_iter()
                    .filter(|n| t.is_element(*n) && (tag == "*" || t.is_tag(*n, &tag)))
                    .collect()
            }),
            CollectionKind::ClassName(names) => Box::new(move |t, r| {
                let wanted: Vec<&str> = names.split_whitespace().collect();
                Self::scope(t, r, source)
                    .into_iter()
                    .filter(|n| {
                        !wanted.is_empty()
                            && t.element(*n)
                                .is_some_and(|e| wanted.iter().all(|w| e.classes().any(|c| c == *w)))
                    })
                    .collect()
            }),
            CollectionKind::Name(name) => Box::new(move |t, r| {
                Self::scope(t, r, source)
                    .into_iter()
                    .filter(|n| t.attr(*n, "name") == Some(name.as_str()))
                    .collect()
            }),
        };
        let id = self.collections.len() as u32;
        self.collections.push(select);
        self.collection_ids.insert((source, kind), id);
        id
    }

    /// Evaluate a collection against the current tree
    pub fn collection_items(&self, id: u32) -> Vec<NodeId> {
        self.collections
            .get(id as usize)
            .map(|select| select(&self.tree, &self.registry))
            .unwrap_or_default()
    }

    // ---- focus and cookies ----------------------------------------------

    pub fn active_element(&self) -> Option<NodeId> {
        self.active.or_else(|| self.tree.body(NodeId::ROOT))
    }

    pub fn set_active_element(&mut self, node: Option<NodeId>) {
        self.active = node;
    }

    pub fn cookie(&self) -> String {
        self.cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// `document.cookie = "k=v; path=/"`: only the pair is kept
    pub fn set_cookie(&mut self, text: &str) {
        let pair = text.split(';').next().unwrap_or("");
        let Some((k, v)) = pair.split_once('=') else {
            return;
        };
        let (k, v) = (k.trim().to_string(), v.trim().to_string());
        match self.cookies.iter_mut().find(|(name, _)| *name == k) {
            Some(existing) => existing.1 = v,
            None => self.cookies.push((k, v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hdom_dom::{queue, MutationReceiver};

    fn page(html: &str) -> (Page, MutationReceiver) {
        let (tx, rx) = queue(100);
        (Page::new(hdom_html::parse_document(html), tx), rx)
    }

    fn by_id(page: &Page, id: &str) -> NodeId {
        page.element_by_id(NodeRef::Node(NodeId::ROOT), id).unwrap()
    }

    #[test]
    fn test_inner_html_records_one_value() {
        let (mut page, rx) = page(r#"<p id="demo">x</p>"#);
        let p = by_id(&page, "demo");
        page.set_inner_html(p, "<b>y</b>").unwrap();

        let m = rx.try_pop().unwrap();
        assert_eq!(m.kind, MutationKind::Value);
        assert_eq!(m.tag.as_deref(), Some("p"));
        assert_eq!(m.attr("id"), Some("demo"));
        assert_eq!(m.inner_html.as_deref(), Some("<b>y</b>"));
        assert!(rx.try_pop().is_none());
    }

    #[test]
    fn test_insert_and_move() {
        let (mut page, rx) = page(r#"<div id="a"></div><div id="b"></div>"#);
        let (a, b) = (by_id(&page, "a"), by_id(&page, "b"));
        let span = page.create_element(NodeId::ROOT, "span");

        page.set_attribute(span, "class", "c").unwrap();
        let m = rx.try_pop().unwrap();
        assert_eq!((m.kind, m.node), (MutationKind::ChangeAttr, span));
        assert!(!m.connected);

        page.insert(NodeRef::Node(a), NodeRef::Node(span), None).unwrap();
        let m = rx.try_pop().unwrap();
        assert_eq!((m.kind, m.node), (MutationKind::Insert, span));
        assert!(m.connected);

        page.insert(NodeRef::Node(b), NodeRef::Node(span), None).unwrap();
        assert_eq!(rx.try_pop().unwrap().kind, MutationKind::Move);
        assert_eq!(page.tree.parent(span), Some(b));
    }

    #[test]
    fn test_fragment_insert_moves_members() {
        let (mut page, rx) = page(r#"<ul id="l"></ul>"#);
        let ul = by_id(&page, "l");
        let frag = page.create_fragment();
        let a = page.create_element(NodeId::ROOT, "li");
        let b = page.create_element(NodeId::ROOT, "li");
        page.insert(NodeRef::Fragment(frag), NodeRef::Node(a), None).unwrap();
        page.insert(NodeRef::Fragment(frag), NodeRef::Node(b), None).unwrap();
        assert!(rx.try_pop().is_none());
        assert_eq!(page.fragment_of(a), Some(frag));

        let inserted = page.insert(NodeRef::Node(ul), NodeRef::Fragment(frag), None).unwrap();
        assert_eq!(inserted, vec![a, b]);
        assert_eq!(page.tree.children(ul).collect::<Vec<_>>(), vec![a, b]);
        assert!(page.children(NodeRef::Fragment(frag)).is_empty());
        assert_eq!(page.fragment_of(a), None);
        assert_eq!(rx.len(), 2);
    }

    #[test]
    fn test_remove_records_parent() {
        let (mut page, rx) = page(r#"<div id="a"><i id="x"></i></div>"#);
        let x = by_id(&page, "x");
        page.remove(x);
        let kinds: Vec<_> = std::iter::from_fn(|| rx.try_pop()).map(|m| (m.kind, m.tag)).collect();
        assert_eq!(
            kinds,
            vec![
                (MutationKind::Remove, Some("div".to_string())),
                (MutationKind::Value, Some("div".to_string())),
            ]
        );
    }

    #[test]
    fn test_outer_html_requires_single_node() {
        let (mut page, _rx) = page(r#"<div id="a"><i id="x"></i></div>"#);
        let x = by_id(&page, "x");
        assert!(page.set_outer_html(x, "<b>1</b><b>2</b>").is_err());
        assert_eq!(page.tree.tag_name(page.tree.first_child(by_id(&page, "a")).unwrap()), Some("i"));

        let new = page.set_outer_html(x, "<em>ok</em>").unwrap();
        assert_eq!(page.tree.tag_name(new), Some("em"));
    }

    #[test]
    fn test_attribute_mutations_carry_no_html() {
        let (mut page, rx) = page(r#"<a id="l">t</a>"#);
        let a = by_id(&page, "l");
        page.set_attribute(a, "HREF", "/x").unwrap();
        let m = rx.try_pop().unwrap();
        assert_eq!(m.kind, MutationKind::ChangeAttr);
        assert_eq!(m.attr("href"), Some("/x"));
        assert!(m.inner_html.is_none());

        page.remove_attribute(a, "href");
        assert_eq!(rx.try_pop().unwrap().kind, MutationKind::RemoveAttr);
        page.remove_attribute(a, "href");
        assert!(rx.try_pop().is_none());
    }

    #[test]
    fn test_split_text_and_data_edits() {
        let (mut page, _rx) = page(r#"<p id="p">hello world</p>"#);
        let p = by_id(&page, "p");
        let text = page.tree.first_child(p).unwrap();
        let tail = page.split_text(text, 5).unwrap();
        assert_eq!(page.tree.character_data(text), Some("hello"));
        assert_eq!(page.tree.character_data(tail), Some(" world"));
        assert_eq!(page.tree.next_sibling(text), Some(tail));

        page.replace_data(text, 0, 1, "J").unwrap();
        assert_eq!(page.tree.character_data(text), Some("Jello"));
        assert_eq!(page.substring_data(text, 1, 3).as_deref(), Some("ell"));
        assert!(page.replace_data(text, 9, 0, "x").is_err());
    }

    #[test]
    fn test_live_collection_sees_later_children() {
        let (mut page, _rx) = page(r#"<ul id="l"><li>a</li></ul>"#);
        let ul = by_id(&page, "l");
        let id = page.collection(NodeRef::Node(ul), CollectionKind::Children);
        assert_eq!(page.collection(NodeRef::Node(ul), CollectionKind::Children), id);
        assert_eq!(page.collection_items(id).len(), 1);

        let li = page.create_element(NodeId::ROOT, "li");
        page.insert(NodeRef::Node(ul), NodeRef::Node(li), None).unwrap();
        assert_eq!(page.collection_items(id).len(), 2);
    }

    #[test]
    fn test_class_and_tag_collections() {
        let (mut page, _rx) = page(r#"<p class="a b">1</p><p class="a">2</p><div class="b a">3</div>"#);
        let both = page.collection(NodeRef::Node(NodeId::ROOT), CollectionKind::ClassName("a b".into()));
        assert_eq!(page.collection_items(both).len(), 2);
        let ps = page.collection(NodeRef::Node(NodeId::ROOT), CollectionKind::TagName("P".into()));
        assert_eq!(page.collection_items(ps).len(), 2);
    }

    #[test]
    fn test_form_values() {
        let (mut page, _rx) = page(
            r#"<select id="s"><option value="1">one</option><option selected>two</option></select>
               <textarea id="t">text</textarea><input id="i" value="v">"#,
        );
        let s = by_id(&page, "s");
        assert_eq!(page.form_value(s), "two");
        page.set_form_value(s, "1").unwrap();
        assert_eq!(page.form_value(s), "1");
        assert_eq!(page.form_value(by_id(&page, "t")), "text");
        let i = by_id(&page, "i");
        page.set_form_value(i, "w").unwrap();
        assert_eq!(page.tree.attr(i, "value"), Some("w"));
    }

    #[test]
    fn test_second_document_owns_its_nodes() {
        let (mut page, _rx) = page("<p>main</p>");
        let doc = page.create_html_document("t");
        let div = page.create_element(doc, "div");
        assert_eq!(page.owner_document(div), doc);
        let body = page.tree.body(doc).unwrap();
        page.insert(NodeRef::Node(body), NodeRef::Node(div), None).unwrap();
        assert_eq!(page.owner_document(div), doc);
        let main_div = page.create_element(NodeId::ROOT, "div");
        assert_eq!(page.owner_document(main_div), NodeId::ROOT);
    }

    #[test]
    fn test_cookies() {
        let (mut page, _rx) = page("");
        page.set_cookie("a=1; path=/");
        page.set_cookie("b=2");
        page.set_cookie("a=3");
        assert_eq!(page.cookie(), "a=3; b=2");
    }

    #[test]
    fn test_document_write_appends_to_body() {
        let (mut page, rx) = page("<p>x</p>");
        page.write(NodeId::ROOT, "<i>1</i><i>2</i>").unwrap();
        assert_eq!(rx.len(), 2);
        let body = page.tree.body(NodeId::ROOT).unwrap();
        assert_eq!(render_inner(&page.tree, body), "<p>x</p><i>1</i><i>2</i>");
    }
}
