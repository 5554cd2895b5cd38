//! DOM Node
//!
//! Nodes live in the [`DomTree`](crate::DomTree) arena and refer to each
//! other through [`NodeId`] links.

use crate::NodeId;

/// DOM node type, numbered like the `nodeType` property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeType {
    Element = 1,
    Text = 3,
    Comment = 8,
    Document = 9,
    Doctype = 10,
}

/// A single attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// Result of [`DomTree::set_attr`](crate::DomTree::set_attr)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrChange {
    Added,
    Changed,
}

/// Element-specific data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    /// Local name, lowercased for HTML elements
    pub name: String,
    /// Namespace URI, `None` for the HTML namespace
    pub namespace: Option<String>,
    /// Attributes in source order
    pub attrs: Vec<Attribute>,
}

impl ElementData {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            namespace: None,
            attrs: Vec::new(),
        }
    }

    /// Element in a foreign namespace; the name keeps its case
    pub fn with_namespace(namespace: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: Some(namespace.to_string()),
            attrs: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Set an attribute, keeping the position of an existing one
    pub fn set_attr(&mut self, name: &str, value: &str) -> AttrChange {
        match self.attrs.iter_mut().find(|a| a.name == name) {
            Some(attr) => {
                attr.value = value.to_string();
                AttrChange::Changed
            }
            None => {
                self.attrs.push(Attribute {
                    name: name.to_string(),
                    value: value.to_string(),
                });
                AttrChange::Added
            }
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|a| a.name != name);
        before != self.attrs.len()
    }

    /// Whitespace-separated entries of the `class` attribute
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }
}

/// Node-specific data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Document,
    Doctype { name: String },
    Element(ElementData),
    Text(String),
    Comment(String),
}

/// DOM Node - links plus payload
#[derive(Debug, Clone)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub first_child: Option<NodeId>,
    pub last_child: Option<NodeId>,
    pub prev_sibling: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    pub data: NodeData,
}

impl Node {
    pub fn new(data: NodeData) -> Self {
        Self {
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
            data,
        }
    }

    #[inline]
    pub fn node_type(&self) -> NodeType {
        match self.data {
            NodeData::Document => NodeType::Document,
            NodeData::Doctype { .. } => NodeType::Doctype,
            NodeData::Element(_) => NodeType::Element,
            NodeData::Text(_) => NodeType::Text,
            NodeData::Comment(_) => NodeType::Comment,
        }
    }

    #[inline]
    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element(_))
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self.data, NodeData::Text(_))
    }

    #[inline]
    pub fn is_document(&self) -> bool {
        matches!(self.data, NodeData::Document)
    }

    #[inline]
    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    #[inline]
    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Text or comment payload
    pub fn character_data(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(s) | NodeData::Comment(s) => Some(s),
            _ => None,
        }
    }
}
