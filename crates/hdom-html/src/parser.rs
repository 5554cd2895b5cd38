//! HTML5 Parser implementation
//!
//! Uses html5ever's RcDom and converts it to the arena. Fragments are parsed
//! by wrapping them in a small document whose shape puts the tree builder
//! in the right insertion mode for the context element.

use hdom_dom::{DomTree, NodeId};
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Contexts whose content is a single text node
const RAW_TEXT_CONTEXTS: &[&str] = &[
    "script", "style", "textarea", "title", "xmp", "iframe",
    "noembed", "noframes", "noscript", "plaintext",
];

/// HTML5 parser
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlParser;

impl HtmlParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse an HTML document into a new tree
    pub fn parse(&self, html: &str) -> DomTree {
        let mut tree = DomTree::new();
        let dom = parse_rcdom(html);
        self.convert_children(&dom.document, &mut tree, NodeId::ROOT);
        tracing::debug!("parsed document into {} nodes", tree.len());
        tree
    }

    /// Parse an HTML document under a new document root of an existing tree
    pub fn parse_into(&self, tree: &mut DomTree, html: &str) -> NodeId {
        let doc = tree.create_document();
        let dom = parse_rcdom(html);
        self.convert_children(&dom.document, tree, doc);
        doc
    }

    /// Parse `html` as the children of a `context` element
    pub fn parse_fragment(&self, tree: &mut DomTree, context: &str, html: &str) -> Vec<NodeId> {
        let context = context.to_ascii_lowercase();
        if RAW_TEXT_CONTEXTS.contains(&context.as_str()) {
            if html.is_empty() {
                return Vec::new();
            }
            return vec![tree.create_text(html)];
        }

        let (wrapped, path): (String, Vec<&str>) = match context.as_str() {
            "html" => (format!("<!DOCTYPE html><html>{html}</html>"), vec!["html"]),
            "head" => (format!("<!DOCTYPE html><html><head>{html}</head></html>"), vec!["html", "head"]),
            "table" => (format!("<!DOCTYPE html><table>{html}</table>"), vec!["html", "body", "table"]),
            "thead" | "tbody" | "tfoot" => (
                format!("<!DOCTYPE html><table><{context}>{html}</{context}></table>"),
                vec!["html", "body", "table", context.as_str()],
            ),
            "tr" => (
                format!("<!DOCTYPE html><table><tbody><tr>{html}</tr></tbody></table>"),
                vec!["html", "body", "table", "tbody", "tr"],
            ),
            "select" => (format!("<!DOCTYPE html><select>{html}</select>"), vec!["html", "body", "select"]),
            _ => (format!("<!DOCTYPE html><body>{html}"), vec!["html", "body"]),
        };

        let dom = parse_rcdom(&wrapped);
        let mut container = dom.document.clone();
        for tag in path {
            let next = container
                .children
                .borrow()
                .iter()
                .find(|c| matches!(&c.data, RcNodeData::Element { name, .. } if &*name.local == tag))
                .cloned();
            match next {
                Some(n) => container = n,
                None => {
                    tracing::debug!("fragment parse: no <{}> in wrapper for context {}", tag, context);
                    return Vec::new();
                }
            }
        }

        let children = container.children.borrow();
        children
            .iter()
            .filter_map(|child| self.convert_node(child, tree))
            .collect()
    }

    fn convert_children(&self, handle: &Handle, tree: &mut DomTree, parent: NodeId) {
        for child in handle.children.borrow().iter() {
            if let Some(id) = self.convert_node(child, tree) {
                if let Err(e) = tree.append_child(parent, id) {
                    tracing::warn!("dropping parsed node: {}", e);
                }
            }
        }
    }

    /// Copy an RcDom node and its subtree into the arena, detached
    fn convert_node(&self, handle: &Handle, tree: &mut DomTree) -> Option<NodeId> {
        match &handle.data {
            RcNodeData::Document => None,
            RcNodeData::Doctype { name, .. } => Some(tree.create_doctype(name)),
            RcNodeData::Text { contents } => Some(tree.create_text(&contents.borrow())),
            RcNodeData::Comment { contents } => Some(tree.create_comment(contents)),
            RcNodeData::Element {
                name,
                attrs,
                template_contents,
                ..
            } => {
                let ns: &str = &name.ns;
                let id = if ns == HTML_NAMESPACE {
                    tree.create_element(&name.local)
                } else {
                    tree.create_element_ns(Some(ns), &name.local)
                };
                for attr in attrs.borrow().iter() {
                    tree.set_attr(id, &attr.name.local, &attr.value);
                }
                self.convert_children(handle, tree, id);
                if let Some(contents) = template_contents.borrow().as_ref() {
                    self.convert_children(contents, tree, id);
                }
                Some(id)
            }
            RcNodeData::ProcessingInstruction { .. } => None,
        }
    }
}

fn parse_rcdom(html: &str) -> RcDom {
    parse_document(RcDom::default(), Default::default()).one(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let tree = HtmlParser::new().parse("<html><head><title>Test</title></head><body><p>Hello</p></body></html>");
        let body = tree.body(NodeId::ROOT).unwrap();
        let p = tree.element_children(body).next().unwrap();
        assert_eq!(tree.tag_name(p), Some("p"));
        assert_eq!(tree.text_content(p), "Hello");
    }

    #[test]
    fn test_raw_text_context() {
        let mut tree = DomTree::new();
        let nodes = HtmlParser::new().parse_fragment(&mut tree, "script", "var a = '<b>';");
        assert_eq!(nodes.len(), 1);
        assert_eq!(tree.character_data(nodes[0]), Some("var a = '<b>';"));
    }
}
