//! hdom HTML Parser
//!
//! HTML5 parsing built on html5ever. Documents and fragments are parsed
//! into an RcDom and then copied into the [`DomTree`] arena.

mod parser;

pub use parser::HtmlParser;

use hdom_dom::{DomTree, NodeId};

/// Parse a complete document into a fresh tree rooted at [`NodeId::ROOT`]
pub fn parse_document(html: &str) -> DomTree {
    HtmlParser::new().parse(html)
}

/// Parse `html` as the content of a `context` element. The returned nodes
/// are detached and in source order.
pub fn parse_fragment(tree: &mut DomTree, context: &str, html: &str) -> Vec<NodeId> {
    HtmlParser::new().parse_fragment(tree, context, html)
}
