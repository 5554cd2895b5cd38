//! HTML Serialization (innerHTML/outerHTML)
//!
//! Key features:
//! - Proper HTML escaping
//! - Void element handling
//! - Raw text for `<script>` and `<style>`

use crate::{DomTree, NodeData, NodeId};

/// Void elements (self-closing, no end tag)
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input",
    "link", "meta", "param", "source", "track", "wbr",
];

/// Raw text elements (no escaping for content)
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Serialize a node including itself (outerHTML). A document renders as
/// its doctype and children.
pub fn render(tree: &DomTree, id: NodeId) -> String {
    let mut out = String::new();
    write_node(tree, id, &mut out);
    out
}

/// Serialize the children of a node (innerHTML)
pub fn render_inner(tree: &DomTree, id: NodeId) -> String {
    let mut out = String::new();
    if is_raw_text(tree, id) {
        write_raw_children(tree, id, &mut out);
    } else {
        for child in tree.children(id) {
            write_node(tree, child, &mut out);
        }
    }
    out
}

fn is_raw_text(tree: &DomTree, id: NodeId) -> bool {
    tree.tag_name(id).is_some_and(|t| RAW_TEXT_ELEMENTS.contains(&t))
}

fn write_node(tree: &DomTree, id: NodeId, out: &mut String) {
    let Some(node) = tree.get(id) else {
        return;
    };

    match &node.data {
        NodeData::Document => {
            for child in tree.children(id) {
                write_node(tree, child, out);
            }
        }
        NodeData::Doctype { name } => {
            out.push_str("<!DOCTYPE ");
            out.push_str(name);
            out.push('>');
        }
        NodeData::Element(elem) => {
            let tag = elem.name.as_str();

            out.push('<');
            out.push_str(tag);
            for attr in &elem.attrs {
                out.push(' ');
                out.push_str(&attr.name);
                if !attr.value.is_empty() {
                    out.push_str("=\"");
                    escape_attribute(&attr.value, out);
                    out.push('"');
                }
            }

            if elem.namespace.is_none() && VOID_ELEMENTS.contains(&tag) {
                out.push_str(" />");
                return;
            }
            out.push('>');
            if RAW_TEXT_ELEMENTS.contains(&tag) {
                write_raw_children(tree, id, out);
            } else {
                for child in tree.children(id) {
                    write_node(tree, child, out);
                }
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        NodeData::Text(text) => escape_text(text, out),
        NodeData::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
    }
}

fn write_raw_children(tree: &DomTree, id: NodeId, out: &mut String) {
    for child in tree.children(id) {
        if let Some(NodeData::Text(text)) = tree.get(child).map(|n| &n.data) {
            out.push_str(text);
        }
    }
}

/// Escape text content for HTML
fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

/// Escape attribute value
fn escape_attribute(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_element_with_attrs() {
        let mut tree = DomTree::new();
        let p = tree.create_element("p");
        tree.set_attr(p, "id", "demo");
        tree.set_attr(p, "hidden", "");
        let t = tree.create_text("a < b & c");
        tree.append_child(p, t).unwrap();

        assert_eq!(render(&tree, p), r#"<p id="demo" hidden>a &lt; b &amp; c</p>"#);
        assert_eq!(render_inner(&tree, p), "a &lt; b &amp; c");
    }

    #[test]
    fn test_void_and_raw_text() {
        let mut tree = DomTree::new();
        let div = tree.create_element("div");
        let br = tree.create_element("br");
        let script = tree.create_element("script");
        let code = tree.create_text("if (a < b) {}");
        tree.append_child(div, br).unwrap();
        tree.append_child(div, script).unwrap();
        tree.append_child(script, code).unwrap();

        assert_eq!(
            render(&tree, div),
            "<div><br /><script>if (a < b) {}</script></div>"
        );
        assert_eq!(render_inner(&tree, script), "if (a < b) {}");
    }

    #[test]
    fn test_attribute_escaping() {
        let mut tree = DomTree::new();
        let a = tree.create_element("a");
        tree.set_attr(a, "title", r#"say "hi" <now>"#);
        assert_eq!(
            render(&tree, a),
            r#"<a title="say &quot;hi&quot; &lt;now&gt;"></a>"#
        );
    }

    #[test]
    fn test_document_with_doctype_and_comment() {
        let mut tree = DomTree::new();
        let dt = tree.create_doctype("html");
        let html = tree.create_element("html");
        let c = tree.create_comment(" x ");
        tree.append_child(NodeId::ROOT, dt).unwrap();
        tree.append_child(NodeId::ROOT, html).unwrap();
        tree.append_child(html, c).unwrap();

        assert_eq!(render(&tree, NodeId::ROOT), "<!DOCTYPE html><html><!-- x --></html>");
    }
}
