//! Parsing tests for hdom-html
//!
//! Documents, fragments in the various contexts, and the shape the rest of
//! the engine relies on (whitespace kept, doctype first, body present).

use hdom_dom::{render, render_inner, DomTree, NodeId, NodeType};
use hdom_html::{parse_document, parse_fragment, HtmlParser};

// ============================================================================
// DOCUMENTS
// ============================================================================

#[test]
fn test_document_shape() {
    let tree = parse_document("<!DOCTYPE html><p id=\"demo\">x</p>");
    let first = tree.first_child(NodeId::ROOT).unwrap();
    assert_eq!(tree.node_type(first), Some(NodeType::Doctype));

    let html = tree.document_element(NodeId::ROOT).unwrap();
    assert_eq!(tree.tag_name(html), Some("html"));
    assert!(tree.head(NodeId::ROOT).is_some());
    let body = tree.body(NodeId::ROOT).unwrap();
    assert_eq!(render_inner(&tree, body), r#"<p id="demo">x</p>"#);
}

#[test]
fn test_whitespace_text_is_kept() {
    let tree = parse_document("<body><ul>\n  <li>a</li>\n  <li>b</li>\n</ul></body>");
    let body = tree.body(NodeId::ROOT).unwrap();
    let ul = tree.element_children(body).next().unwrap();
    let kinds: Vec<_> = tree.children(ul).map(|c| tree.node_type(c).unwrap()).collect();
    assert_eq!(
        kinds,
        vec![NodeType::Text, NodeType::Element, NodeType::Text, NodeType::Element, NodeType::Text]
    );
}

#[test]
fn test_render_round_trip_of_full_document() {
    let tree = parse_document("<!DOCTYPE html><html><head></head><body><br><input type=\"text\" value=\"\"></body></html>");
    assert_eq!(
        render(&tree, NodeId::ROOT),
        r#"<!DOCTYPE html><html><head></head><body><br /><input type="text" value /></body></html>"#
    );
}

#[test]
fn test_svg_keeps_namespace() {
    let tree = parse_document("<body><svg viewBox=\"0 0 1 1\"><circle r=\"1\"/></svg></body>");
    let body = tree.body(NodeId::ROOT).unwrap();
    let svg = tree.element_children(body).next().unwrap();
    let data = tree.element(svg).unwrap();
    assert_eq!(data.namespace.as_deref(), Some("http://www.w3.org/2000/svg"));
}

#[test]
fn test_template_contents_inlined() {
    let tree = parse_document("<body><template><b>t</b></template></body>");
    let body = tree.body(NodeId::ROOT).unwrap();
    let template = tree.element_children(body).next().unwrap();
    assert_eq!(render_inner(&tree, template), "<b>t</b>");
}

#[test]
fn test_parse_into_creates_second_document() {
    let mut tree = parse_document("<p>main</p>");
    let doc = HtmlParser::new().parse_into(&mut tree, "<title>other</title>");
    assert_ne!(doc, NodeId::ROOT);
    assert!(tree.is_document(doc));
    let head = tree.head(doc).unwrap();
    assert_eq!(tree.text_content(head), "other");
}

// ============================================================================
// FRAGMENTS
// ============================================================================

#[test]
fn test_body_fragment() {
    let mut tree = DomTree::new();
    let nodes = parse_fragment(&mut tree, "div", " a <b>bold</b><!--c-->");
    assert_eq!(nodes.len(), 3);
    assert_eq!(tree.character_data(nodes[0]), Some(" a "));
    assert_eq!(tree.tag_name(nodes[1]), Some("b"));
    assert_eq!(tree.node_type(nodes[2]), Some(NodeType::Comment));
    assert!(nodes.iter().all(|n| tree.parent(*n).is_none()));
}

#[test]
fn test_table_row_fragment() {
    let mut tree = DomTree::new();
    let nodes = parse_fragment(&mut tree, "tbody", "<tr><td>1</td></tr>");
    assert_eq!(nodes.len(), 1);
    assert_eq!(tree.tag_name(nodes[0]), Some("tr"));

    let cells = parse_fragment(&mut tree, "tr", "<td>1</td><td>2</td>");
    assert_eq!(cells.len(), 2);
    assert!(cells.iter().all(|c| tree.tag_name(*c) == Some("td")));
}

#[test]
fn test_select_fragment() {
    let mut tree = DomTree::new();
    let nodes = parse_fragment(&mut tree, "select", "<option value=\"1\">one</option>");
    assert_eq!(nodes.len(), 1);
    assert_eq!(tree.attr(nodes[0], "value"), Some("1"));
}

#[test]
fn test_style_fragment_is_raw() {
    let mut tree = DomTree::new();
    let nodes = parse_fragment(&mut tree, "STYLE", "p > a { color: red }");
    assert_eq!(nodes.len(), 1);
    assert_eq!(tree.character_data(nodes[0]), Some("p > a { color: red }"));
}

#[test]
fn test_empty_fragment() {
    let mut tree = DomTree::new();
    assert!(parse_fragment(&mut tree, "div", "").is_empty());
}
