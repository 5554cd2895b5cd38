//! Selector matching tests for hdom-css
//!
//! Fixtures are parsed with hdom-html so the trees have the same shape the
//! script host sees, whitespace text nodes included.

use hdom_css::{select, SelectorError, SelectorGroup};
use hdom_dom::{DomTree, NodeId};
use hdom_html::parse_document;

const PAGE: &str = r#"<!DOCTYPE html><html><head></head><body>
<div id="b"><p id="a" class="c">one</p><p class="c">two</p><span>three</span></div>
<ul><li><a href="x">l</a></li><li>plain</li></ul>
<form><input type="submit" value="go"><input type="text"></form>
<div id="a.b">dotted</div>
</body></html>"#;

fn page() -> DomTree {
    parse_document(PAGE)
}

fn by_id(tree: &DomTree, id: &str) -> NodeId {
    tree.descendants(NodeId::ROOT)
        .into_iter()
        .find(|n| tree.attr(*n, "id") == Some(id))
        .unwrap()
}

fn tags(tree: &DomTree, nodes: &[NodeId]) -> Vec<String> {
    nodes
        .iter()
        .map(|n| tree.tag_name(*n).unwrap_or("#").to_string())
        .collect()
}

fn texts(tree: &DomTree, nodes: &[NodeId]) -> Vec<String> {
    nodes.iter().map(|n| tree.text_content(*n)).collect()
}

// ============================================================================
// SIMPLE SELECTORS
// ============================================================================

#[test]
fn test_id() {
    let tree = page();
    let found = select(&tree, "#a", NodeId::ROOT, true, false).unwrap();
    assert_eq!(found, vec![by_id(&tree, "a")]);
}

#[test]
fn test_tag_and_class() {
    let tree = page();
    let found = select(&tree, "p", NodeId::ROOT, true, false).unwrap();
    assert_eq!(texts(&tree, &found), vec!["one", "two"]);

    let found = select(&tree, "P.c", NodeId::ROOT, true, false).unwrap();
    assert_eq!(found.len(), 2);

    let found = select(&tree, "span.c", NodeId::ROOT, true, false).unwrap();
    assert!(found.is_empty());
}

#[test]
fn test_attribute() {
    let tree = page();
    let found = select(&tree, r#"input[type="submit"]"#, NodeId::ROOT, true, false).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(tree.attr(found[0], "value"), Some("go"));

    let found = select(&tree, "[href]", NodeId::ROOT, true, false).unwrap();
    assert_eq!(tags(&tree, &found), vec!["a"]);

    let found = select(&tree, "input[type=text]", NodeId::ROOT, true, false).unwrap();
    assert_eq!(found.len(), 1);
}

#[test]
fn test_escaped_id() {
    let tree = page();
    let dotted = by_id(&tree, "a.b");
    assert_eq!(select(&tree, r"#a\\.b", NodeId::ROOT, true, false).unwrap(), vec![dotted]);
    assert_eq!(select(&tree, r"#a\.b", NodeId::ROOT, true, false).unwrap(), vec![dotted]);
}

#[test]
fn test_universal_skips_root_and_text() {
    let tree = page();
    let root = by_id(&tree, "b");
    let found = select(&tree, "*", root, true, false).unwrap();
    assert_eq!(tags(&tree, &found), vec!["p", "p", "span"]);

    let found = select(&tree, "*", root, false, true).unwrap();
    assert_eq!(found, vec![root]);
}

// ============================================================================
// COMBINATORS
// ============================================================================

#[test]
fn test_descendant() {
    let tree = page();
    let found = select(&tree, "#b #a", NodeId::ROOT, true, false).unwrap();
    assert_eq!(found, vec![by_id(&tree, "a")]);

    let found = select(&tree, "#b .c", NodeId::ROOT, true, false).unwrap();
    assert_eq!(texts(&tree, &found), vec!["one", "two"]);

    let found = select(&tree, "ul a", NodeId::ROOT, true, false).unwrap();
    assert_eq!(tags(&tree, &found), vec!["a"]);
}

#[test]
fn test_child() {
    let tree = page();
    assert!(select(&tree, "body > p", NodeId::ROOT, true, false).unwrap().is_empty());

    let found = select(&tree, "div > p", NodeId::ROOT, true, false).unwrap();
    assert_eq!(texts(&tree, &found), vec!["one", "two"]);

    assert!(select(&tree, "ul > a", NodeId::ROOT, true, false).unwrap().is_empty());
}

#[test]
fn test_scope() {
    let tree = page();
    let root = by_id(&tree, "b");
    let found = select(&tree, ":scope > p", root, true, false).unwrap();
    assert_eq!(texts(&tree, &found), vec!["one", "two"]);

    let found = select(&tree, "> span", root, true, false).unwrap();
    assert_eq!(tags(&tree, &found), vec!["span"]);
}

#[test]
fn test_nested_matches_found_once() {
    let tree = parse_document(r#"<div id="o"><div id="i"><p id="x">x</p></div></div>"#);
    let found = select(&tree, "div p", NodeId::ROOT, true, false).unwrap();
    assert_eq!(found, vec![by_id(&tree, "x")]);

    let found = select(&tree, "div div", NodeId::ROOT, true, false).unwrap();
    assert_eq!(found, vec![by_id(&tree, "i")]);

    // a final compound stops the walk at the outer match
    let found = select(&tree, "div", NodeId::ROOT, true, false).unwrap();
    assert_eq!(found, vec![by_id(&tree, "o")]);

    // the outer div claims the head, and its child is not a p
    assert!(select(&tree, "div > p", NodeId::ROOT, true, false).unwrap().is_empty());
    let found = select(&tree, "#i > p", NodeId::ROOT, true, false).unwrap();
    assert_eq!(found, vec![by_id(&tree, "x")]);
}

// ============================================================================
// PSEUDO-CLASSES
// ============================================================================

#[test]
fn test_has() {
    let tree = page();
    let ul = select(&tree, "ul", NodeId::ROOT, true, false).unwrap()[0];
    let found = select(&tree, ":scope > li:has(a[href])", ul, true, false).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(tree.text_content(found[0]), "l");

    let found = select(&tree, "div:has(span)", NodeId::ROOT, true, false).unwrap();
    assert_eq!(found, vec![by_id(&tree, "b")]);
}

#[test]
fn test_nth_child() {
    let tree = page();
    let found = select(&tree, "div :nth-child(3)", NodeId::ROOT, true, false).unwrap();
    assert_eq!(tags(&tree, &found), vec!["span"]);

    let found = select(&tree, "li:nth-child(2)", NodeId::ROOT, true, false).unwrap();
    assert_eq!(texts(&tree, &found), vec!["plain"]);

    let found = select(&tree, "p:first-child", NodeId::ROOT, true, false).unwrap();
    assert_eq!(found, vec![by_id(&tree, "a")]);
}

#[test]
fn test_not() {
    let tree = page();
    let found = select(&tree, "div > :not(p)", NodeId::ROOT, true, false).unwrap();
    assert_eq!(tags(&tree, &found), vec!["span"]);

    let found = select(&tree, "#b > :not(.c, span)", NodeId::ROOT, true, false).unwrap();
    assert!(found.is_empty());
}

// ============================================================================
// GROUPS AND API
// ============================================================================

#[test]
fn test_comma_branches_are_concatenated() {
    let tree = page();
    let found = select(&tree, "span, p", NodeId::ROOT, true, false).unwrap();
    assert_eq!(tags(&tree, &found), vec!["span", "p", "p"]);

    let found = select(&tree, "p, .c", NodeId::ROOT, true, false).unwrap();
    assert_eq!(texts(&tree, &found), vec!["one", "two", "one", "two"]);

    let found = select(&tree, "li, a, ul", NodeId::ROOT, true, false).unwrap();
    assert_eq!(tags(&tree, &found), vec!["li", "li", "a", "ul"]);
}

#[test]
fn test_select_first_takes_first_branch_match() {
    let tree = page();
    let group = SelectorGroup::parse("span, p").unwrap();
    let span = select(&tree, "span", NodeId::ROOT, true, false).unwrap()[0];
    assert_eq!(group.select_first(&tree, NodeId::ROOT), Some(span));

    let group = SelectorGroup::parse("table, #a").unwrap();
    assert_eq!(group.select_first(&tree, NodeId::ROOT), Some(by_id(&tree, "a")));
}

#[test]
fn test_matches() {
    let tree = page();
    let a = by_id(&tree, "a");
    assert!(SelectorGroup::parse("div > p").unwrap().matches(&tree, a));
    assert!(SelectorGroup::parse("#b .c").unwrap().matches(&tree, a));
    assert!(!SelectorGroup::parse("ul p").unwrap().matches(&tree, a));
}

#[test]
fn test_errors() {
    let tree = page();
    assert_eq!(
        select(&tree, "p:hover", NodeId::ROOT, true, false),
        Err(SelectorError::Pseudo("hover".to_string()))
    );
    assert_eq!(
        select(&tree, "p ~ span", NodeId::ROOT, true, false),
        Err(SelectorError::Combinator('~'))
    );
    assert_eq!(select(&tree, " ", NodeId::ROOT, true, false), Err(SelectorError::Empty));
    assert!(select(&tree, "p,", NodeId::ROOT, true, false).is_err());
}
