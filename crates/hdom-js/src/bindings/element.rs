//! Element and Node
//!
//! One class serves every non-document node: elements, text, comments and
//! doctypes. Documents chain to it after their own class, so tree
//! navigation and queries are shared.

use hdom_dom::{render, render_inner, DomTree, Event, NodeData, NodeId, Target};
use rquickjs::{Ctx, Exception, Object, Value};

use super::JsResult;
use crate::bridge;
use crate::dispatch::ScriptDispatch;
use crate::page::{CollectionKind, NodeRef, Page};
use crate::realm::{kind, HostClass, Realm};

pub(crate) fn class() -> HostClass {
    HostClass::new()
        .getter("nodeType", node_type)
        .getter("nodeName", node_name)
        .getter("tagName", tag_name)
        .getter("localName", local_name)
        .accessor("nodeValue", node_value, set_data)
        .accessor("data", data, set_data)
        .getter("length", length)
        .accessor("id", get_id, set_id)
        .accessor("className", get_class_name, set_class_name)
        .accessor("name", get_name, set_name)
        .accessor("type", get_type, set_type)
        .accessor("value", value, set_value)
        .accessor("selected", get_selected, set_selected)
        .accessor("checked", get_checked, set_checked)
        .accessor("disabled", get_disabled, set_disabled)
        .accessor("href", href, set_href)
        .accessor("src", src, set_src)
        .getter("hash", hash)
        .getter("hostname", hostname)
        .getter("pathname", pathname)
        .accessor("textContent", text_content, set_text_content)
        .accessor("innerText", inner_text, set_text_content)
        .accessor("innerHTML", inner_html, set_inner_html)
        .accessor("outerHTML", outer_html, set_outer_html)
        .getter("attributes", attributes)
        .accessor("style", style, set_style)
        .getter("ownerDocument", owner_document)
        .getter("parentNode", parent_node)
        .getter("parentElement", parent_element)
        .getter("firstChild", first_child)
        .getter("lastChild", last_child)
        .getter("previousSibling", previous_sibling)
        .getter("nextSibling", next_sibling)
        .getter("firstElementChild", first_element_child)
        .getter("lastElementChild", last_element_child)
        .getter("previousElementSibling", previous_element_sibling)
        .getter("nextElementSibling", next_element_sibling)
        .getter("childNodes", child_nodes)
        .getter("children", children)
        .getter("childElementCount", child_element_count)
        .getter("content", content)
        .getter("isConnected", is_connected)
        .getter("offsetWidth", offset_width)
        .getter("offsetHeight", offset_height)
        .getter("offsetLeft", offset_left)
        .getter("offsetTop", offset_top)
        .method("getAttribute", get_attribute)
        .method("setAttribute", set_attribute)
        .method("hasAttribute", has_attribute)
        .method("removeAttribute", remove_attribute)
        .method("hasAttributes", has_attributes)
        .method("getElementsByTagName", get_elements_by_tag_name)
        .method("getElementsByClassName", get_elements_by_class_name)
        .method("querySelector", query_selector)
        .method("querySelectorAll", query_selector_all)
        .method("matches", matches)
        .method("contains", contains)
        .method("appendChild", append_child)
        .method("insertBefore", insert_before)
        .method("replaceChild", replace_child)
        .method("removeChild", remove_child)
        .method("remove", remove)
        .method("cloneNode", clone_node)
        .method("isEqualNode", is_equal_node)
        .method("isSameNode", is_same_node)
        .method("hasChildNodes", has_child_nodes)
        .method("normalize", normalize)
        .method("splitText", split_text)
        .method("substringData", substring_data)
        .method("appendData", append_data)
        .method("deleteData", delete_data)
        .method("insertData", insert_data)
        .method("replaceData", replace_data)
        .method("addEventListener", add_event_listener)
        .method("removeEventListener", remove_event_listener)
        .method("attachEvent", attach_event)
        .method("dispatchEvent", dispatch_event)
        .method("click", click)
        .method("getRootNode", get_root_node)
        .method("getBoundingClientRect", get_bounding_client_rect)
}

// ---- shared helpers -------------------------------------------------------

fn node_name_of(tree: &DomTree, node: NodeId) -> String {
    match tree.get(node).map(|n| &n.data) {
        Some(NodeData::Element(e)) if e.namespace.is_none() => e.name.to_ascii_uppercase(),
        Some(NodeData::Element(e)) => e.name.clone(),
        Some(NodeData::Text(_)) => "#text".to_string(),
        Some(NodeData::Comment(_)) => "#comment".to_string(),
        Some(NodeData::Document) => "#document".to_string(),
        Some(NodeData::Doctype { name }) => name.clone(),
        None => String::new(),
    }
}

/// HTML attribute names are case-insensitive
fn attr_name(tree: &DomTree, node: NodeId, name: &str) -> String {
    match tree.element(node) {
        Some(e) if e.namespace.is_none() => name.to_ascii_lowercase(),
        _ => name.to_string(),
    }
}

pub(crate) fn write_attr(realm: &Realm, node: NodeId, name: &str, value: &str) {
    if let Err(err) = realm.page.borrow_mut().set_attribute(node, name, value) {
        tracing::warn!("setAttribute({}): {}", name, err);
    }
}

fn read_attr(realm: &Realm, node: NodeId, name: &str) -> Option<String> {
    let page = realm.page.borrow();
    page.tree.element(node)?;
    Some(page.tree.attr(node, name).unwrap_or("").to_string())
}

/// Previous or next sibling, among fragment members for nodes in a fragment
fn sibling(page: &Page, node: NodeId, forward: bool) -> Option<NodeId> {
    if let Some(f) = page.fragment_of(node) {
        let members = page.children(NodeRef::Fragment(f));
        let at = members.iter().position(|m| *m == node)?;
        return if forward {
            members.get(at + 1).copied()
        } else {
            at.checked_sub(1).map(|i| members[i])
        };
    }
    if forward {
        page.tree.next_sibling(node)
    } else {
        page.tree.prev_sibling(node)
    }
}

fn element_sibling(page: &Page, node: NodeId, forward: bool) -> Option<NodeId> {
    let mut cur = sibling(page, node, forward);
    while let Some(n) = cur {
        if page.tree.is_element(n) {
            return Some(n);
        }
        cur = sibling(page, n, forward);
    }
    None
}

fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}

/// Box of a node from the Geom collaborator: `[x1, y1, x2, y2]`, zero
/// when there is no collaborator or it fails
pub(crate) fn geometry(realm: &Realm, node: NodeId) -> [f64; 4] {
    let Some(geom) = realm.callbacks.geom.clone() else {
        return [0.0; 4];
    };
    let Some(path) = realm.page.borrow().tree.path(node) else {
        return [0.0; 4];
    };
    match geom(&path) {
        Ok(text) => parse_rect(&text).unwrap_or_else(|| {
            tracing::warn!("geometry of {}: malformed box {:?}", path, text);
            [0.0; 4]
        }),
        Err(err) => {
            tracing::warn!("geometry of {}: {}", path, err);
            [0.0; 4]
        }
    }
}

fn parse_rect(text: &str) -> Option<[f64; 4]> {
    let values: Vec<f64> = text
        .split(',')
        .map(|p| p.trim().parse().ok())
        .collect::<Option<_>>()?;
    values.try_into().ok()
}

/// `addEventListener(type, fn)` on any target
pub(crate) fn add_listener<'js>(ctx: &Ctx<'js>, realm: &Realm, target: Target, args: &[Value<'js>]) -> JsResult<'js> {
    let event_type = bridge::arg_string(ctx, args, 0)?;
    match args.get(1) {
        Some(f) if !bridge::is_nullish(f) => {
            let handle = bridge::retain(ctx, f.clone())?;
            realm.listeners.borrow_mut().add(target, &event_type, handle);
        }
        _ => {}
    }
    Ok(bridge::undefined(ctx))
}

pub(crate) fn remove_listener<'js>(ctx: &Ctx<'js>, realm: &Realm, target: Target, args: &[Value<'js>]) -> JsResult<'js> {
    let event_type = bridge::arg_string(ctx, args, 0)?;
    let Some(f) = args.get(1).filter(|f| !bridge::is_nullish(f)) else {
        return Ok(bridge::undefined(ctx));
    };
    if let Some(handle) = bridge::handle_of(ctx, f.clone())? {
        let removed = realm.listeners.borrow_mut().remove(target, &event_type, &handle);
        if removed.is_some() {
            bridge::release(ctx, handle);
        }
    }
    Ok(bridge::undefined(ctx))
}

/// IE-style `attachEvent("onclick", fn)`
pub(crate) fn attach_listener<'js>(ctx: &Ctx<'js>, realm: &Realm, target: Target, args: &[Value<'js>]) -> JsResult<'js> {
    let name = bridge::arg_string(ctx, args, 0)?;
    let event_type = name.strip_prefix("on").unwrap_or(&name).to_string();
    let mut args = args.to_vec();
    args[0] = bridge::string(ctx, &event_type)?;
    add_listener(ctx, realm, target, &args)?;
    Ok(bridge::boolean(ctx, true))
}

/// `dispatchEvent(event)` at a node; returns `!defaultPrevented`
pub(crate) fn dispatch_at<'js>(ctx: &Ctx<'js>, realm: &Realm, target: Target, args: &[Value<'js>]) -> JsResult<'js> {
    let event = args
        .first()
        .and_then(bridge::event_of)
        .ok_or_else(|| Exception::throw_type(ctx, "argument 1 is not an Event"))?;
    if let Some(ev) = realm.page.borrow_mut().events.get_mut(event) {
        ev.target = None;
    }
    let dispatcher = ScriptDispatch::new(ctx, realm, event);
    match target {
        Target::Node(node) => dispatcher.run(node),
        Target::Window => dispatcher.run_window(),
    };
    let prevented = realm
        .page
        .borrow()
        .events
        .get(event)
        .is_some_and(|e| e.default_prevented);
    Ok(bridge::boolean(ctx, !prevented))
}

// ---- getters --------------------------------------------------------------

fn node_type<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let t = realm.page.borrow().tree.node_type(node);
    Ok(match t {
        Some(t) => bridge::int(ctx, t as usize),
        None => bridge::undefined(ctx),
    })
}

fn node_name<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let name = node_name_of(&realm.page.borrow().tree, node);
    bridge::string(ctx, &name)
}

fn tag_name<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let page = realm.page.borrow();
    if !page.tree.is_element(node) {
        return Ok(bridge::undefined(ctx));
    }
    bridge::string(ctx, &node_name_of(&page.tree, node))
}

fn local_name<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let name = realm.page.borrow().tree.tag_name(node).map(str::to_string);
    bridge::opt_string(ctx, name.as_deref())
}

fn node_value<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let value = realm.page.borrow().tree.character_data(node).map(str::to_string);
    bridge::opt_string(ctx, value.as_deref())
}

fn data<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let value = realm.page.borrow().tree.character_data(node).map(str::to_string);
    match value {
        Some(v) => bridge::string(ctx, &v),
        None => Ok(bridge::undefined(ctx)),
    }
}

fn set_data<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, value: Value<'js>) -> rquickjs::Result<()> {
    let node = realm.expect_node(ctx, id)?;
    let value = bridge::to_string_or_empty(ctx, value)?;
    let mut page = realm.page.borrow_mut();
    if page.tree.character_data(node).is_some() {
        if let Err(err) = page.set_text_content(node, &value) {
            tracing::warn!("nodeValue: {}", err);
        }
    }
    Ok(())
}

fn length<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let len = realm.page.borrow().tree.character_data(node).map(utf16_len);
    Ok(match len {
        Some(len) => bridge::int(ctx, len),
        None => bridge::undefined(ctx),
    })
}

/// Properties reflecting a string attribute
macro_rules! reflect {
    ($get:ident, $set:ident, $attr:literal) => {
        fn $get<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
            let node = realm.expect_node(ctx, id)?;
            match read_attr(realm, node, $attr) {
                Some(v) => bridge::string(ctx, &v),
                None => Ok(bridge::undefined(ctx)),
            }
        }

        fn $set<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, value: Value<'js>) -> rquickjs::Result<()> {
            let node = realm.expect_node(ctx, id)?;
            let value = bridge::to_string(ctx, value)?;
            write_attr(realm, node, $attr, &value);
            Ok(())
        }
    };
}

/// Properties reflecting a boolean attribute
macro_rules! flag {
    ($get:ident, $set:ident, $attr:literal) => {
        fn $get<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
            let node = realm.expect_node(ctx, id)?;
            let on = realm.page.borrow().tree.has_attr(node, $attr);
            Ok(bridge::boolean(ctx, on))
        }

        fn $set<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, value: Value<'js>) -> rquickjs::Result<()> {
            let node = realm.expect_node(ctx, id)?;
            if bridge::arg_bool(ctx, &[value], 0)? {
                write_attr(realm, node, $attr, "");
            } else {
                realm.page.borrow_mut().remove_attribute(node, $attr);
            }
            Ok(())
        }
    };
}

reflect!(get_id, set_id, "id");
reflect!(get_class_name, set_class_name, "class");
reflect!(get_name, set_name, "name");
reflect!(get_type, set_type, "type");
flag!(get_selected, set_selected, "selected");
flag!(get_checked, set_checked, "checked");
flag!(get_disabled, set_disabled, "disabled");

fn value<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let page = realm.page.borrow();
    if !page.tree.is_element(node) {
        return Ok(bridge::undefined(ctx));
    }
    bridge::string(ctx, &page.form_value(node))
}

fn set_value<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, value: Value<'js>) -> rquickjs::Result<()> {
    let node = realm.expect_node(ctx, id)?;
    let value = bridge::to_string_or_empty(ctx, value)?;
    if let Err(err) = realm.page.borrow_mut().set_form_value(node, &value) {
        tracing::warn!("value: {}", err);
    }
    Ok(())
}

fn resolved(realm: &Realm, node: NodeId, attr: &str) -> Option<url::Url> {
    let raw = realm.page.borrow().tree.attr(node, attr)?.to_string();
    realm.location.borrow().resolve(&raw)
}

fn url_attr<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, attr: &str) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let url = resolved(realm, node, attr).map(|u| u.to_string());
    match url {
        Some(u) => bridge::string(ctx, &u),
        None => match read_attr(realm, node, attr) {
            Some(raw) => bridge::string(ctx, &raw),
            None => Ok(bridge::undefined(ctx)),
        },
    }
}

fn href<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    url_attr(ctx, realm, id, "href")
}

fn set_href<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, value: Value<'js>) -> rquickjs::Result<()> {
    let node = realm.expect_node(ctx, id)?;
    write_attr(realm, node, "href", &bridge::to_string(ctx, value)?);
    Ok(())
}

fn src<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    url_attr(ctx, realm, id, "src")
}

fn set_src<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, value: Value<'js>) -> rquickjs::Result<()> {
    let node = realm.expect_node(ctx, id)?;
    write_attr(realm, node, "src", &bridge::to_string(ctx, value)?);
    Ok(())
}

fn hash<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let hash = resolved(realm, node, "href")
        .and_then(|u| u.fragment().filter(|f| !f.is_empty()).map(|f| format!("#{f}")))
        .unwrap_or_default();
    bridge::string(ctx, &hash)
}

fn hostname<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let host = resolved(realm, node, "href")
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();
    bridge::string(ctx, &host)
}

fn pathname<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let path = resolved(realm, node, "href")
        .map(|u| u.path().to_string())
        .unwrap_or_default();
    bridge::string(ctx, &path)
}

fn text_content<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let text = realm.page.borrow().text_content(node);
    bridge::opt_string(ctx, text.as_deref())
}

fn inner_text<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let text = realm.page.borrow().text_content(node).unwrap_or_default();
    bridge::string(ctx, &text)
}

fn set_text_content<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, value: Value<'js>) -> rquickjs::Result<()> {
    let node = realm.expect_node(ctx, id)?;
    let text = bridge::to_string_or_empty(ctx, value)?;
    if let Err(err) = realm.page.borrow_mut().set_text_content(node, &text) {
        tracing::warn!("textContent: {}", err);
    }
    Ok(())
}

fn inner_html<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let html = render_inner(&realm.page.borrow().tree, node);
    bridge::string(ctx, &html)
}

fn set_inner_html<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, value: Value<'js>) -> rquickjs::Result<()> {
    let node = realm.expect_node(ctx, id)?;
    let html = bridge::to_string_or_empty(ctx, value)?;
    if let Err(err) = realm.page.borrow_mut().set_inner_html(node, &html) {
        tracing::warn!("innerHTML: {}", err);
    }
    Ok(())
}

fn outer_html<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let html = render(&realm.page.borrow().tree, node);
    bridge::string(ctx, &html)
}

fn set_outer_html<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, value: Value<'js>) -> rquickjs::Result<()> {
    let node = realm.expect_node(ctx, id)?;
    let html = bridge::to_string_or_empty(ctx, value)?;
    if let Err(err) = realm.page.borrow_mut().set_outer_html(node, &html) {
        tracing::error!("outerHTML: {}", err);
    }
    Ok(())
}

fn attributes<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    if !realm.page.borrow().tree.is_element(node) {
        return Ok(bridge::null(ctx));
    }
    bridge::wrap(ctx, kind::ATTRIBUTES, id, "NamedNodeMap")
}

fn style<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    if !realm.page.borrow().tree.is_element(node) {
        return Ok(bridge::undefined(ctx));
    }
    bridge::wrap(ctx, kind::STYLE, id, "CSSStyleDeclaration")
}

fn set_style<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, value: Value<'js>) -> rquickjs::Result<()> {
    let node = realm.expect_node(ctx, id)?;
    write_attr(realm, node, "style", &bridge::to_string_or_empty(ctx, value)?);
    Ok(())
}

fn owner_document<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let owner = {
        let page = realm.page.borrow();
        (!page.tree.is_document(node)).then(|| page.owner_document(node))
    };
    bridge::wrap_opt(ctx, realm, owner)
}

/// The parent node, or the fragment holding a top-level fragment member
fn parent_node<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let parent = {
        let page = realm.page.borrow();
        match (page.tree.parent(node), page.fragment_of(node)) {
            (Some(p), _) => Some(NodeRef::Node(p)),
            (None, Some(f)) => Some(NodeRef::Fragment(f)),
            (None, None) => None,
        }
    };
    match parent {
        Some(parent) => bridge::wrap_ref(ctx, realm, parent),
        None => Ok(bridge::null(ctx)),
    }
}

fn parent_element<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let parent = {
        let page = realm.page.borrow();
        page.tree.parent(node).filter(|p| page.tree.is_element(*p))
    };
    bridge::wrap_opt(ctx, realm, parent)
}

fn first_child<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let child = realm.page.borrow().tree.first_child(node);
    bridge::wrap_opt(ctx, realm, child)
}

fn last_child<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let child = realm.page.borrow().tree.last_child(node);
    bridge::wrap_opt(ctx, realm, child)
}

fn previous_sibling<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let sib = sibling(&realm.page.borrow(), node, false);
    bridge::wrap_opt(ctx, realm, sib)
}

fn next_sibling<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let sib = sibling(&realm.page.borrow(), node, true);
    bridge::wrap_opt(ctx, realm, sib)
}

fn first_element_child<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let child = realm.page.borrow().tree.element_children(node).next();
    bridge::wrap_opt(ctx, realm, child)
}

fn last_element_child<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let child = realm.page.borrow().tree.element_children(node).last();
    bridge::wrap_opt(ctx, realm, child)
}

fn previous_element_sibling<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let sib = element_sibling(&realm.page.borrow(), node, false);
    bridge::wrap_opt(ctx, realm, sib)
}

fn next_element_sibling<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let sib = element_sibling(&realm.page.borrow(), node, true);
    bridge::wrap_opt(ctx, realm, sib)
}

fn collection<'js>(ctx: &Ctx<'js>, realm: &Realm, source: NodeRef, which: CollectionKind) -> JsResult<'js> {
    let proto = match which {
        CollectionKind::ChildNodes => "NodeList",
        _ => "HTMLCollection",
    };
    let id = realm.page.borrow_mut().collection(source, which);
    bridge::wrap(ctx, kind::COLLECTION, id, proto)
}

pub(crate) fn child_nodes_of<'js>(ctx: &Ctx<'js>, realm: &Realm, source: NodeRef) -> JsResult<'js> {
    collection(ctx, realm, source, CollectionKind::ChildNodes)
}

pub(crate) fn children_of<'js>(ctx: &Ctx<'js>, realm: &Realm, source: NodeRef) -> JsResult<'js> {
    collection(ctx, realm, source, CollectionKind::Children)
}

pub(crate) fn by_tag_name<'js>(ctx: &Ctx<'js>, realm: &Realm, source: NodeRef, args: &[Value<'js>]) -> JsResult<'js> {
    let tag = bridge::arg_string(ctx, args, 0)?.to_ascii_lowercase();
    collection(ctx, realm, source, CollectionKind::TagName(tag))
}

pub(crate) fn by_class_name<'js>(ctx: &Ctx<'js>, realm: &Realm, source: NodeRef, args: &[Value<'js>]) -> JsResult<'js> {
    let names = bridge::arg_string(ctx, args, 0)?;
    collection(ctx, realm, source, CollectionKind::ClassName(names))
}

pub(crate) fn by_name<'js>(ctx: &Ctx<'js>, realm: &Realm, source: NodeRef, args: &[Value<'js>]) -> JsResult<'js> {
    let name = bridge::arg_string(ctx, args, 0)?;
    collection(ctx, realm, source, CollectionKind::Name(name))
}

fn child_nodes<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    child_nodes_of(ctx, realm, NodeRef::Node(node))
}

fn children<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    children_of(ctx, realm, NodeRef::Node(node))
}

fn child_element_count<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let count = realm.page.borrow().tree.element_children(node).count();
    Ok(bridge::int(ctx, count))
}

/// `template.content`: a fragment holding copies of the template's
/// children, the same fragment on every access
fn content<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    if !realm.page.borrow().tree.is_tag(node, "template") {
        return Ok(bridge::undefined(ctx));
    }
    let cached = realm.templates.borrow().get(&node).copied();
    let fragment = match cached {
        Some(f) => f,
        None => {
            let mut page = realm.page.borrow_mut();
            let f = page.create_fragment();
            let kids: Vec<NodeId> = page.tree.children(node).collect();
            for kid in kids {
                if let Some(copy) = page.clone_node(kid, true) {
                    if let Err(err) = page.registry.fragment_append(f, copy) {
                        tracing::warn!("template content: {}", err);
                    }
                }
            }
            realm.templates.borrow_mut().insert(node, f);
            f
        }
    };
    bridge::wrap_fragment(ctx, fragment)
}

fn is_connected<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let page = realm.page.borrow();
    let connected = page.tree.is_document(page.tree.root_of(node));
    Ok(bridge::boolean(ctx, connected))
}

fn offset_width<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let [x1, _, x2, _] = geometry(realm, realm.expect_node(ctx, id)?);
    Ok(bridge::number(ctx, x2 - x1))
}

fn offset_height<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let [_, y1, _, y2] = geometry(realm, realm.expect_node(ctx, id)?);
    Ok(bridge::number(ctx, y2 - y1))
}

fn offset_left<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let [x1, ..] = geometry(realm, realm.expect_node(ctx, id)?);
    Ok(bridge::number(ctx, x1))
}

fn offset_top<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let [_, y1, ..] = geometry(realm, realm.expect_node(ctx, id)?);
    Ok(bridge::number(ctx, y1))
}

// ---- attributes -----------------------------------------------------------

fn get_attribute<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let name = bridge::arg_string(ctx, args, 0)?;
    let value = {
        let page = realm.page.borrow();
        let name = attr_name(&page.tree, node, &name);
        page.tree.attr(node, &name).map(str::to_string)
    };
    bridge::opt_string(ctx, value.as_deref())
}

fn set_attribute<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let name = bridge::arg_string(ctx, args, 0)?;
    let value = bridge::arg_string(ctx, args, 1)?;
    write_attr(realm, node, &name, &value);
    Ok(bridge::undefined(ctx))
}

fn has_attribute<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let name = bridge::arg_string(ctx, args, 0)?;
    let page = realm.page.borrow();
    let has = page.tree.has_attr(node, &attr_name(&page.tree, node, &name));
    Ok(bridge::boolean(ctx, has))
}

fn remove_attribute<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let name = bridge::arg_string(ctx, args, 0)?;
    realm.page.borrow_mut().remove_attribute(node, &name);
    Ok(bridge::undefined(ctx))
}

fn has_attributes<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, _args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let has = !realm.page.borrow().tree.attrs(node).is_empty();
    Ok(bridge::boolean(ctx, has))
}

// ---- queries --------------------------------------------------------------

fn get_elements_by_tag_name<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    by_tag_name(ctx, realm, NodeRef::Node(node), args)
}

fn get_elements_by_class_name<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    by_class_name(ctx, realm, NodeRef::Node(node), args)
}

pub(crate) fn query_first<'js>(ctx: &Ctx<'js>, realm: &Realm, root: NodeRef, args: &[Value<'js>]) -> JsResult<'js> {
    let selector = bridge::arg_string(ctx, args, 0)?;
    let found = realm
        .page
        .borrow()
        .query_first(root, &selector)
        .map_err(|e| bridge::selector_error(ctx, e))?;
    bridge::wrap_opt(ctx, realm, found)
}

/// `querySelectorAll` returns a static array
pub(crate) fn query_all<'js>(ctx: &Ctx<'js>, realm: &Realm, root: NodeRef, args: &[Value<'js>]) -> JsResult<'js> {
    let selector = bridge::arg_string(ctx, args, 0)?;
    let found = realm
        .page
        .borrow()
        .query_all(root, &selector)
        .map_err(|e| bridge::selector_error(ctx, e))?;
    bridge::wrap_list(ctx, realm, &found)
}

fn query_selector<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    query_first(ctx, realm, NodeRef::Node(node), args)
}

fn query_selector_all<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    query_all(ctx, realm, NodeRef::Node(node), args)
}

fn matches<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let selector = bridge::arg_string(ctx, args, 0)?;
    let matched = realm
        .page
        .borrow()
        .matches(node, &selector)
        .map_err(|e| bridge::selector_error(ctx, e))?;
    Ok(bridge::boolean(ctx, matched))
}

fn contains<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let other = match args.first().and_then(|v| bridge::node_ref(realm, v)) {
        Some(NodeRef::Node(other)) => other,
        _ => return Ok(bridge::boolean(ctx, false)),
    };
    let inside = realm.page.borrow().tree.contains(node, other);
    Ok(bridge::boolean(ctx, inside))
}

// ---- tree editing ---------------------------------------------------------

pub(crate) fn append_to<'js>(ctx: &Ctx<'js>, realm: &Realm, parent: NodeRef, args: &[Value<'js>]) -> JsResult<'js> {
    let child = bridge::arg_ref(ctx, realm, args, 0)?;
    let result = realm.page.borrow_mut().insert(parent, child, None);
    match result {
        Ok(_) => bridge::wrap_ref(ctx, realm, child),
        Err(err) => Ok(bridge::absorb(ctx, "appendChild", err)),
    }
}

pub(crate) fn insert_into<'js>(ctx: &Ctx<'js>, realm: &Realm, parent: NodeRef, args: &[Value<'js>]) -> JsResult<'js> {
    let child = bridge::arg_ref(ctx, realm, args, 0)?;
    let reference = bridge::arg_opt_node(ctx, realm, args, 1)?;
    let result = realm.page.borrow_mut().insert(parent, child, reference);
    match result {
        Ok(_) => bridge::wrap_ref(ctx, realm, child),
        Err(err) => Ok(bridge::absorb(ctx, "insertBefore", err)),
    }
}

pub(crate) fn remove_from<'js>(ctx: &Ctx<'js>, realm: &Realm, parent: NodeRef, args: &[Value<'js>]) -> JsResult<'js> {
    let child = bridge::arg_node(ctx, realm, args, 0)?;
    let result = realm.page.borrow_mut().remove_child(parent, child);
    match result {
        Ok(()) => bridge::wrap_node(ctx, realm, child),
        Err(err) => Ok(bridge::absorb(ctx, "removeChild", err)),
    }
}

pub(crate) fn replace_in<'js>(ctx: &Ctx<'js>, realm: &Realm, parent: NodeRef, args: &[Value<'js>]) -> JsResult<'js> {
    let new = bridge::arg_ref(ctx, realm, args, 0)?;
    let old = bridge::arg_node(ctx, realm, args, 1)?;
    let result = realm.page.borrow_mut().replace_child(parent, new, old);
    match result {
        Ok(()) => bridge::wrap_node(ctx, realm, old),
        Err(err) => Ok(bridge::absorb(ctx, "replaceChild", err)),
    }
}

fn append_child<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    append_to(ctx, realm, NodeRef::Node(node), args)
}

fn insert_before<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    insert_into(ctx, realm, NodeRef::Node(node), args)
}

fn replace_child<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    replace_in(ctx, realm, NodeRef::Node(node), args)
}

fn remove_child<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    remove_from(ctx, realm, NodeRef::Node(node), args)
}

fn remove<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, _args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    realm.page.borrow_mut().remove(node);
    Ok(bridge::undefined(ctx))
}

fn clone_node<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let deep = bridge::arg_bool(ctx, args, 0)?;
    let copy = realm.page.borrow_mut().clone_node(node, deep);
    bridge::wrap_opt(ctx, realm, copy)
}

fn is_equal_node<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let equal = match args.first().and_then(|v| bridge::node_ref(realm, v)) {
        Some(NodeRef::Node(other)) => realm.page.borrow().tree.is_equal_node(node, other),
        _ => false,
    };
    Ok(bridge::boolean(ctx, equal))
}

fn is_same_node<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let same = args.first().and_then(|v| bridge::node_ref(realm, v)) == Some(NodeRef::Node(node));
    Ok(bridge::boolean(ctx, same))
}

fn has_child_nodes<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, _args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let has = realm.page.borrow().tree.first_child(node).is_some();
    Ok(bridge::boolean(ctx, has))
}

fn normalize<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, _args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    realm.page.borrow_mut().normalize(node);
    Ok(bridge::undefined(ctx))
}

// ---- character data -------------------------------------------------------

fn split_text<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let offset = bridge::arg_usize(ctx, args, 0)?;
    let result = realm.page.borrow_mut().split_text(node, offset);
    match result {
        Ok(tail) => bridge::wrap_node(ctx, realm, tail),
        Err(err) => Ok(bridge::absorb(ctx, "splitText", err)),
    }
}

fn substring_data<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let offset = bridge::arg_usize(ctx, args, 0)?;
    let count = bridge::arg_usize(ctx, args, 1)?;
    let data = realm.page.borrow().substring_data(node, offset, count);
    bridge::opt_string(ctx, data.as_deref())
}

fn edit_data<'js>(ctx: &Ctx<'js>, realm: &Realm, node: NodeId, offset: usize, count: usize, data: &str) -> JsResult<'js> {
    if let Err(err) = realm.page.borrow_mut().replace_data(node, offset, count, data) {
        return Ok(bridge::absorb(ctx, "replaceData", err));
    }
    Ok(bridge::undefined(ctx))
}

fn append_data<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let data = bridge::arg_string(ctx, args, 0)?;
    let end = realm.page.borrow().tree.character_data(node).map(utf16_len).unwrap_or(0);
    edit_data(ctx, realm, node, end, 0, &data)
}

fn delete_data<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let offset = bridge::arg_usize(ctx, args, 0)?;
    let count = bridge::arg_usize(ctx, args, 1)?;
    edit_data(ctx, realm, node, offset, count, "")
}

fn insert_data<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let offset = bridge::arg_usize(ctx, args, 0)?;
    let data = bridge::arg_string(ctx, args, 1)?;
    edit_data(ctx, realm, node, offset, 0, &data)
}

fn replace_data<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let offset = bridge::arg_usize(ctx, args, 0)?;
    let count = bridge::arg_usize(ctx, args, 1)?;
    let data = bridge::arg_string(ctx, args, 2)?;
    edit_data(ctx, realm, node, offset, count, &data)
}

// ---- events ---------------------------------------------------------------

fn add_event_listener<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    add_listener(ctx, realm, Target::Node(node), args)
}

fn remove_event_listener<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    remove_listener(ctx, realm, Target::Node(node), args)
}

fn attach_event<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    attach_listener(ctx, realm, Target::Node(node), args)
}

fn dispatch_event<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    dispatch_at(ctx, realm, Target::Node(node), args)
}

/// `element.click()` dispatches an untrusted mouse click
fn click<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, _args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let event = realm.page.borrow_mut().events.insert(Event::mouse("click", true, true));
    ScriptDispatch::new(ctx, realm, event).run(node);
    Ok(bridge::undefined(ctx))
}

fn get_root_node<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, _args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let root = {
        let page = realm.page.borrow();
        let root = page.tree.root_of(node);
        match page.fragment_of(root) {
            Some(f) => NodeRef::Fragment(f),
            None => NodeRef::Node(root),
        }
    };
    bridge::wrap_ref(ctx, realm, root)
}

fn get_bounding_client_rect<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, _args: &[Value<'js>]) -> JsResult<'js> {
    let [x1, y1, x2, y2] = geometry(realm, realm.expect_node(ctx, id)?);
    let rect = Object::new(ctx.clone())?;
    for (key, value) in [
        ("x", x1),
        ("y", y1),
        ("left", x1),
        ("top", y1),
        ("right", x2),
        ("bottom", y2),
        ("width", x2 - x1),
        ("height", y2 - y1),
    ] {
        rect.set(key, value)?;
    }
    Ok(rect.into_value())
}
