//! Document
//!
//! Consulted before the element class for document wrappers. Documents
//! other than the main one (from `createHTMLDocument` or `DOMParser`) share
//! the arena and this class. Listeners and queries come from the element
//! class.

use hdom_dom::{Event, NodeId};
use rquickjs::{Array, Ctx, Value};

use super::element;
use super::JsResult;
use crate::bridge;
use crate::page::NodeRef;
use crate::realm::{HostClass, Realm};

pub(crate) fn class() -> HostClass {
    HostClass::new()
        .getter("documentElement", document_element)
        .getter("body", body)
        .getter("head", head)
        .accessor("title", title, set_title)
        .getter("readyState", ready_state)
        .getter("domain", domain)
        .getter("URL", url)
        .getter("documentURI", url)
        .getter("location", location)
        .getter("referrer", referrer)
        .accessor("cookie", cookie, set_cookie)
        .getter("defaultView", default_view)
        .getter("all", all)
        .getter("scripts", scripts)
        .getter("styleSheets", style_sheets)
        .getter("activeElement", active_element)
        .accessor("textContent", text_content, ignore)
        .method("createElement", create_element)
        .method("createElementNS", create_element_ns)
        .method("createTextNode", create_text_node)
        .method("createComment", create_comment)
        .method("createDocumentFragment", create_document_fragment)
        .method("createEvent", create_event)
        .method("getElementById", get_element_by_id)
        .method("getElementsByName", get_elements_by_name)
        .method("write", write)
        .method("writeln", writeln)
        .method("importNode", import_node)
}

fn document_element<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let doc = realm.expect_node(ctx, id)?;
    let html = realm.page.borrow().tree.document_element(doc);
    bridge::wrap_opt(ctx, realm, html)
}

fn body<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let doc = realm.expect_node(ctx, id)?;
    let body = realm.page.borrow().tree.body(doc);
    bridge::wrap_opt(ctx, realm, body)
}

fn head<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let doc = realm.expect_node(ctx, id)?;
    let head = realm.page.borrow().tree.head(doc);
    bridge::wrap_opt(ctx, realm, head)
}

fn title<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let doc = realm.expect_node(ctx, id)?;
    let title = {
        let page = realm.page.borrow();
        page.tree
            .find_tag(doc, "title")
            .map(|t| page.tree.text_content(t).split_whitespace().collect::<Vec<_>>().join(" "))
            .unwrap_or_default()
    };
    bridge::string(ctx, &title)
}

/// Setting the title creates `<title>` in the head when there is none
fn set_title<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, value: Value<'js>) -> rquickjs::Result<()> {
    let doc = realm.expect_node(ctx, id)?;
    let text = bridge::to_string_or_empty(ctx, value)?;
    let mut page = realm.page.borrow_mut();
    let existing = page.tree.find_tag(doc, "title");
    let node = match existing {
        Some(t) => t,
        None => {
            let Some(head) = page.tree.head(doc) else {
                tracing::warn!("title: document has no head");
                return Ok(());
            };
            let t = page.create_element(doc, "title");
            if let Err(err) = page.insert(NodeRef::Node(head), NodeRef::Node(t), None) {
                tracing::warn!("title: {}", err);
                return Ok(());
            }
            t
        }
    };
    if let Err(err) = page.set_text_content(node, &text) {
        tracing::warn!("title: {}", err);
    }
    Ok(())
}

fn ready_state<'js>(ctx: &Ctx<'js>, realm: &Realm, _id: u32) -> JsResult<'js> {
    let state = realm.page.borrow().ready_state();
    bridge::string(ctx, state.as_str())
}

fn domain<'js>(ctx: &Ctx<'js>, realm: &Realm, _id: u32) -> JsResult<'js> {
    let host = realm.location.borrow().hostname();
    bridge::string(ctx, &host)
}

fn url<'js>(ctx: &Ctx<'js>, realm: &Realm, _id: u32) -> JsResult<'js> {
    let href = realm.location.borrow().href();
    bridge::string(ctx, &href)
}

fn location<'js>(ctx: &Ctx<'js>, _realm: &Realm, _id: u32) -> JsResult<'js> {
    ctx.globals().get("location")
}

fn referrer<'js>(ctx: &Ctx<'js>, _realm: &Realm, _id: u32) -> JsResult<'js> {
    bridge::string(ctx, "")
}

fn cookie<'js>(ctx: &Ctx<'js>, realm: &Realm, _id: u32) -> JsResult<'js> {
    let cookie = realm.page.borrow().cookie();
    bridge::string(ctx, &cookie)
}

fn set_cookie<'js>(ctx: &Ctx<'js>, realm: &Realm, _id: u32, value: Value<'js>) -> rquickjs::Result<()> {
    let text = bridge::to_string(ctx, value)?;
    realm.page.borrow_mut().set_cookie(&text);
    Ok(())
}

/// Only the main document has a window
fn default_view<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    if realm.expect_node(ctx, id)? == NodeId::ROOT {
        Ok(ctx.globals().into_value())
    } else {
        Ok(bridge::null(ctx))
    }
}

fn all<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let doc = realm.expect_node(ctx, id)?;
    element::by_tag_name(ctx, realm, NodeRef::Node(doc), &[bridge::string(ctx, "*")?])
}

fn scripts<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let doc = realm.expect_node(ctx, id)?;
    element::by_tag_name(ctx, realm, NodeRef::Node(doc), &[bridge::string(ctx, "script")?])
}

/// No stylesheets are loaded
fn style_sheets<'js>(ctx: &Ctx<'js>, _realm: &Realm, _id: u32) -> JsResult<'js> {
    Ok(Array::new(ctx.clone())?.into_value())
}

fn active_element<'js>(ctx: &Ctx<'js>, realm: &Realm, _id: u32) -> JsResult<'js> {
    let active = realm.page.borrow().active_element();
    bridge::wrap_opt(ctx, realm, active)
}

fn text_content<'js>(ctx: &Ctx<'js>, _realm: &Realm, _id: u32) -> JsResult<'js> {
    Ok(bridge::null(ctx))
}

fn ignore<'js>(_ctx: &Ctx<'js>, _realm: &Realm, _id: u32, _value: Value<'js>) -> rquickjs::Result<()> {
    Ok(())
}

// ---- factories ------------------------------------------------------------

fn create_element<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let doc = realm.expect_node(ctx, id)?;
    let name = bridge::arg_string(ctx, args, 0)?;
    let node = realm.page.borrow_mut().create_element(doc, &name);
    bridge::wrap_node(ctx, realm, node)
}

fn create_element_ns<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let doc = realm.expect_node(ctx, id)?;
    let namespace = match args.first() {
        Some(v) if !bridge::is_nullish(v) => Some(bridge::to_string(ctx, v.clone())?),
        _ => None,
    };
    let name = bridge::arg_string(ctx, args, 1)?;
    let node = realm
        .page
        .borrow_mut()
        .create_element_ns(doc, namespace.as_deref(), &name);
    bridge::wrap_node(ctx, realm, node)
}

fn create_text_node<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let doc = realm.expect_node(ctx, id)?;
    let data = bridge::arg_string(ctx, args, 0)?;
    let node = realm.page.borrow_mut().create_text(doc, &data);
    bridge::wrap_node(ctx, realm, node)
}

fn create_comment<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let doc = realm.expect_node(ctx, id)?;
    let data = bridge::arg_string(ctx, args, 0)?;
    let node = realm.page.borrow_mut().create_comment(doc, &data);
    bridge::wrap_node(ctx, realm, node)
}

fn create_document_fragment<'js>(ctx: &Ctx<'js>, realm: &Realm, _id: u32, _args: &[Value<'js>]) -> JsResult<'js> {
    let fragment = realm.page.borrow_mut().create_fragment();
    bridge::wrap_fragment(ctx, fragment)
}

/// `createEvent("MouseEvents")` makes a mouse event; the type is set by
/// `initEvent`
fn create_event<'js>(ctx: &Ctx<'js>, realm: &Realm, _id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let interface = bridge::arg_string_or_empty(ctx, args, 0)?;
    let event = if interface.to_ascii_lowercase().starts_with("mouse") {
        Event::mouse("", false, false)
    } else {
        Event::new("", false, false)
    };
    let id = realm.page.borrow_mut().events.insert(event);
    bridge::wrap_event(ctx, realm, id)
}

// ---- queries and writing --------------------------------------------------

fn get_element_by_id<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let doc = realm.expect_node(ctx, id)?;
    let wanted = bridge::arg_string(ctx, args, 0)?;
    let found = realm.page.borrow().element_by_id(NodeRef::Node(doc), &wanted);
    bridge::wrap_opt(ctx, realm, found)
}

fn get_elements_by_name<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let doc = realm.expect_node(ctx, id)?;
    element::by_name(ctx, realm, NodeRef::Node(doc), args)
}

fn write_markup<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>], newline: bool) -> JsResult<'js> {
    let doc = realm.expect_node(ctx, id)?;
    let mut html = String::new();
    for arg in args {
        html.push_str(&bridge::to_string(ctx, arg.clone())?);
    }
    if newline {
        html.push('\n');
    }
    if let Err(err) = realm.page.borrow_mut().write(doc, &html) {
        return Ok(bridge::absorb(ctx, "document.write", err));
    }
    Ok(bridge::undefined(ctx))
}

fn write<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    write_markup(ctx, realm, id, args, false)
}

fn writeln<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    write_markup(ctx, realm, id, args, true)
}

/// `importNode(node, deep)`: a copy owned by this document
fn import_node<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    realm.expect_node(ctx, id)?;
    let source = bridge::arg_node(ctx, realm, args, 0)?;
    let deep = bridge::arg_bool(ctx, args, 1)?;
    let copy = realm.page.borrow_mut().clone_node(source, deep);
    bridge::wrap_opt(ctx, realm, copy)
}
