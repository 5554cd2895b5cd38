//! DocumentFragment
//!
//! Fragment members are real arena nodes without a tree parent; the
//! registry keeps their order and back-reference. Inserting a fragment
//! moves its members out.

use hdom_dom::{FragmentId, NodeId};
use rquickjs::{Ctx, Value};

use super::element;
use super::JsResult;
use crate::bridge;
use crate::page::NodeRef;
use crate::realm::{HostClass, Realm};

pub(crate) fn class() -> HostClass {
    HostClass::new()
        .getter("nodeType", node_type)
        .getter("nodeName", node_name)
        .getter("parentNode", parent_node)
        .getter("ownerDocument", owner_document)
        .getter("childNodes", child_nodes)
        .getter("children", children)
        .getter("firstChild", first_child)
        .getter("lastChild", last_child)
        .getter("firstElementChild", first_element_child)
        .getter("childElementCount", child_element_count)
        .accessor("textContent", text_content, set_text_content)
        .method("appendChild", append_child)
        .method("insertBefore", insert_before)
        .method("removeChild", remove_child)
        .method("replaceChild", replace_child)
        .method("cloneNode", clone_node)
        .method("hasChildNodes", has_child_nodes)
        .method("getElementById", get_element_by_id)
        .method("getElementsByTagName", get_elements_by_tag_name)
        .method("querySelector", query_selector)
        .method("querySelectorAll", query_selector_all)
}

fn members(realm: &Realm, id: u32) -> Vec<NodeId> {
    realm.page.borrow().children(NodeRef::Fragment(FragmentId(id)))
}

fn node_type<'js>(ctx: &Ctx<'js>, _realm: &Realm, _id: u32) -> JsResult<'js> {
    Ok(bridge::int(ctx, 11))
}

fn node_name<'js>(ctx: &Ctx<'js>, _realm: &Realm, _id: u32) -> JsResult<'js> {
    bridge::string(ctx, "#document-fragment")
}

fn parent_node<'js>(ctx: &Ctx<'js>, _realm: &Realm, _id: u32) -> JsResult<'js> {
    Ok(bridge::null(ctx))
}

fn owner_document<'js>(ctx: &Ctx<'js>, realm: &Realm, _id: u32) -> JsResult<'js> {
    bridge::wrap_node(ctx, realm, NodeId::ROOT)
}

fn child_nodes<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    element::child_nodes_of(ctx, realm, NodeRef::Fragment(FragmentId(id)))
}

fn children<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    element::children_of(ctx, realm, NodeRef::Fragment(FragmentId(id)))
}

fn first_child<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let first = members(realm, id).first().copied();
    bridge::wrap_opt(ctx, realm, first)
}

fn last_child<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let last = members(realm, id).last().copied();
    bridge::wrap_opt(ctx, realm, last)
}

fn first_element_child<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let first = {
        let page = realm.page.borrow();
        page.children(NodeRef::Fragment(FragmentId(id)))
            .into_iter()
            .find(|n| page.tree.is_element(*n))
    };
    bridge::wrap_opt(ctx, realm, first)
}

fn child_element_count<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let page = realm.page.borrow();
    let count = page
        .children(NodeRef::Fragment(FragmentId(id)))
        .into_iter()
        .filter(|n| page.tree.is_element(*n))
        .count();
    Ok(bridge::int(ctx, count))
}

fn text_content<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let text: String = {
        let page = realm.page.borrow();
        page.children(NodeRef::Fragment(FragmentId(id)))
            .into_iter()
            .map(|n| page.tree.text_content(n))
            .collect()
    };
    bridge::string(ctx, &text)
}

/// Replaces every member with a single text node
fn set_text_content<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, value: Value<'js>) -> rquickjs::Result<()> {
    let text = bridge::to_string_or_empty(ctx, value)?;
    let fragment = FragmentId(id);
    let mut page = realm.page.borrow_mut();
    page.registry.take_fragment_children(fragment);
    if !text.is_empty() {
        let node = page.create_text(NodeId::ROOT, &text);
        if let Err(err) = page.registry.fragment_append(fragment, node) {
            tracing::warn!("textContent: {}", err);
        }
    }
    Ok(())
}

fn append_child<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    element::append_to(ctx, realm, NodeRef::Fragment(FragmentId(id)), args)
}

fn insert_before<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    element::insert_into(ctx, realm, NodeRef::Fragment(FragmentId(id)), args)
}

fn remove_child<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    element::remove_from(ctx, realm, NodeRef::Fragment(FragmentId(id)), args)
}

fn replace_child<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    element::replace_in(ctx, realm, NodeRef::Fragment(FragmentId(id)), args)
}

/// A new fragment with copies of the members (deep only when asked)
fn clone_node<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let deep = bridge::arg_bool(ctx, args, 0)?;
    let copy = {
        let mut page = realm.page.borrow_mut();
        let copy = page.create_fragment();
        if deep {
            for member in page.children(NodeRef::Fragment(FragmentId(id))) {
                if let Some(c) = page.clone_node(member, true) {
                    if let Err(err) = page.registry.fragment_append(copy, c) {
                        tracing::warn!("cloneNode: {}", err);
                    }
                }
            }
        }
        copy
    };
    bridge::wrap_fragment(ctx, copy)
}

fn has_child_nodes<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, _args: &[Value<'js>]) -> JsResult<'js> {
    Ok(bridge::boolean(ctx, !members(realm, id).is_empty()))
}

fn get_element_by_id<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let wanted = bridge::arg_string(ctx, args, 0)?;
    let found = realm
        .page
        .borrow()
        .element_by_id(NodeRef::Fragment(FragmentId(id)), &wanted);
    bridge::wrap_opt(ctx, realm, found)
}

fn get_elements_by_tag_name<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    element::by_tag_name(ctx, realm, NodeRef::Fragment(FragmentId(id)), args)
}

fn query_selector<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    element::query_first(ctx, realm, NodeRef::Fragment(FragmentId(id)), args)
}

fn query_selector_all<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    element::query_all(ctx, realm, NodeRef::Fragment(FragmentId(id)), args)
}
