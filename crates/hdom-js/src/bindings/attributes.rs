//! NamedNodeMap (`element.attributes`)
//!
//! Entries are plain `{name, value}` records built on access; they are
//! snapshots, not live `Attr` nodes.

use hdom_dom::{Attribute, NodeId};
use rquickjs::{Ctx, Object, Value};

use super::{index_key, JsResult};
use crate::bridge;
use crate::realm::{Dynamic, HostClass, Realm};

pub(crate) fn class() -> HostClass {
    HostClass::new()
        .getter("length", length)
        .method("item", item)
        .method("getNamedItem", get_named_item)
        .method("removeNamedItem", remove_named_item)
        .dynamic(Dynamic {
            get: lookup,
            set: None,
            keys,
            delete: None,
        })
}

fn attrs(realm: &Realm, node: NodeId) -> Vec<Attribute> {
    realm.page.borrow().tree.attrs(node).to_vec()
}

fn record<'js>(ctx: &Ctx<'js>, attr: &Attribute) -> JsResult<'js> {
    let obj = Object::new(ctx.clone())?;
    obj.set("name", attr.name.as_str())?;
    obj.set("value", attr.value.as_str())?;
    obj.set("nodeName", attr.name.as_str())?;
    obj.set("nodeValue", attr.value.as_str())?;
    obj.set("specified", true)?;
    Ok(obj.into_value())
}

fn find(realm: &Realm, id: u32, key: &str) -> Option<Attribute> {
    let node = realm.node(id)?;
    let attrs = attrs(realm, node);
    match index_key(key) {
        Some(i) => attrs.get(i).cloned(),
        None => {
            let key = key.to_ascii_lowercase();
            attrs.into_iter().find(|a| a.name.eq_ignore_ascii_case(&key))
        }
    }
}

fn length<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    Ok(bridge::int(ctx, attrs(realm, node).len()))
}

fn item<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let index = bridge::arg_usize(ctx, args, 0)?;
    match attrs(realm, node).get(index) {
        Some(attr) => record(ctx, attr),
        None => Ok(bridge::null(ctx)),
    }
}

fn get_named_item<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let name = bridge::arg_string(ctx, args, 0)?;
    match find(realm, id, &name).filter(|_| index_key(&name).is_none()) {
        Some(attr) => record(ctx, &attr),
        None => Ok(bridge::null(ctx)),
    }
}

/// Returns the removed record, `null` when there was none
fn remove_named_item<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let name = bridge::arg_string(ctx, args, 0)?;
    let Some(attr) = find(realm, id, &name).filter(|_| index_key(&name).is_none()) else {
        return Ok(bridge::null(ctx));
    };
    realm.page.borrow_mut().remove_attribute(node, &attr.name);
    record(ctx, &attr)
}

fn lookup<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, key: &str) -> rquickjs::Result<Option<Value<'js>>> {
    match find(realm, id, key) {
        Some(attr) => record(ctx, &attr).map(Some),
        None => Ok(None),
    }
}

fn keys(realm: &Realm, id: u32) -> Vec<String> {
    let Some(node) = realm.node(id) else {
        return Vec::new();
    };
    (0..attrs(realm, node).len()).map(|i| i.to_string()).collect()
}
