//! HTMLCollection and NodeList
//!
//! Collections are live: every access re-evaluates the page's selection,
//! so `length` and indices follow the tree.

use hdom_dom::NodeId;
use rquickjs::{Ctx, Value};

use super::{index_key, JsResult};
use crate::bridge;
use crate::realm::{Dynamic, HostClass, Realm};

pub(crate) fn class() -> HostClass {
    HostClass::new()
        .getter("length", length)
        .method("item", item)
        .method("namedItem", named_item)
        .dynamic(Dynamic {
            get: lookup,
            set: None,
            keys,
            delete: None,
        })
}

fn items(realm: &Realm, id: u32) -> Vec<NodeId> {
    realm.page.borrow().collection_items(id)
}

/// Index first, then `id`, then `name`
fn find(realm: &Realm, id: u32, key: &str) -> Option<NodeId> {
    let items = items(realm, id);
    if let Some(i) = index_key(key) {
        return items.get(i).copied();
    }
    let page = realm.page.borrow();
    items
        .iter()
        .find(|n| page.tree.attr(**n, "id") == Some(key))
        .or_else(|| items.iter().find(|n| page.tree.attr(**n, "name") == Some(key)))
        .copied()
}

fn length<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    Ok(bridge::int(ctx, items(realm, id).len()))
}

fn item<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let index = bridge::arg_usize(ctx, args, 0)?;
    let node = items(realm, id).get(index).copied();
    bridge::wrap_opt(ctx, realm, node)
}

fn named_item<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let name = bridge::arg_string(ctx, args, 0)?;
    let node = find(realm, id, &name).filter(|_| index_key(&name).is_none());
    bridge::wrap_opt(ctx, realm, node)
}

fn lookup<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, key: &str) -> rquickjs::Result<Option<Value<'js>>> {
    match find(realm, id, key) {
        Some(node) => bridge::wrap_node(ctx, realm, node).map(Some),
        None => Ok(None),
    }
}

fn keys(realm: &Realm, id: u32) -> Vec<String> {
    (0..items(realm, id).len()).map(|i| i.to_string()).collect()
}
