//! CSSStyleDeclaration (`element.style`)
//!
//! A live view of the `style` attribute. Property access accepts camelCase
//! (`style.backgroundColor`) and reads back `""` for CSS properties that
//! are not declared.

use hdom_css::{is_known_property, to_kebab_case, StyleDeclaration};
use hdom_dom::NodeId;
use rquickjs::{Ctx, Value};

use super::{index_key, JsResult};
use crate::bridge;
use crate::realm::{Dynamic, HostClass, Realm};

pub(crate) fn class() -> HostClass {
    HostClass::new()
        .accessor("cssText", css_text, set_css_text)
        .getter("length", length)
        .method("item", item)
        .method("getPropertyValue", get_property_value)
        .method("getPropertyPriority", get_property_priority)
        .method("setProperty", set_property)
        .method("removeProperty", remove_property)
        .dynamic(Dynamic {
            get: lookup,
            set: Some(assign),
            keys,
            delete: Some(delete),
        })
}

/// `cssFloat` is the one accessor that does not map mechanically
fn property_name(key: &str) -> String {
    match key {
        "cssFloat" => "float".to_string(),
        _ => to_kebab_case(key),
    }
}

fn read(realm: &Realm, node: NodeId) -> StyleDeclaration {
    realm.page.borrow().style(node)
}

fn write(realm: &Realm, node: NodeId, style: &StyleDeclaration) {
    if let Err(err) = realm.page.borrow_mut().set_style(node, style) {
        tracing::warn!("style: {}", err);
    }
}

fn css_text<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    bridge::string(ctx, &read(realm, node).to_css())
}

fn set_css_text<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, value: Value<'js>) -> rquickjs::Result<()> {
    let node = realm.expect_node(ctx, id)?;
    let text = bridge::to_string_or_empty(ctx, value)?;
    write(realm, node, &StyleDeclaration::parse(&text));
    Ok(())
}

fn length<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    Ok(bridge::int(ctx, read(realm, node).len()))
}

fn item<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let index = bridge::arg_usize(ctx, args, 0)?;
    let style = read(realm, node);
    bridge::string(ctx, style.item(index).unwrap_or(""))
}

fn get_property_value<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let name = bridge::arg_string(ctx, args, 0)?;
    let style = read(realm, node);
    bridge::string(ctx, style.get(&name).unwrap_or(""))
}

fn get_property_priority<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let name = bridge::arg_string(ctx, args, 0)?;
    bridge::string(ctx, read(realm, node).priority(&name))
}

fn set_property<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let name = bridge::arg_string(ctx, args, 0)?;
    let value = bridge::arg_string_or_empty(ctx, args, 1)?;
    let important = bridge::arg_string_or_empty(ctx, args, 2)?.eq_ignore_ascii_case("important");
    let mut style = read(realm, node);
    if style.set(&name, &value, important) {
        write(realm, node, &style);
    }
    Ok(bridge::undefined(ctx))
}

fn remove_property<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    let node = realm.expect_node(ctx, id)?;
    let name = bridge::arg_string(ctx, args, 0)?;
    let mut style = read(realm, node);
    let old = style.remove(&name);
    if !old.is_empty() {
        write(realm, node, &style);
    }
    bridge::string(ctx, &old)
}

fn lookup<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, key: &str) -> rquickjs::Result<Option<Value<'js>>> {
    let Some(node) = realm.node(id) else {
        return Ok(None);
    };
    let style = read(realm, node);
    if let Some(i) = index_key(key) {
        return style.item(i).map(|name| bridge::string(ctx, name)).transpose();
    }
    let name = property_name(key);
    match style.get(&name) {
        Some(value) => bridge::string(ctx, value).map(Some),
        None if is_known_property(&name) => bridge::string(ctx, "").map(Some),
        None => Ok(None),
    }
}

/// Assigning `""` removes the declaration; unknown names are left to the
/// wrapper's own properties
fn assign<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, key: &str, value: Value<'js>) -> rquickjs::Result<bool> {
    let Some(node) = realm.node(id) else {
        return Ok(false);
    };
    let name = property_name(key);
    let mut style = read(realm, node);
    if !is_known_property(&name) && style.get(&name).is_none() {
        return Ok(false);
    }
    let value = bridge::to_string_or_empty(ctx, value)?;
    if style.set(&name, &value, false) {
        write(realm, node, &style);
    }
    Ok(true)
}

fn keys(realm: &Realm, id: u32) -> Vec<String> {
    let Some(node) = realm.node(id) else {
        return Vec::new();
    };
    (0..read(realm, node).len()).map(|i| i.to_string()).collect()
}

fn delete(realm: &Realm, id: u32, key: &str) -> bool {
    let Some(node) = realm.node(id) else {
        return false;
    };
    let mut style = read(realm, node);
    let removed = !style.remove(&property_name(key)).is_empty();
    if removed {
        write(realm, node, &style);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_name() {
        assert_eq!(property_name("backgroundColor"), "background-color");
        assert_eq!(property_name("cssFloat"), "float");
        assert_eq!(property_name("color"), "color");
    }
}
