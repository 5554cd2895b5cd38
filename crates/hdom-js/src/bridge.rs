//! Native side of the wrapper protocol
//!
//! `bootstrap.js` builds the Proxy wrappers; this module gives them their
//! behaviour. Every property access on a wrapper reaches one of the
//! `__hdom_host` natives installed here with the wrapper's `(kind, id)`,
//! which are resolved against the realm's host classes.
//!
//! Also home to the small conversions every binding needs.

use std::rc::Rc;

use hdom_css::SelectorError;
use hdom_dom::{DomError, DomTree, EventId, FragmentId, NodeData, NodeId, Target};
use rquickjs::convert::Coerced;
use rquickjs::function::Rest;
use rquickjs::{Array, Ctx, Exception, FromJs, Function, Object, Value};

use crate::page::NodeRef;
use crate::realm::{kind, JsHandle, Realm};

// ---- values ---------------------------------------------------------------

pub(crate) fn undefined<'js>(ctx: &Ctx<'js>) -> Value<'js> {
    Value::new_undefined(ctx.clone())
}

pub(crate) fn null<'js>(ctx: &Ctx<'js>) -> Value<'js> {
    Value::new_null(ctx.clone())
}

pub(crate) fn boolean<'js>(ctx: &Ctx<'js>, b: bool) -> Value<'js> {
    Value::new_bool(ctx.clone(), b)
}

pub(crate) fn int<'js>(ctx: &Ctx<'js>, n: usize) -> Value<'js> {
    Value::new_int(ctx.clone(), i32::try_from(n).unwrap_or(i32::MAX))
}

pub(crate) fn number<'js>(ctx: &Ctx<'js>, n: f64) -> Value<'js> {
    Value::new_number(ctx.clone(), n)
}

pub(crate) fn string<'js>(ctx: &Ctx<'js>, s: &str) -> rquickjs::Result<Value<'js>> {
    rquickjs::String::from_str(ctx.clone(), s).map(|s| s.into_value())
}

/// A string, or `null` when absent
pub(crate) fn opt_string<'js>(ctx: &Ctx<'js>, s: Option<&str>) -> rquickjs::Result<Value<'js>> {
    match s {
        Some(s) => string(ctx, s),
        None => Ok(null(ctx)),
    }
}

pub(crate) fn is_nullish(value: &Value<'_>) -> bool {
    value.is_null() || value.is_undefined()
}

/// `String(value)`
pub(crate) fn to_string<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> rquickjs::Result<String> {
    Coerced::<String>::from_js(ctx, value).map(|c| c.0)
}

/// `String(value)`, with `null` and `undefined` as the empty string
pub(crate) fn to_string_or_empty<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> rquickjs::Result<String> {
    if is_nullish(&value) {
        return Ok(String::new());
    }
    to_string(ctx, value)
}

pub(crate) fn arg_string<'js>(ctx: &Ctx<'js>, args: &[Value<'js>], i: usize) -> rquickjs::Result<String> {
    match args.get(i) {
        Some(v) => to_string(ctx, v.clone()),
        None => Ok("undefined".to_string()),
    }
}

pub(crate) fn arg_string_or_empty<'js>(
    ctx: &Ctx<'js>,
    args: &[Value<'js>],
    i: usize,
) -> rquickjs::Result<String> {
    match args.get(i) {
        Some(v) => to_string_or_empty(ctx, v.clone()),
        None => Ok(String::new()),
    }
}

/// Truthiness of an argument, `false` when missing
pub(crate) fn arg_bool<'js>(ctx: &Ctx<'js>, args: &[Value<'js>], i: usize) -> rquickjs::Result<bool> {
    match args.get(i) {
        Some(v) => Coerced::<bool>::from_js(ctx, v.clone()).map(|c| c.0),
        None => Ok(false),
    }
}

/// A non-negative integer argument; `NaN` and negatives read as 0
pub(crate) fn arg_usize<'js>(ctx: &Ctx<'js>, args: &[Value<'js>], i: usize) -> rquickjs::Result<usize> {
    let n = match args.get(i) {
        Some(v) => Coerced::<f64>::from_js(ctx, v.clone())?.0,
        None => 0.0,
    };
    Ok(if n.is_finite() && n > 0.0 { n as usize } else { 0 })
}

// ---- wrappers -------------------------------------------------------------

fn hdom<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<Object<'js>> {
    ctx.globals().get("__hdom")
}

/// The wrapper for `(kind, id)`, created on first use
pub(crate) fn wrap<'js>(ctx: &Ctx<'js>, kind: u32, id: u32, proto: &str) -> rquickjs::Result<Value<'js>> {
    let wrap: Function = hdom(ctx)?.get("wrap")?;
    wrap.call((kind, id, proto.to_string()))
}

/// The wrapper for `(kind, id)` if script code has ever seen it
pub(crate) fn peek<'js>(ctx: &Ctx<'js>, kind: u32, id: u32) -> rquickjs::Result<Option<Object<'js>>> {
    let peek: Function = hdom(ctx)?.get("peek")?;
    let value: Value = peek.call((kind, id))?;
    Ok(value.into_object())
}

/// Constructor a node's wrapper is an instance of
pub(crate) fn proto_of(tree: &DomTree, node: NodeId) -> &'static str {
    match tree.get(node).map(|n| &n.data) {
        Some(NodeData::Document) => "HTMLDocument",
        Some(NodeData::Doctype { .. }) => "DocumentType",
        Some(NodeData::Text(_)) => "Text",
        Some(NodeData::Comment(_)) => "Comment",
        Some(NodeData::Element(e)) if e.namespace.as_deref() == Some("http://www.w3.org/2000/svg") => {
            "SVGElement"
        }
        Some(NodeData::Element(e)) if e.namespace.is_some() => "Element",
        _ => "HTMLElement",
    }
}

pub(crate) fn wrap_node<'js>(ctx: &Ctx<'js>, realm: &Realm, node: NodeId) -> rquickjs::Result<Value<'js>> {
    let (id, proto) = {
        let mut page = realm.page.borrow_mut();
        let id = page.registry.element(node);
        (id.0, proto_of(&page.tree, node))
    };
    wrap(ctx, kind::NODE, id, proto)
}

/// A node wrapper, or `null`
pub(crate) fn wrap_opt<'js>(ctx: &Ctx<'js>, realm: &Realm, node: Option<NodeId>) -> rquickjs::Result<Value<'js>> {
    match node {
        Some(n) => wrap_node(ctx, realm, n),
        None => Ok(null(ctx)),
    }
}

/// A static array of node wrappers
pub(crate) fn wrap_list<'js>(ctx: &Ctx<'js>, realm: &Realm, nodes: &[NodeId]) -> rquickjs::Result<Value<'js>> {
    let array = Array::new(ctx.clone())?;
    for (i, node) in nodes.iter().enumerate() {
        array.set(i, wrap_node(ctx, realm, *node)?)?;
    }
    Ok(array.into_value())
}

pub(crate) fn wrap_fragment<'js>(ctx: &Ctx<'js>, fragment: FragmentId) -> rquickjs::Result<Value<'js>> {
    wrap(ctx, kind::FRAGMENT, fragment.0, "DocumentFragment")
}

pub(crate) fn wrap_ref<'js>(ctx: &Ctx<'js>, realm: &Realm, node: NodeRef) -> rquickjs::Result<Value<'js>> {
    match node {
        NodeRef::Node(n) => wrap_node(ctx, realm, n),
        NodeRef::Fragment(f) => wrap_fragment(ctx, f),
    }
}

pub(crate) fn wrap_event<'js>(ctx: &Ctx<'js>, realm: &Realm, event: EventId) -> rquickjs::Result<Value<'js>> {
    let mouse = realm
        .page
        .borrow()
        .events
        .get(event)
        .is_some_and(|e| e.mouse);
    wrap(ctx, kind::EVENT, event.0, if mouse { "MouseEvent" } else { "Event" })
}

/// The object a target is seen as: a node wrapper or the global object
pub(crate) fn wrap_target<'js>(ctx: &Ctx<'js>, realm: &Realm, target: Option<Target>) -> rquickjs::Result<Value<'js>> {
    match target {
        Some(Target::Node(n)) => wrap_node(ctx, realm, n),
        Some(Target::Window) => Ok(ctx.globals().into_value()),
        None => Ok(null(ctx)),
    }
}

/// `(kind, id)` of a wrapper
pub(crate) fn unwrap(value: &Value<'_>) -> Option<(u32, u32)> {
    let obj = value.as_object()?;
    let kind: Option<u32> = obj.get("__hdom_kind").ok()?;
    let id: Option<u32> = obj.get("__hdom_id").ok()?;
    Some((kind?, id?))
}

/// Node or fragment behind a wrapper
pub(crate) fn node_ref(realm: &Realm, value: &Value<'_>) -> Option<NodeRef> {
    match unwrap(value)? {
        (kind::NODE, id) => realm.node(id).map(NodeRef::Node),
        (kind::FRAGMENT, id) => Some(NodeRef::Fragment(FragmentId(id))),
        _ => None,
    }
}

/// Argument `i` as a node or fragment, throwing a TypeError otherwise
pub(crate) fn arg_ref<'js>(ctx: &Ctx<'js>, realm: &Realm, args: &[Value<'js>], i: usize) -> rquickjs::Result<NodeRef> {
    args.get(i)
        .and_then(|v| node_ref(realm, v))
        .ok_or_else(|| Exception::throw_type(ctx, &format!("argument {} is not a Node", i + 1)))
}

/// Argument `i` as a tree node, throwing a TypeError otherwise
pub(crate) fn arg_node<'js>(ctx: &Ctx<'js>, realm: &Realm, args: &[Value<'js>], i: usize) -> rquickjs::Result<NodeId> {
    match arg_ref(ctx, realm, args, i)? {
        NodeRef::Node(n) => Ok(n),
        NodeRef::Fragment(_) => Err(Exception::throw_type(
            ctx,
            &format!("argument {} is a DocumentFragment", i + 1),
        )),
    }
}

/// Optional node argument: `null`/`undefined` read as `None`
pub(crate) fn arg_opt_node<'js>(
    ctx: &Ctx<'js>,
    realm: &Realm,
    args: &[Value<'js>],
    i: usize,
) -> rquickjs::Result<Option<NodeId>> {
    match args.get(i) {
        Some(v) if !is_nullish(v) => arg_node(ctx, realm, args, i).map(Some),
        _ => Ok(None),
    }
}

pub(crate) fn event_of(value: &Value<'_>) -> Option<EventId> {
    match unwrap(value)? {
        (kind::EVENT, id) => Some(EventId(id)),
        _ => None,
    }
}

// ---- callbacks ------------------------------------------------------------

/// Keep `f` alive for native code; the same function yields the same handle
pub(crate) fn retain<'js>(ctx: &Ctx<'js>, f: Value<'js>) -> rquickjs::Result<JsHandle> {
    let retain: Function = hdom(ctx)?.get("retain")?;
    retain.call((f,)).map(JsHandle)
}

pub(crate) fn release(ctx: &Ctx<'_>, handle: JsHandle) {
    let released = hdom(ctx)
        .and_then(|h| h.get::<_, Function>("release"))
        .and_then(|f| f.call::<_, ()>((handle.0,)));
    if let Err(err) = released {
        tracing::debug!("release of handle {} failed: {}", handle.0, err);
    }
}

/// Handle of an already retained function
pub(crate) fn handle_of<'js>(ctx: &Ctx<'js>, f: Value<'js>) -> rquickjs::Result<Option<JsHandle>> {
    let handle_of: Function = hdom(ctx)?.get("handleOf")?;
    let h: u32 = handle_of.call((f,))?;
    Ok((h != 0).then_some(JsHandle(h)))
}

/// Call a retained function with `this` and `args`
pub(crate) fn invoke<'js>(
    ctx: &Ctx<'js>,
    handle: JsHandle,
    this: Value<'js>,
    args: Vec<Value<'js>>,
) -> rquickjs::Result<Value<'js>> {
    let invoke: Function = hdom(ctx)?.get("invoke")?;
    let array = Array::new(ctx.clone())?;
    for (i, arg) in args.into_iter().enumerate() {
        array.set(i, arg)?;
    }
    invoke.call((handle.0, this, array))
}

/// Evaluate inline handler source with `this` bound to the element
pub(crate) fn run_inline<'js>(
    ctx: &Ctx<'js>,
    source: &str,
    this: Value<'js>,
    event: Value<'js>,
) -> rquickjs::Result<Value<'js>> {
    let inline: Function = hdom(ctx)?.get("inline")?;
    inline.call((source.to_string(), this, event))
}

// ---- errors ---------------------------------------------------------------

/// A pending exception taken off the context
#[derive(Debug, Clone)]
pub(crate) struct Caught {
    pub message: String,
    pub stack: Option<String>,
}

pub(crate) fn caught(ctx: &Ctx<'_>) -> Caught {
    let value = ctx.catch();
    if let Some(ex) = value.as_exception() {
        let name: Option<String> = ex.get("name").ok();
        let message = ex.message().unwrap_or_default();
        return Caught {
            message: match name {
                Some(name) if !message.is_empty() => format!("{name}: {message}"),
                Some(name) => name,
                None => message,
            },
            stack: ex.stack(),
        };
    }
    let message = Coerced::<String>::from_js(ctx, value)
        .map(|c| c.0)
        .unwrap_or_else(|_| "uncaught exception".to_string());
    Caught { message, stack: None }
}

/// Message of a failed call, taking the pending exception if there is one
pub(crate) fn describe(ctx: &Ctx<'_>, err: rquickjs::Error) -> String {
    match err {
        rquickjs::Error::Exception => caught(ctx).message,
        other => other.to_string(),
    }
}

pub(crate) fn selector_error(ctx: &Ctx<'_>, err: SelectorError) -> rquickjs::Error {
    Exception::throw_syntax(ctx, &err.to_string())
}

/// DOM errors raised by script calls are logged and read as `null`
pub(crate) fn absorb<'js>(ctx: &Ctx<'js>, op: &str, err: DomError) -> Value<'js> {
    match err {
        DomError::Structural(_) => tracing::error!("{}: {}", op, err),
        _ => tracing::warn!("{}: {}", op, err),
    }
    null(ctx)
}

// ---- object protocol natives ----------------------------------------------

/// Install `get`, `set`, `has`, `keys`, `del`, `call` and `methods`
pub(crate) fn install_protocol<'js>(ctx: &Ctx<'js>, host: &Object<'js>, realm: &Rc<Realm>) -> rquickjs::Result<()> {
    let r = realm.clone();
    host.set(
        "get",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, kind: u32, id: u32, name: String, miss: Value<'js>| -> rquickjs::Result<Value<'js>> {
                for class in r.chain(kind, id) {
                    if let Some(getter) = class.get_getter(&name) {
                        return getter(&ctx, &r, id);
                    }
                    if let Some(dynamic) = class.get_dynamic() {
                        if let Some(v) = (dynamic.get)(&ctx, &r, id, &name)? {
                            return Ok(v);
                        }
                    }
                }
                Ok(miss)
            },
        )?,
    )?;

    let r = realm.clone();
    host.set(
        "set",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, kind: u32, id: u32, name: String, value: Value<'js>| -> rquickjs::Result<bool> {
                for class in r.chain(kind, id) {
                    if let Some(setter) = class.get_setter(&name) {
                        setter(&ctx, &r, id, value)?;
                        return Ok(true);
                    }
                    if class.has_getter(&name) {
                        // read-only, the write is ignored
                        return Ok(true);
                    }
                    if let Some(set) = class.get_dynamic().and_then(|d| d.set) {
                        if set(&ctx, &r, id, &name, value.clone())? {
                            return Ok(true);
                        }
                    }
                }
                Ok(false)
            },
        )?,
    )?;

    let r = realm.clone();
    host.set(
        "has",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, kind: u32, id: u32, name: String| -> rquickjs::Result<bool> {
                for class in r.chain(kind, id) {
                    if class.has_getter(&name) {
                        return Ok(true);
                    }
                    if let Some(dynamic) = class.get_dynamic() {
                        if (dynamic.get)(&ctx, &r, id, &name)?.is_some() {
                            return Ok(true);
                        }
                    }
                }
                Ok(false)
            },
        )?,
    )?;

    let r = realm.clone();
    host.set(
        "keys",
        Function::new(ctx.clone(), move |kind: u32, id: u32| -> Vec<String> {
            r.chain(kind, id)
                .into_iter()
                .filter_map(|c| c.get_dynamic())
                .flat_map(|d| (d.keys)(&r, id))
                .collect()
        })?,
    )?;

    let r = realm.clone();
    host.set(
        "del",
        Function::new(ctx.clone(), move |kind: u32, id: u32, name: String| -> bool {
            r.chain(kind, id)
                .into_iter()
                .filter_map(|c| c.get_dynamic().and_then(|d| d.delete))
                .any(|delete| delete(&r, id, &name))
        })?,
    )?;

    let r = realm.clone();
    host.set(
        "call",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, kind: u32, id: u32, name: String, args: Rest<Value<'js>>| -> rquickjs::Result<Value<'js>> {
                for class in r.chain(kind, id) {
                    if let Some(method) = class.get_method(&name) {
                        return method(&ctx, &r, id, &args.0);
                    }
                }
                Err(Exception::throw_type(&ctx, &format!("{name} is not a function")))
            },
        )?,
    )?;

    let r = realm.clone();
    host.set(
        "methods",
        Function::new(ctx.clone(), move |kind: u32, document: bool| r.method_names(kind, document))?,
    )?;

    Ok(())
}
