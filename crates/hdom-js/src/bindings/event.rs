//! Event, MouseEvent and CustomEvent
//!
//! Event state lives in the page's event arena; the wrapper id is the
//! arena index. `detail` and other script-set fields stay on the wrapper.

use hdom_dom::{DomError, Event, EventId};
use rquickjs::{Ctx, Value};

use super::JsResult;
use crate::bridge;
use crate::realm::{kind, HostClass, Realm};

pub(crate) fn class() -> HostClass {
    HostClass::new()
        .getter("type", event_type)
        .getter("bubbles", bubbles)
        .getter("cancelable", cancelable)
        .getter("defaultPrevented", default_prevented)
        .accessor("cancelBubble", cancel_bubble, set_cancel_bubble)
        .accessor("returnValue", return_value, set_return_value)
        .getter("target", target)
        .getter("currentTarget", current_target)
        .getter("srcElement", src_element)
        .getter("timeStamp", time_stamp)
        .getter("isTrusted", is_trusted)
        .getter("eventPhase", event_phase)
        .method("preventDefault", prevent_default)
        .method("stopPropagation", stop_propagation)
        .method("stopImmediatePropagation", stop_propagation)
        .method("initEvent", init_event)
        .method("initMouseEvent", init_mouse_event)
        .method("initCustomEvent", init_custom_event)
}

/// Read a field of the event, throwing for ids the arena does not know
fn read<'js, T>(ctx: &Ctx<'js>, realm: &Realm, id: u32, f: impl FnOnce(&Event) -> T) -> rquickjs::Result<T> {
    let page = realm.page.borrow();
    match page.events.get(EventId(id)) {
        Some(ev) => Ok(f(ev)),
        None => Err(rquickjs::Exception::throw_reference(ctx, &format!("unknown event {id}"))),
    }
}

fn update<T>(realm: &Realm, id: u32, f: impl FnOnce(&mut Event) -> T) -> Option<T> {
    realm.page.borrow_mut().events.get_mut(EventId(id)).map(f)
}

fn event_type<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let t = read(ctx, realm, id, |e| e.event_type.clone())?;
    bridge::string(ctx, &t)
}

fn bubbles<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    Ok(bridge::boolean(ctx, read(ctx, realm, id, |e| e.bubbles)?))
}

fn cancelable<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    Ok(bridge::boolean(ctx, read(ctx, realm, id, |e| e.cancelable)?))
}

fn default_prevented<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    Ok(bridge::boolean(ctx, read(ctx, realm, id, |e| e.default_prevented)?))
}

fn cancel_bubble<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    Ok(bridge::boolean(ctx, read(ctx, realm, id, |e| e.cancel_bubble)?))
}

fn set_cancel_bubble<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, value: Value<'js>) -> rquickjs::Result<()> {
    let on = bridge::arg_bool(ctx, &[value], 0)?;
    update(realm, id, |e| e.cancel_bubble = on);
    Ok(())
}

fn return_value<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    Ok(bridge::boolean(ctx, read(ctx, realm, id, Event::return_value)?))
}

fn set_return_value<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, value: Value<'js>) -> rquickjs::Result<()> {
    let on = bridge::arg_bool(ctx, &[value], 0)?;
    update(realm, id, |e| e.set_return_value(on));
    Ok(())
}

fn target<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let t = read(ctx, realm, id, |e| e.target)?;
    bridge::wrap_target(ctx, realm, t)
}

fn current_target<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let t = read(ctx, realm, id, |e| e.current_target)?;
    bridge::wrap_target(ctx, realm, t)
}

fn src_element<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let t = read(ctx, realm, id, |e| e.src_element)?;
    bridge::wrap_target(ctx, realm, t)
}

fn time_stamp<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    Ok(bridge::number(ctx, read(ctx, realm, id, |e| e.time_stamp)?))
}

fn is_trusted<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    Ok(bridge::boolean(ctx, read(ctx, realm, id, |e| e.trusted)?))
}

/// 0 before dispatch, 2 at the target, 3 while bubbling
fn event_phase<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32) -> JsResult<'js> {
    let phase = read(ctx, realm, id, |e| match (e.target, e.current_target) {
        (_, None) => 0,
        (t, c) if t == c => 2,
        _ => 3,
    })?;
    Ok(bridge::int(ctx, phase))
}

fn prevent_default<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, _args: &[Value<'js>]) -> JsResult<'js> {
    update(realm, id, Event::prevent_default);
    Ok(bridge::undefined(ctx))
}

fn stop_propagation<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, _args: &[Value<'js>]) -> JsResult<'js> {
    update(realm, id, Event::stop_propagation);
    Ok(bridge::undefined(ctx))
}

fn init<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>], mouse: bool) -> rquickjs::Result<()> {
    let event_type = bridge::arg_string(ctx, args, 0)?;
    let bubbles = bridge::arg_bool(ctx, args, 1)?;
    let cancelable = bridge::arg_bool(ctx, args, 2)?;
    let result = update(realm, id, |e| -> Result<(), DomError> {
        e.init(&event_type, bubbles, cancelable)?;
        e.mouse |= mouse;
        Ok(())
    });
    if let Some(Err(err)) = result {
        bridge::absorb(ctx, "initEvent", err);
    }
    Ok(())
}

fn init_event<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    init(ctx, realm, id, args, false)?;
    Ok(bridge::undefined(ctx))
}

/// The view, detail, coordinate and modifier arguments are ignored
fn init_mouse_event<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    init(ctx, realm, id, args, true)?;
    Ok(bridge::undefined(ctx))
}

fn init_custom_event<'js>(ctx: &Ctx<'js>, realm: &Realm, id: u32, args: &[Value<'js>]) -> JsResult<'js> {
    init(ctx, realm, id, args, false)?;
    if let Some(wrapper) = bridge::peek(ctx, kind::EVENT, id)? {
        let detail = args.get(3).cloned().unwrap_or_else(|| bridge::null(ctx));
        wrapper.set("detail", detail)?;
    }
    Ok(bridge::undefined(ctx))
}
