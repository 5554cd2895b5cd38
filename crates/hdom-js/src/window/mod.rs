//! Window globals
//!
//! The global object is the window. Most of its surface is written in
//! script (`prelude.js`) on top of a small set of natives installed on a
//! private `host` object, which the prelude removes once it has captured
//! it.

pub mod console;
pub mod history;
pub mod location;
pub mod storage;
pub mod timers;
pub(crate) mod xhr;

use std::rc::Rc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use hdom_css::to_kebab_case;
use hdom_dom::{Event, NodeId, Target};
use rquickjs::function::{Opt, Rest};
use rquickjs::{Ctx, Exception, Function, Object, Value};

use crate::bindings::element;
use crate::bridge;
use crate::realm::{kind, AnimationFrame, Realm};

pub use console::install_console;
pub use history::install_history;
pub use storage::install_storage;

const BOOTSTRAP: &str = include_str!("../js/bootstrap.js");
const PRELUDE: &str = include_str!("../js/prelude.js");

/// Delay of `requestAnimationFrame` callbacks
pub(crate) const FRAME_DELAY: Duration = Duration::from_millis(16);

/// Install the wrapper machinery and every window global
pub(crate) fn install<'js>(ctx: &Ctx<'js>, realm: &Rc<Realm>) -> rquickjs::Result<()> {
    let host = Object::new(ctx.clone())?;
    bridge::install_protocol(ctx, &host, realm)?;
    install_natives(ctx, &host, realm)?;
    xhr::install(ctx, &host, realm)?;
    ctx.globals().set("__hdom_host", host)?;

    ctx.eval::<(), _>(BOOTSTRAP)?;
    install_console(ctx)?;
    install_storage(ctx, realm)?;
    install_history(ctx, realm)?;
    ctx.eval::<(), _>(PRELUDE)?;
    tracing::debug!("window globals installed");
    Ok(())
}

/// Value of a computed style property from the Query collaborator, `""`
/// when it is missing or fails
pub(crate) fn computed_style(realm: &Realm, node: NodeId, property: &str) -> String {
    let Some(query) = realm.callbacks.query.clone() else {
        return String::new();
    };
    let Some(path) = realm.page.borrow().tree.path(node) else {
        return String::new();
    };
    let property = to_kebab_case(property);
    match query(&path, &property) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!("computed style {} of {}: {}", property, path, err);
            String::new()
        }
    }
}

fn delay_of(ms: f64) -> Duration {
    if ms.is_finite() && ms > 0.0 {
        Duration::from_secs_f64(ms / 1000.0)
    } else {
        Duration::ZERO
    }
}

fn install_natives<'js>(ctx: &Ctx<'js>, host: &Object<'js>, realm: &Rc<Realm>) -> rquickjs::Result<()> {
    // ---- timers and animation frames ----

    let r = realm.clone();
    host.set(
        "timer",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, f: Value<'js>, ms: f64, repeat: bool| -> rquickjs::Result<u32> {
                if !f.is_function() {
                    return Err(Exception::throw_type(&ctx, "timer callback is not a function"));
                }
                let handle = bridge::retain(&ctx, f)?;
                let delay = delay_of(ms);
                let now = Instant::now();
                let mut timers = r.timers.borrow_mut();
                Ok(if repeat {
                    timers.set_interval(handle, delay, now)
                } else {
                    timers.set_timeout(handle, delay, now)
                })
            },
        )?,
    )?;

    let r = realm.clone();
    host.set(
        "clearTimer",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>, id: u32| {
            let handle = r.timers.borrow_mut().clear(id);
            if let Some(handle) = handle {
                bridge::release(&ctx, handle);
            }
        })?,
    )?;

    let r = realm.clone();
    host.set(
        "raf",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>, f: Value<'js>| -> rquickjs::Result<u32> {
            let handle = bridge::retain(&ctx, f)?;
            let frame = AnimationFrame {
                id: r.next_frame_id(),
                handle,
                due: Instant::now() + FRAME_DELAY,
            };
            let old = r.frame.replace(Some(frame));
            if let Some(old) = old {
                bridge::release(&ctx, old.handle);
            }
            Ok(frame.id)
        })?,
    )?;

    let r = realm.clone();
    host.set(
        "cancelRaf",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>, id: u32| {
            let cancelled = {
                let mut frame = r.frame.borrow_mut();
                if frame.as_ref().is_some_and(|f| f.id == id) {
                    frame.take()
                } else {
                    None
                }
            };
            if let Some(f) = cancelled {
                bridge::release(&ctx, f.handle);
            }
        })?,
    )?;

    // ---- window events ----

    let r = realm.clone();
    host.set(
        "listen",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>, args: Rest<Value<'js>>| {
            element::add_listener(&ctx, &r, Target::Window, &args.0)
        })?,
    )?;

    let r = realm.clone();
    host.set(
        "unlisten",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>, args: Rest<Value<'js>>| {
            element::remove_listener(&ctx, &r, Target::Window, &args.0)
        })?,
    )?;

    let r = realm.clone();
    host.set(
        "dispatchWindow",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>, args: Rest<Value<'js>>| {
            element::dispatch_at(&ctx, &r, Target::Window, &args.0)
        })?,
    )?;

    let r = realm.clone();
    host.set(
        "stop",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>| -> rquickjs::Result<()> {
            tracing::debug!("window.stop()");
            r.halt.store(true, Ordering::SeqCst);
            Err(Exception::throw_internal(&ctx, "halted by window.stop()"))
        })?,
    )?;

    // ---- layout collaborators ----

    let r = realm.clone();
    host.set(
        "computed",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>, id: u32, property: String| -> rquickjs::Result<String> {
            let node = r.expect_node(&ctx, id)?;
            Ok(computed_style(&r, node, &property))
        })?,
    )?;

    // ---- path addressing ----

    let r = realm.clone();
    host.set(
        "pathChild",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>, id: u32, index: u32| -> rquickjs::Result<Value<'js>> {
            let parent = r.expect_node(&ctx, id)?;
            let child = r.page.borrow().tree.path_child(parent, index as usize);
            bridge::wrap_opt(&ctx, &r, child)
        })?,
    )?;

    // ---- location and environment ----

    let r = realm.clone();
    host.set(
        "location",
        Function::new(ctx.clone(), move |part: String| r.location.borrow().part(&part))?,
    )?;

    let r = realm.clone();
    host.set(
        "setLocation",
        Function::new(ctx.clone(), move |href: String| {
            if let Err(err) = r.location.borrow_mut().set_href(&href) {
                tracing::warn!("location: bad url {}: {}", href, err);
            }
        })?,
    )?;

    let r = realm.clone();
    host.set(
        "userAgent",
        Function::new(ctx.clone(), move || r.user_agent.clone())?,
    )?;

    let r = realm.clone();
    host.set("now", Function::new(ctx.clone(), move || r.now_ms())?)?;

    // ---- object factories ----

    let r = realm.clone();
    host.set(
        "newEvent",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, event_type: String, bubbles: bool, cancelable: bool, proto: String| {
                let ev = if proto == "MouseEvent" {
                    Event::mouse(&event_type, bubbles, cancelable)
                } else {
                    Event::new(&event_type, bubbles, cancelable)
                };
                let id = r.page.borrow_mut().events.insert(ev);
                bridge::wrap(&ctx, kind::EVENT, id.0, &proto)
            },
        )?,
    )?;

    let r = realm.clone();
    host.set(
        "newText",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>, data: String| {
            let node = r.page.borrow_mut().create_text(NodeId::ROOT, &data);
            bridge::wrap_node(&ctx, &r, node)
        })?,
    )?;

    let r = realm.clone();
    host.set(
        "newComment",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>, data: String| {
            let node = r.page.borrow_mut().create_comment(NodeId::ROOT, &data);
            bridge::wrap_node(&ctx, &r, node)
        })?,
    )?;

    let r = realm.clone();
    host.set(
        "newFragment",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>| {
            let fragment = r.page.borrow_mut().create_fragment();
            bridge::wrap_fragment(&ctx, fragment)
        })?,
    )?;

    let r = realm.clone();
    host.set(
        "createDocument",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>, title: Opt<String>| {
            let doc = r
                .page
                .borrow_mut()
                .create_html_document(title.0.as_deref().unwrap_or(""));
            bridge::wrap_node(&ctx, &r, doc)
        })?,
    )?;

    let r = realm.clone();
    host.set(
        "parseDocument",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>, html: String| {
            let doc = r.page.borrow_mut().create_document(&html);
            bridge::wrap_node(&ctx, &r, doc)
        })?,
    )?;

    // ---- focus and the document ----

    let r = realm.clone();
    host.set(
        "setActive",
        Function::new(ctx.clone(), move |id: u32| {
            let node = r.node(id);
            r.page.borrow_mut().set_active_element(node);
        })?,
    )?;

    let r = realm.clone();
    host.set(
        "clearActive",
        Function::new(ctx.clone(), move || r.page.borrow_mut().set_active_element(None))?,
    )?;

    let r = realm.clone();
    host.set(
        "document",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>| bridge::wrap_node(&ctx, &r, NodeId::ROOT))?,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_of() {
        assert_eq!(delay_of(250.0), Duration::from_millis(250));
        assert_eq!(delay_of(-5.0), Duration::ZERO);
        assert_eq!(delay_of(f64::NAN), Duration::ZERO);
    }
}
