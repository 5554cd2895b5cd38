//! Script host
//!
//! [`ScriptHost`] owns one QuickJS runtime and context plus the realm the
//! DOM bindings share. It is single threaded: the session worker creates
//! it and every call happens on that thread. Work that completes elsewhere
//! (XHR) comes back as a [`Task`] through the [`Scheduler`].

use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use hdom_dom::{render, Event, MutationSender, NodeId, Target};
use rquickjs::convert::Coerced;
use rquickjs::{Context, Ctx, FromJs, Runtime, Value};
use url::Url;

use crate::bridge;
use crate::callbacks::Callbacks;
use crate::dispatch::ScriptDispatch;
use crate::error::{excerpt, stack_position, JsError};
use crate::page::{NodeRef, Page, ReadyState};
use crate::realm::{JsHandle, Realm};
use crate::window::{self, xhr::XhrResult};

/// Work to run on the script thread
pub type Task = Box<dyn FnOnce(&mut ScriptHost) + Send>;

/// Submits a [`Task`] to the thread that owns the host
pub type Scheduler = Arc<dyn Fn(Task) + Send + Sync>;

/// Runtime settings of a [`ScriptHost`]
#[derive(Debug, Clone)]
pub struct HostOptions {
    /// Page URL, the base of `location` and relative requests
    pub origin: Url,
    pub user_agent: String,
    /// QuickJS heap limit in bytes
    pub memory_limit: usize,
    /// Longest a single evaluation or callback may run
    pub script_timeout: Option<Duration>,
}

impl HostOptions {
    pub const DEFAULT_USER_AGENT: &'static str = "Mozilla/5.0 (X11; Linux x86_64) hdom/0.1";

    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            user_agent: Self::DEFAULT_USER_AGENT.to_string(),
            memory_limit: 64 * 1024 * 1024,
            script_timeout: Some(Duration::from_secs(10)),
        }
    }
}

/// QuickJS context with the DOM and window APIs installed
pub struct ScriptHost {
    realm: Rc<Realm>,
    // declared before the runtime so it is dropped first
    context: Context,
    runtime: Runtime,
    deadline: Arc<Mutex<Option<Instant>>>,
    timeout: Option<Duration>,
}

impl ScriptHost {
    /// Parse `html` into the main document and install the window globals
    pub fn new(
        html: &str,
        options: HostOptions,
        callbacks: Callbacks,
        mutations: MutationSender,
        scheduler: Scheduler,
    ) -> Result<Self, JsError> {
        tracing::debug!("script host: parse document ({} bytes)", html.len());
        let page = Page::new(hdom_html::parse_document(html), mutations);
        let realm = Rc::new(Realm::new(page, &options, callbacks, scheduler));

        let runtime = Runtime::new()?;
        runtime.set_memory_limit(options.memory_limit);
        let deadline: Arc<Mutex<Option<Instant>>> = Arc::new(Mutex::new(None));
        let halt = realm.halt.clone();
        let due = deadline.clone();
        runtime.set_interrupt_handler(Some(Box::new(move || {
            if halt.load(Ordering::SeqCst) {
                return true;
            }
            let due = due.lock().ok().and_then(|d| *d);
            due.is_some_and(|d| Instant::now() >= d)
        })));

        let context = Context::full(&runtime)?;
        let host = Self {
            realm,
            context,
            runtime,
            deadline,
            timeout: options.script_timeout,
        };
        host.guarded(|ctx, realm| {
            window::install(ctx, realm).map_err(|err| failure(ctx, realm, err, ""))
        })?;
        Ok(host)
    }

    fn set_deadline(&self, deadline: Option<Instant>) {
        if let Ok(mut d) = self.deadline.lock() {
            *d = deadline;
        }
    }

    fn timed_out(&self) -> bool {
        let deadline = self.deadline.lock().ok().and_then(|d| *d);
        deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Run `f` inside the context under the script deadline. A halt
    /// requested while it ran turns any result into [`JsError::Halted`].
    fn guarded<R>(
        &self,
        f: impl for<'js> FnOnce(&Ctx<'js>, &Rc<Realm>) -> Result<R, JsError>,
    ) -> Result<R, JsError> {
        self.realm.halt.store(false, Ordering::SeqCst);
        self.set_deadline(self.timeout.map(|t| Instant::now() + t));
        let result = self.context.with(|ctx| f(&ctx, &self.realm));
        let timed_out = self.timed_out();
        self.set_deadline(None);
        if self.realm.halt.load(Ordering::SeqCst) {
            return Err(JsError::Halted);
        }
        match result {
            Err(JsError::Script { .. }) if timed_out => Err(JsError::Deadline),
            other => other,
        }
    }

    /// Evaluate `source` as a classic script and return its completion
    /// value as a string. Promise jobs it queued run before returning.
    pub fn eval(&mut self, source: &str) -> Result<String, JsError> {
        tracing::debug!("exec: run script ({} bytes)", source.len());
        let result = self.guarded(|ctx, realm| {
            let value: Value = ctx
                .eval(source)
                .map_err(|err| failure(ctx, realm, err, source))?;
            if value.is_undefined() {
                return Ok(String::new());
            }
            Coerced::<String>::from_js(ctx, value)
                .map(|s| s.0)
                .map_err(|err| failure(ctx, realm, err, source))
        });
        self.run_jobs();
        result
    }

    /// Fire the load sequence: `readystatechange` (interactive),
    /// `DOMContentLoaded`, `readystatechange` (complete), window `load`
    pub fn close_document(&mut self) -> Result<(), JsError> {
        tracing::debug!("close document");
        let result = self.guarded(|ctx, realm| {
            realm.page.borrow_mut().set_ready_state(ReadyState::Interactive);
            fire(ctx, realm, Target::Node(NodeId::ROOT), "readystatechange", false);
            fire(ctx, realm, Target::Node(NodeId::ROOT), "DOMContentLoaded", true);
            realm.page.borrow_mut().set_ready_state(ReadyState::Complete);
            fire(ctx, realm, Target::Node(NodeId::ROOT), "readystatechange", false);
            fire(ctx, realm, Target::Window, "load", false);
            Ok(())
        });
        self.run_jobs();
        result
    }

    /// Click the first element matching `selector`. Tries a plain click,
    /// a `click` mouse event, `mouseup` and `focus` until one is consumed.
    /// `None` when nothing matches.
    pub fn click(&mut self, selector: &str) -> Result<Option<bool>, JsError> {
        let target = self
            .realm
            .page
            .borrow()
            .query_first(NodeRef::Node(NodeId::ROOT), selector)?;
        let Some(node) = target else {
            return Ok(None);
        };
        tracing::debug!("click {}", selector);
        let consumed = self.guarded(|ctx, realm| {
            let steps = [
                Event::new("click", true, true),
                Event::mouse("click", true, true),
                Event::mouse("mouseup", true, true),
                Event::new("focus", false, false),
            ];
            for mut ev in steps {
                if ev.event_type == "focus" {
                    realm.page.borrow_mut().set_active_element(Some(node));
                }
                ev.trusted = true;
                let id = realm.page.borrow_mut().events.insert(ev);
                if ScriptDispatch::new(ctx, realm, id).run(node) {
                    return Ok(true);
                }
            }
            Ok(false)
        });
        self.run_jobs();
        consumed.map(Some)
    }

    /// Set an attribute on the first element matching `selector`
    pub fn put_attr(&mut self, selector: &str, name: &str, value: &str) -> Result<bool, JsError> {
        let mut page = self.realm.page.borrow_mut();
        let Some(node) = page.query_first(NodeRef::Node(NodeId::ROOT), selector)? else {
            return Ok(false);
        };
        match page.set_attribute(node, name, value) {
            Ok(()) => Ok(true),
            Err(err) => {
                tracing::warn!("put attr {} on {}: {}", name, selector, err);
                Ok(false)
            }
        }
    }

    /// HTML of the main document element
    pub fn render(&self) -> String {
        let page = self.realm.page.borrow();
        let root = page.tree.document_element(NodeId::ROOT).unwrap_or(NodeId::ROOT);
        render(&page.tree, root)
    }

    /// Read access to the page
    pub fn with_page<R>(&self, f: impl FnOnce(&Page) -> R) -> R {
        f(&self.realm.page.borrow())
    }

    /// Fire every timer due at `now`
    pub fn run_timers(&mut self, now: Instant) -> Result<(), JsError> {
        let ready = self.realm.timers.borrow_mut().take_ready(now);
        if ready.is_empty() {
            return Ok(());
        }
        let result = self.guarded(|ctx, realm| {
            for timer in ready {
                // an earlier callback in this batch may have cleared it
                if timer.repeat && !realm.timers.borrow().is_active(timer.id) {
                    continue;
                }
                if let Err(err) = bridge::invoke(ctx, timer.handle, bridge::undefined(ctx), Vec::new()) {
                    tracing::warn!("timer {}: {}", timer.id, bridge::describe(ctx, err));
                }
                if !timer.repeat {
                    bridge::release(ctx, timer.handle);
                }
            }
            Ok(())
        });
        self.run_jobs();
        result
    }

    /// Run the pending animation frame if it is due at `now`
    pub fn run_animation_frame(&mut self, now: Instant) -> Result<(), JsError> {
        let frame = {
            let mut frame = self.realm.frame.borrow_mut();
            if frame.as_ref().is_some_and(|f| f.due <= now) {
                frame.take()
            } else {
                None
            }
        };
        let Some(frame) = frame else {
            return Ok(());
        };
        let result = self.guarded(|ctx, realm| {
            let ts = bridge::number(ctx, realm.now_ms());
            if let Err(err) = bridge::invoke(ctx, frame.handle, bridge::undefined(ctx), vec![ts]) {
                tracing::warn!("animation frame: {}", bridge::describe(ctx, err));
            }
            bridge::release(ctx, frame.handle);
            Ok(())
        });
        self.run_jobs();
        result
    }

    /// Earliest instant a timer or animation frame becomes due
    pub fn next_deadline(&self) -> Option<Instant> {
        let timer = self.realm.timers.borrow().next_deadline();
        let frame = self.realm.frame.borrow().map(|f| f.due);
        match (timer, frame) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Drain the promise job queue
    pub fn run_jobs(&mut self) {
        self.set_deadline(self.timeout.map(|t| Instant::now() + t));
        loop {
            match self.runtime.execute_pending_job() {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) => tracing::warn!("promise job failed: {:?}", err),
            }
            if self.realm.halt.load(Ordering::SeqCst) || self.timed_out() {
                tracing::warn!("promise jobs interrupted");
                break;
            }
        }
        self.set_deadline(None);
    }

    /// Deliver an XHR outcome to its script callback
    pub fn complete_xhr(&mut self, handle: JsHandle, result: XhrResult) -> Result<(), JsError> {
        let outcome = self.guarded(|ctx, realm| {
            let args = window::xhr::callback_args(ctx, &result)?;
            let called = bridge::invoke(ctx, handle, bridge::undefined(ctx), args);
            bridge::release(ctx, handle);
            called.map(|_| ()).map_err(|err| failure(ctx, realm, err, ""))
        });
        self.run_jobs();
        outcome
    }

    /// Flag checked by the interrupt handler; setting it aborts the
    /// running script as `window.stop()` does
    pub fn halt_handle(&self) -> Arc<AtomicBool> {
        self.realm.halt.clone()
    }
}

impl Drop for ScriptHost {
    fn drop(&mut self) {
        let pending = self.realm.timers.borrow_mut().clear_all();
        if !pending.is_empty() {
            tracing::debug!("script host: dropping {} pending timers", pending.len());
        }
    }
}

/// Dispatch a fresh trusted event; returns whether it was consumed
fn fire(ctx: &Ctx<'_>, realm: &Realm, target: Target, event_type: &str, bubbles: bool) -> bool {
    let mut ev = Event::new(event_type, bubbles, false);
    ev.trusted = true;
    let id = realm.page.borrow_mut().events.insert(ev);
    let dispatcher = ScriptDispatch::new(ctx, realm, id);
    match target {
        Target::Node(node) => dispatcher.run(node),
        Target::Window => dispatcher.run_window(),
    }
}

/// Turn an engine error into a [`JsError`], taking the pending exception
/// and locating it in `source`
fn failure(ctx: &Ctx<'_>, realm: &Realm, err: rquickjs::Error, source: &str) -> JsError {
    if realm.halt.load(Ordering::SeqCst) {
        return JsError::Halted;
    }
    match err {
        rquickjs::Error::Exception => {
            let caught = bridge::caught(ctx);
            let excerpt = caught
                .stack
                .as_deref()
                .and_then(stack_position)
                .map(|(line, column)| excerpt(source, line, column))
                .unwrap_or_default();
            tracing::warn!("script error: {}", caught.message);
            JsError::Script {
                message: caught.message,
                excerpt,
            }
        }
        other => JsError::Engine(other),
    }
}
