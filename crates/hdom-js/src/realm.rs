//! Per-session script state
//!
//! A [`Realm`] is everything the native side of the bindings shares: the
//! page, the host classes, timers, listeners and the window collaborators.
//! Native functions capture an `Rc<Realm>`.
//!
//! Borrows of the `RefCell`s are never held across a call into script
//! code, since handlers re-enter the DOM.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use hdom_dom::{ElementId, FragmentId, ListenerTable, NodeId};
use rquickjs::{Ctx, Exception, Value};

use crate::bindings;
use crate::callbacks::Callbacks;
use crate::host::{HostOptions, Scheduler};
use crate::page::Page;
use crate::window::history::HistoryManager;
use crate::window::location::LocationManager;
use crate::window::storage::Storage;
use crate::window::timers::TimerManager;

/// A script function retained by native code, see `__hdom.retain`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JsHandle(pub u32);

/// Wrapper kinds, shared with `bootstrap.js`
pub(crate) mod kind {
    /// Tree nodes, documents included; the id is an `ElementId`
    pub const NODE: u32 = 1;
    pub const FRAGMENT: u32 = 2;
    pub const COLLECTION: u32 = 3;
    /// `element.attributes`; the id is the element's `ElementId`
    pub const ATTRIBUTES: u32 = 4;
    /// `element.style`; the id is the element's `ElementId`
    pub const STYLE: u32 = 5;
    pub const EVENT: u32 = 6;
}

pub(crate) type Getter = for<'js> fn(&Ctx<'js>, &Realm, u32) -> rquickjs::Result<Value<'js>>;
pub(crate) type Setter = for<'js> fn(&Ctx<'js>, &Realm, u32, Value<'js>) -> rquickjs::Result<()>;
pub(crate) type Method =
    for<'js> fn(&Ctx<'js>, &Realm, u32, &[Value<'js>]) -> rquickjs::Result<Value<'js>>;

/// Name-keyed access beyond the fixed getters: collection indices,
/// attribute names, style properties
pub(crate) struct Dynamic {
    pub get: for<'js> fn(&Ctx<'js>, &Realm, u32, &str) -> rquickjs::Result<Option<Value<'js>>>,
    /// Returns whether the write was taken
    pub set: Option<for<'js> fn(&Ctx<'js>, &Realm, u32, &str, Value<'js>) -> rquickjs::Result<bool>>,
    pub keys: fn(&Realm, u32) -> Vec<String>,
    pub delete: Option<fn(&Realm, u32, &str) -> bool>,
}

/// Property table of one wrapper kind
pub(crate) struct HostClass {
    getters: HashMap<&'static str, Getter>,
    setters: HashMap<&'static str, Setter>,
    methods: HashMap<&'static str, Method>,
    dynamic: Option<Dynamic>,
}

impl HostClass {
    pub fn new() -> Self {
        Self {
            getters: HashMap::new(),
            setters: HashMap::new(),
            methods: HashMap::new(),
            dynamic: None,
        }
    }

    pub fn getter(mut self, name: &'static str, getter: Getter) -> Self {
        self.getters.insert(name, getter);
        self
    }

    pub fn accessor(mut self, name: &'static str, getter: Getter, setter: Setter) -> Self {
        self.getters.insert(name, getter);
        self.setters.insert(name, setter);
        self
    }

    pub fn method(mut self, name: &'static str, method: Method) -> Self {
        self.methods.insert(name, method);
        self
    }

    pub fn dynamic(mut self, dynamic: Dynamic) -> Self {
        self.dynamic = Some(dynamic);
        self
    }

    pub fn get_getter(&self, name: &str) -> Option<Getter> {
        self.getters.get(name).copied()
    }

    pub fn get_setter(&self, name: &str) -> Option<Setter> {
        self.setters.get(name).copied()
    }

    pub fn get_method(&self, name: &str) -> Option<Method> {
        self.methods.get(name).copied()
    }

    pub fn get_dynamic(&self) -> Option<&Dynamic> {
        self.dynamic.as_ref()
    }

    pub fn has_getter(&self, name: &str) -> bool {
        self.getters.contains_key(name)
    }

    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.keys().map(|n| n.to_string()).collect();
        names.sort();
        names
    }
}

pub(crate) struct Classes {
    pub element: HostClass,
    pub document: HostClass,
    pub fragment: HostClass,
    pub collection: HostClass,
    pub attributes: HostClass,
    pub style: HostClass,
    pub event: HostClass,
}

impl Classes {
    fn new() -> Self {
        Self {
            element: bindings::element::class(),
            document: bindings::document::class(),
            fragment: bindings::fragment::class(),
            collection: bindings::collection::class(),
            attributes: bindings::attributes::class(),
            style: bindings::style::class(),
            event: bindings::event::class(),
        }
    }
}

/// The pending `requestAnimationFrame` callback
#[derive(Debug, Clone, Copy)]
pub(crate) struct AnimationFrame {
    pub id: u32,
    pub handle: JsHandle,
    pub due: Instant,
}

pub struct Realm {
    pub(crate) page: RefCell<Page>,
    pub(crate) classes: Classes,
    pub(crate) timers: RefCell<TimerManager>,
    pub(crate) frame: RefCell<Option<AnimationFrame>>,
    next_frame: Cell<u32>,
    pub(crate) listeners: RefCell<ListenerTable<JsHandle>>,
    /// `template.content`, created on first access
    pub(crate) templates: RefCell<HashMap<NodeId, FragmentId>>,
    pub(crate) callbacks: Callbacks,
    pub(crate) scheduler: Scheduler,
    pub(crate) location: RefCell<LocationManager>,
    pub(crate) history: RefCell<HistoryManager>,
    pub(crate) local_storage: RefCell<Storage>,
    pub(crate) session_storage: RefCell<Storage>,
    pub(crate) user_agent: String,
    pub(crate) started: Instant,
    /// Set by `window.stop()`, checked by the interrupt handler
    pub(crate) halt: Arc<AtomicBool>,
}

impl Realm {
    pub(crate) fn new(page: Page, options: &HostOptions, callbacks: Callbacks, scheduler: Scheduler) -> Self {
        let location = LocationManager::new(options.origin.clone());
        let history = HistoryManager::new(location.href());
        Self {
            page: RefCell::new(page),
            classes: Classes::new(),
            timers: RefCell::new(TimerManager::new()),
            frame: RefCell::new(None),
            next_frame: Cell::new(1),
            listeners: RefCell::new(ListenerTable::new()),
            templates: RefCell::new(HashMap::new()),
            callbacks,
            scheduler,
            location: RefCell::new(location),
            history: RefCell::new(history),
            local_storage: RefCell::new(Storage::default()),
            session_storage: RefCell::new(Storage::default()),
            user_agent: options.user_agent.clone(),
            started: Instant::now(),
            halt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Classes consulted for a wrapper, most specific first
    pub(crate) fn chain(&self, kind: u32, id: u32) -> Vec<&HostClass> {
        match kind {
            kind::NODE => {
                let is_document = self
                    .node(id)
                    .is_some_and(|n| self.page.borrow().tree.is_document(n));
                if is_document {
                    vec![&self.classes.document, &self.classes.element]
                } else {
                    vec![&self.classes.element]
                }
            }
            kind::FRAGMENT => vec![&self.classes.fragment],
            kind::COLLECTION => vec![&self.classes.collection],
            kind::ATTRIBUTES => vec![&self.classes.attributes],
            kind::STYLE => vec![&self.classes.style],
            kind::EVENT => vec![&self.classes.event],
            _ => Vec::new(),
        }
    }

    /// Method names installed on a prototype
    pub(crate) fn method_names(&self, kind: u32, document: bool) -> Vec<String> {
        match kind {
            kind::NODE if document => self.classes.document.method_names(),
            kind::NODE => self.classes.element.method_names(),
            kind::FRAGMENT => self.classes.fragment.method_names(),
            kind::COLLECTION => self.classes.collection.method_names(),
            kind::ATTRIBUTES => self.classes.attributes.method_names(),
            kind::STYLE => self.classes.style.method_names(),
            kind::EVENT => self.classes.event.method_names(),
            _ => Vec::new(),
        }
    }

    /// Node behind a `NODE`, `ATTRIBUTES` or `STYLE` wrapper id
    pub(crate) fn node(&self, id: u32) -> Option<NodeId> {
        self.page.borrow().registry.node(ElementId(id))
    }

    /// Like [`Realm::node`], throwing for ids that do not resolve
    pub(crate) fn expect_node(&self, ctx: &Ctx<'_>, id: u32) -> rquickjs::Result<NodeId> {
        self.node(id)
            .ok_or_else(|| Exception::throw_reference(ctx, &format!("unknown node {id}")))
    }

    pub(crate) fn next_frame_id(&self) -> u32 {
        let id = self.next_frame.get();
        self.next_frame.set(id + 1);
        id
    }

    /// Milliseconds since the realm was created, for `performance.now`
    pub(crate) fn now_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }
}
