//! Event dispatch against script handlers
//!
//! [`ScriptDispatch`] plugs the realm into the engine-independent dispatch
//! algorithm of `hdom_dom`. Handlers are found in three places: functions
//! stored as `on<type>` properties of a wrapper, `addEventListener`
//! listeners, and `on<type>` attributes compiled on the fly.

use hdom_dom::{DispatchHost, Event, EventId, HandlerOutcome, NodeId, Target};
use rquickjs::{Ctx, Object, Value};

use crate::bridge;
use crate::realm::{kind, Realm};

pub(crate) struct ScriptDispatch<'a, 'js> {
    ctx: &'a Ctx<'js>,
    realm: &'a Realm,
    /// The event being dispatched, passed to inline handlers as `event`
    event: EventId,
}

impl<'a, 'js> ScriptDispatch<'a, 'js> {
    pub fn new(ctx: &'a Ctx<'js>, realm: &'a Realm, event: EventId) -> Self {
        Self { ctx, realm, event }
    }

    /// Dispatch at a node; returns whether some handler consumed the event
    pub fn run(&self, node: NodeId) -> bool {
        hdom_dom::dispatch(self, node, self.event)
    }

    pub fn run_window(&self) -> bool {
        hdom_dom::dispatch_window(self, self.event)
    }

    /// Object holding the property handlers of `target`, if script code
    /// ever saw it
    fn holder(&self, target: Target) -> Option<Object<'js>> {
        match target {
            Target::Window => Some(self.ctx.globals()),
            Target::Node(node) => {
                let id = self.realm.page.borrow().registry.lookup(node)?;
                bridge::peek(self.ctx, kind::NODE, id.0).ok().flatten()
            }
        }
    }

    /// A handler returning `false` cancels the event
    fn outcome(&self, event: EventId, result: rquickjs::Result<Value<'js>>) -> HandlerOutcome {
        match result {
            Ok(v) => {
                if v.as_bool() == Some(false) {
                    self.with_event(event, Event::prevent_default);
                }
                HandlerOutcome::Ran
            }
            Err(err) => HandlerOutcome::Failed(bridge::describe(self.ctx, err)),
        }
    }

    fn inline(&self, node: NodeId, source: &str, event: EventId) -> HandlerOutcome {
        let result = bridge::wrap_node(self.ctx, self.realm, node).and_then(|this| {
            let ev = bridge::wrap_event(self.ctx, self.realm, event)?;
            bridge::run_inline(self.ctx, source, this, ev)
        });
        self.outcome(event, result)
    }
}

impl DispatchHost for ScriptDispatch<'_, '_> {
    fn with_event<R>(&self, event: EventId, f: impl FnOnce(&mut Event) -> R) -> Option<R> {
        self.realm.page.borrow_mut().events.get_mut(event).map(f)
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        self.realm.page.borrow().tree.tag_name(node).map(str::to_string)
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<String> {
        self.realm.page.borrow().tree.attr(node, name).map(str::to_string)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.realm.page.borrow().tree.parent(node)
    }

    fn is_document(&self, node: NodeId) -> bool {
        self.realm.page.borrow().tree.is_document(node)
    }

    fn in_fragment(&self, node: NodeId) -> bool {
        self.realm.page.borrow().fragment_of(node).is_some()
    }

    fn owner_document(&self, node: NodeId) -> NodeId {
        self.realm.page.borrow().owner_document(node)
    }

    fn is_main_document(&self, doc: NodeId) -> bool {
        doc == NodeId::ROOT
    }

    fn set_attr(&self, node: NodeId, name: &str, value: &str) {
        if let Err(err) = self.realm.page.borrow_mut().set_attribute(node, name, value) {
            tracing::warn!("default action: {}", err);
        }
    }

    fn remove_attr(&self, node: NodeId, name: &str) {
        self.realm.page.borrow_mut().remove_attribute(node, name);
    }

    fn run_inline(&self, node: NodeId, source: &str) -> HandlerOutcome {
        self.inline(node, source, self.event)
    }

    fn call_property_handler(&self, target: Target, name: &str, event: EventId) -> HandlerOutcome {
        if let Some(holder) = self.holder(target) {
            let handler: Option<Value> = holder.get(name).ok();
            if let Some(f) = handler.as_ref().and_then(|h| h.as_function()) {
                let result = bridge::wrap_event(self.ctx, self.realm, event)
                    .and_then(|ev| f.call::<_, Value>((rquickjs::function::This(holder.clone()), ev)));
                return self.outcome(event, result);
            }
        }

        // `onclick` attributes already ran as part of the click default action
        if name == "onclick" {
            return HandlerOutcome::Missing;
        }
        let node = match target {
            Target::Node(node) => Some(node),
            // `<body onload>` handles the window's load
            Target::Window if name == "onload" => self.realm.page.borrow().tree.body(NodeId::ROOT),
            Target::Window => None,
        };
        let source = node.and_then(|n| self.attr(n, name).map(|s| (n, s)));
        match source {
            Some((node, source)) => self.inline(node, &source, event),
            None => HandlerOutcome::Missing,
        }
    }

    fn call_listeners(&self, target: Target, event_type: &str, event: EventId) -> Vec<HandlerOutcome> {
        let handles = self.realm.listeners.borrow().listeners(target, event_type);
        if handles.is_empty() {
            return Vec::new();
        }
        let this = match bridge::wrap_target(self.ctx, self.realm, Some(target)) {
            Ok(this) => this,
            Err(err) => return vec![HandlerOutcome::Failed(bridge::describe(self.ctx, err))],
        };
        handles
            .into_iter()
            .map(|handle| {
                let result = bridge::wrap_event(self.ctx, self.realm, event)
                    .and_then(|ev| bridge::invoke(self.ctx, handle, this.clone(), vec![ev]));
                self.outcome(event, result)
            })
            .collect()
    }
}
