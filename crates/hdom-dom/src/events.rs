//! Events and the dispatch algorithm
//!
//! Events live in an [`EventArena`] so script wrappers can refer to them
//! by index across several dispatches. Dispatch is written against the
//! [`DispatchHost`] trait; the script host supplies handler invocation,
//! tests supply a recording host.
//!
//! Propagation flags are latches: `cancel_bubble` and `propagation_stopped`
//! are checked and cleared when dispatch reaches the *next* node, which
//! then reports the event as finished.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::{DomError, NodeId};

/// Something events are dispatched at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// An element, text node or document root
    Node(NodeId),
    Window,
}

/// Index of an event in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(pub u32);

/// Event state shared by `Event`, `MouseEvent` and `CustomEvent`
#[derive(Debug, Clone, Default)]
pub struct Event {
    pub event_type: String,
    pub bubbles: bool,
    pub cancelable: bool,
    pub default_prevented: bool,
    pub cancel_bubble: bool,
    pub propagation_stopped: bool,
    /// Some handler or default action ran for this event
    pub consumed: bool,
    pub trusted: bool,
    /// Created as a `MouseEvent`
    pub mouse: bool,
    pub target: Option<Target>,
    pub current_target: Option<Target>,
    pub src_element: Option<Target>,
    /// Milliseconds since the epoch at creation
    pub time_stamp: f64,
}

impl Event {
    pub fn new(event_type: &str, bubbles: bool, cancelable: bool) -> Self {
        let time_stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or_default();
        Self {
            event_type: event_type.to_string(),
            bubbles,
            cancelable,
            time_stamp,
            ..Self::default()
        }
    }

    /// A mouse event of the given type
    pub fn mouse(event_type: &str, bubbles: bool, cancelable: bool) -> Self {
        Self {
            mouse: true,
            ..Self::new(event_type, bubbles, cancelable)
        }
    }

    /// `initEvent`: reinitialize an event that has not been consumed yet.
    /// Clears `default_prevented` and `propagation_stopped`.
    pub fn init(&mut self, event_type: &str, bubbles: bool, cancelable: bool) -> Result<(), DomError> {
        if self.consumed {
            return Err(DomError::EventConsumed);
        }
        self.event_type = event_type.to_ascii_lowercase();
        self.bubbles = bubbles;
        self.cancelable = cancelable;
        self.default_prevented = false;
        self.propagation_stopped = false;
        Ok(())
    }

    pub fn prevent_default(&mut self) {
        if self.cancelable {
            self.default_prevented = true;
        }
    }

    /// `stopPropagation` and `stopImmediatePropagation` behave the same
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn return_value(&self) -> bool {
        !self.default_prevented
    }

    pub fn set_return_value(&mut self, value: bool) {
        if !value {
            self.prevent_default();
        }
    }
}

/// Events created during a session. Scripts may keep references to any
/// event, so entries are never freed.
#[derive(Debug, Default)]
pub struct EventArena {
    events: Vec<Event>,
}

impl EventArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, event: Event) -> EventId {
        let id = EventId(self.events.len() as u32);
        self.events.push(event);
        id
    }

    pub fn get(&self, id: EventId) -> Option<&Event> {
        self.events.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: EventId) -> Option<&mut Event> {
        self.events.get_mut(id.0 as usize)
    }
}

/// Result of invoking one handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// No handler was registered
    Missing,
    Ran,
    /// The handler threw; the message is logged
    Failed(String),
}

impl HandlerOutcome {
    /// Ran or threw, either way the event counts as handled
    pub fn consumed(&self) -> bool {
        !matches!(self, HandlerOutcome::Missing)
    }
}

/// What dispatch needs from its environment.
///
/// Implementations must not hold borrows of shared state while calling into
/// script code: handlers may re-enter the DOM.
pub trait DispatchHost {
    fn with_event<R>(&self, event: EventId, f: impl FnOnce(&mut Event) -> R) -> Option<R>;

    fn tag_name(&self, node: NodeId) -> Option<String>;
    fn attr(&self, node: NodeId, name: &str) -> Option<String>;
    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn is_document(&self, node: NodeId) -> bool;
    fn in_fragment(&self, node: NodeId) -> bool;
    /// Document a detached node reports to
    fn owner_document(&self, node: NodeId) -> NodeId;
    /// Only the main document forwards events to the window
    fn is_main_document(&self, doc: NodeId) -> bool;

    /// Attribute writes done by default actions, recorded as mutations
    fn set_attr(&self, node: NodeId, name: &str, value: &str);
    fn remove_attr(&self, node: NodeId, name: &str);

    /// Evaluate an inline handler such as an `onclick` attribute
    fn run_inline(&self, node: NodeId, source: &str) -> HandlerOutcome;
    /// Call the function stored under `name` (e.g. `onclick`) on `target`
    fn call_property_handler(&self, target: Target, name: &str, event: EventId) -> HandlerOutcome;
    /// Call the `addEventListener` listeners in registration order
    fn call_listeners(&self, target: Target, event_type: &str, event: EventId) -> Vec<HandlerOutcome>;
}

/// Dispatch `event` at `node` and bubble it. Returns whether the event was
/// consumed.
pub fn dispatch<H: DispatchHost>(host: &H, node: NodeId, event: EventId) -> bool {
    if host.is_document(node) {
        return dispatch_document(host, node, event);
    }

    let target = Target::Node(node);
    let Some(event_type) = host.with_event(event, |e| {
        if e.target.is_none() {
            e.target = Some(target);
        }
        e.current_target = Some(target);
        e.src_element = Some(target);
        e.event_type.clone()
    }) else {
        return false;
    };
    if take_latch(host, event) {
        return true;
    }

    let prevented = host.with_event(event, |e| e.default_prevented).unwrap_or(false);
    if event_type == "click" && !prevented {
        default_click_action(host, node, event);
    }

    run_handlers(host, target, &event_type, event);

    if host.with_event(event, |e| e.bubbles).unwrap_or(false) {
        match host.parent(node) {
            Some(p) if host.is_document(p) => {
                dispatch_document(host, p, event);
            }
            Some(p) => {
                dispatch(host, p, event);
            }
            None if !host.in_fragment(node) => {
                dispatch_document(host, host.owner_document(node), event);
            }
            None => {}
        }
    }

    host.with_event(event, |e| e.consumed).unwrap_or(false)
}

/// The document is the last node of the propagation path: it honors the
/// latches like an ancestor element, then hands bubbling events to the
/// window.
fn dispatch_document<H: DispatchHost>(host: &H, doc: NodeId, event: EventId) -> bool {
    let target = Target::Node(doc);
    let Some(event_type) = host.with_event(event, |e| {
        if e.target.is_none() {
            e.target = Some(target);
        }
        e.current_target = Some(target);
        e.event_type.clone()
    }) else {
        return false;
    };
    if take_latch(host, event) {
        return true;
    }

    run_handlers(host, target, &event_type, event);

    let bubbles = host.with_event(event, |e| e.bubbles).unwrap_or(false);
    if bubbles && host.is_main_document(doc) {
        return dispatch_window(host, event);
    }
    host.with_event(event, |e| e.consumed).unwrap_or(false)
}

/// Dispatch at the window: property handler then listeners, no bubbling
pub fn dispatch_window<H: DispatchHost>(host: &H, event: EventId) -> bool {
    let Some(event_type) = host.with_event(event, |e| {
        if e.target.is_none() {
            e.target = Some(Target::Window);
        }
        e.current_target = Some(Target::Window);
        e.event_type.clone()
    }) else {
        return false;
    };
    if take_latch(host, event) {
        return true;
    }
    run_handlers(host, Target::Window, &event_type, event);
    host.with_event(event, |e| e.consumed).unwrap_or(false)
}

/// Check and clear the propagation latches
fn take_latch<H: DispatchHost>(host: &H, event: EventId) -> bool {
    host.with_event(event, |e| {
        if e.cancel_bubble {
            e.cancel_bubble = false;
            true
        } else if e.propagation_stopped {
            e.propagation_stopped = false;
            true
        } else {
            false
        }
    })
    .unwrap_or(false)
}

fn mark_consumed<H: DispatchHost>(host: &H, event: EventId, outcome: &HandlerOutcome) {
    if let HandlerOutcome::Failed(msg) = outcome {
        tracing::warn!("event handler failed: {}", msg);
    }
    if outcome.consumed() {
        host.with_event(event, |e| e.consumed = true);
    }
}

fn run_handlers<H: DispatchHost>(host: &H, target: Target, event_type: &str, event: EventId) {
    let outcome = host.call_property_handler(target, &format!("on{event_type}"), event);
    mark_consumed(host, event, &outcome);
    for outcome in host.call_listeners(target, event_type, event) {
        mark_consumed(host, event, &outcome);
    }
}

fn default_click_action<H: DispatchHost>(host: &H, node: NodeId, event: EventId) {
    match host.tag_name(node).as_deref() {
        Some("button") => {
            let mut form = host.parent(node);
            while let Some(f) = form {
                if host.tag_name(f).as_deref() == Some("form") {
                    break;
                }
                form = host.parent(f);
            }
            if let Some(f) = form {
                let outcome = host.call_property_handler(Target::Node(f), "onsubmit", event);
                mark_consumed(host, event, &outcome);
            }
        }
        Some("input") => {
            let mouse = host.with_event(event, |e| e.mouse).unwrap_or(false);
            if mouse {
                match host.attr(node, "type").map(|t| t.to_ascii_lowercase()).as_deref() {
                    Some("checkbox") => {
                        if host.attr(node, "checked").is_some() {
                            host.remove_attr(node, "checked");
                        } else {
                            host.set_attr(node, "checked", "true");
                        }
                    }
                    Some("radio") => host.set_attr(node, "checked", "true"),
                    _ => {}
                }
            }
        }
        _ => {}
    }

    if let Some(source) = host.attr(node, "onclick") {
        let outcome = host.run_inline(node, &source);
        mark_consumed(host, event, &outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DomTree, ListenerTable};
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Records every handler call as "label@current"
    struct Recorder {
        tree: RefCell<DomTree>,
        events: RefCell<EventArena>,
        listeners: RefCell<ListenerTable<&'static str>>,
        properties: HashMap<(Target, String), &'static str>,
        log: RefCell<Vec<String>>,
        stop_in: Option<&'static str>,
    }

    impl Recorder {
        fn new(tree: DomTree) -> Self {
            Self {
                tree: RefCell::new(tree),
                events: RefCell::new(EventArena::new()),
                listeners: RefCell::new(ListenerTable::new()),
                properties: HashMap::new(),
                log: RefCell::new(Vec::new()),
                stop_in: None,
            }
        }

        fn label(t: Target) -> String {
            match t {
                Target::Node(n) => format!("{}", n.as_u32()),
                Target::Window => "window".to_string(),
            }
        }

        fn record(&self, name: &str, event: EventId) {
            let (target, current) = self
                .with_event(event, |e| (e.target, e.current_target))
                .unwrap_or_default();
            self.log.borrow_mut().push(format!(
                "{}:{}>{}",
                name,
                target.map(Self::label).unwrap_or_default(),
                current.map(Self::label).unwrap_or_default()
            ));
            if self.stop_in == Some(name) {
                self.with_event(event, |e| e.stop_propagation());
            }
        }
    }

    impl DispatchHost for Recorder {
        fn with_event<R>(&self, event: EventId, f: impl FnOnce(&mut Event) -> R) -> Option<R> {
            self.events.borrow_mut().get_mut(event).map(f)
        }
        fn tag_name(&self, node: NodeId) -> Option<String> {
            self.tree.borrow().tag_name(node).map(str::to_string)
        }
        fn attr(&self, node: NodeId, name: &str) -> Option<String> {
            self.tree.borrow().attr(node, name).map(str::to_string)
        }
        fn parent(&self, node: NodeId) -> Option<NodeId> {
            self.tree.borrow().parent(node)
        }
        fn is_document(&self, node: NodeId) -> bool {
            self.tree.borrow().is_document(node)
        }
        fn in_fragment(&self, _node: NodeId) -> bool {
            false
        }
        fn owner_document(&self, _node: NodeId) -> NodeId {
            NodeId::ROOT
        }
        fn is_main_document(&self, doc: NodeId) -> bool {
            doc == NodeId::ROOT
        }
        fn set_attr(&self, node: NodeId, name: &str, value: &str) {
            self.tree.borrow_mut().set_attr(node, name, value);
        }
        fn remove_attr(&self, node: NodeId, name: &str) {
            self.tree.borrow_mut().remove_attr(node, name);
        }
        fn run_inline(&self, _node: NodeId, source: &str) -> HandlerOutcome {
            self.log.borrow_mut().push(format!("inline:{source}"));
            HandlerOutcome::Ran
        }
        fn call_property_handler(&self, target: Target, name: &str, event: EventId) -> HandlerOutcome {
            match self.properties.get(&(target, name.to_string())) {
                Some(label) => {
                    self.record(label, event);
                    HandlerOutcome::Ran
                }
                None => HandlerOutcome::Missing,
            }
        }
        fn call_listeners(&self, target: Target, event_type: &str, event: EventId) -> Vec<HandlerOutcome> {
            let list = self.listeners.borrow().listeners(target, event_type);
            list.into_iter()
                .map(|label| {
                    self.record(label, event);
                    HandlerOutcome::Ran
                })
                .collect()
        }
    }

    /// document > html > body#b > p
    fn page() -> (DomTree, NodeId, NodeId) {
        let mut tree = DomTree::new();
        let html = tree.create_element("html");
        let body = tree.create_element("body");
        let p = tree.create_element("p");
        tree.append_child(NodeId::ROOT, html).unwrap();
        tree.append_child(html, body).unwrap();
        tree.append_child(body, p).unwrap();
        tree.set_attr(body, "id", "b");
        (tree, body, p)
    }

    #[test]
    fn test_bubbling_order() {
        let (tree, body, p) = page();
        let host = Recorder::new(tree);
        {
            let mut l = host.listeners.borrow_mut();
            l.add(Target::Node(p), "click", "p");
            l.add(Target::Node(body), "click", "b");
            l.add(Target::Node(NodeId::ROOT), "click", "doc");
            l.add(Target::Window, "click", "win");
        }
        let ev = host.events.borrow_mut().insert(Event::new("click", true, false));

        assert!(dispatch(&host, p, ev));
        let p_id = p.as_u32();
        assert_eq!(
            *host.log.borrow(),
            vec![
                format!("p:{p_id}>{p_id}"),
                format!("b:{p_id}>{}", body.as_u32()),
                format!("doc:{p_id}>0"),
                format!("win:{p_id}>window"),
            ]
        );
    }

    #[test]
    fn test_non_bubbling_stays_at_target() {
        let (tree, body, p) = page();
        let host = Recorder::new(tree);
        host.listeners.borrow_mut().add(Target::Node(body), "focus", "b");
        let ev = host.events.borrow_mut().insert(Event::new("focus", false, false));

        assert!(!dispatch(&host, p, ev));
        assert!(host.log.borrow().is_empty());
    }

    #[test]
    fn test_stop_propagation_latch() {
        let (tree, body, p) = page();
        let mut host = Recorder::new(tree);
        host.stop_in = Some("p");
        {
            let mut l = host.listeners.borrow_mut();
            l.add(Target::Node(p), "click", "p");
            l.add(Target::Node(body), "click", "b");
        }
        let ev = host.events.borrow_mut().insert(Event::new("click", true, false));

        assert!(dispatch(&host, p, ev));
        assert_eq!(host.log.borrow().len(), 1);
        // the latch was consumed by the parent check
        assert!(!host.events.borrow().get(ev).unwrap().propagation_stopped);
    }

    #[test]
    fn test_button_submits_enclosing_form() {
        let mut tree = DomTree::new();
        let form = tree.create_element("form");
        let div = tree.create_element("div");
        let button = tree.create_element("button");
        tree.append_child(NodeId::ROOT, form).unwrap();
        tree.append_child(form, div).unwrap();
        tree.append_child(div, button).unwrap();
        let mut host = Recorder::new(tree);
        host.properties
            .insert((Target::Node(form), "onsubmit".to_string()), "submit");
        let ev = host.events.borrow_mut().insert(Event::new("click", false, false));

        assert!(dispatch(&host, button, ev));
        assert_eq!(host.log.borrow().len(), 1);
        assert!(host.log.borrow()[0].starts_with("submit:"));
    }

    #[test]
    fn test_checkbox_toggles_only_for_mouse_events() {
        let (mut tree, body, _) = page();
        let input = tree.create_element("input");
        tree.set_attr(input, "type", "checkbox");
        tree.append_child(body, input).unwrap();
        let host = Recorder::new(tree);

        let plain = host.events.borrow_mut().insert(Event::new("click", false, false));
        dispatch(&host, input, plain);
        assert!(host.tree.borrow().attr(input, "checked").is_none());

        let mouse = host.events.borrow_mut().insert(Event::mouse("click", false, false));
        dispatch(&host, input, mouse);
        assert_eq!(host.tree.borrow().attr(input, "checked"), Some("true"));

        let again = host.events.borrow_mut().insert(Event::mouse("click", false, false));
        dispatch(&host, input, again);
        assert!(host.tree.borrow().attr(input, "checked").is_none());
    }

    #[test]
    fn test_onclick_attribute_and_prevent_default() {
        let (mut tree, _, p) = page();
        tree.set_attr(p, "onclick", "go()");
        let host = Recorder::new(tree);

        let ev = host.events.borrow_mut().insert(Event::new("click", false, true));
        host.with_event(ev, |e| e.prevent_default());
        assert!(!dispatch(&host, p, ev));

        let ev = host.events.borrow_mut().insert(Event::new("click", false, true));
        assert!(dispatch(&host, p, ev));
        assert_eq!(*host.log.borrow(), vec!["inline:go()".to_string()]);
    }

    #[test]
    fn test_event_flags() {
        let mut e = Event::new("x", true, false);
        e.prevent_default();
        assert!(!e.default_prevented);
        assert!(e.return_value());

        e.init("CLICK", true, true).unwrap();
        assert_eq!(e.event_type, "click");
        e.set_return_value(false);
        assert!(e.default_prevented);

        e.consumed = true;
        assert!(e.init("click", true, true).is_err());
    }

    #[test]
    fn test_init_clears_prevented_and_stopped() {
        let mut e = Event::new("click", true, true);
        e.prevent_default();
        e.stop_propagation();
        e.init("click", true, true).unwrap();
        assert!(!e.default_prevented);
        assert!(!e.propagation_stopped);
    }

    #[test]
    fn test_reinitialized_event_dispatches_again() {
        let (tree, body, p) = page();
        let mut host = Recorder::new(tree);
        host.stop_in = Some("p");
        {
            let mut l = host.listeners.borrow_mut();
            l.add(Target::Node(p), "ping", "p");
            l.add(Target::Node(body), "ping", "b");
        }
        let ev = host.events.borrow_mut().insert(Event::new("ping", true, true));
        host.with_event(ev, |e| {
            e.prevent_default();
            e.stop_propagation();
        });
        // the p listener runs, then stops propagation itself
        assert!(host.with_event(ev, |e| e.init("ping", true, true)).unwrap().is_ok());
        assert!(dispatch(&host, p, ev));
        assert_eq!(host.log.borrow().len(), 1);
        assert!(!host.events.borrow().get(ev).unwrap().default_prevented);
    }

    #[test]
    fn test_stop_at_body_never_reaches_document() {
        let (tree, body, p) = page();
        let mut host = Recorder::new(tree);
        host.stop_in = Some("b");
        {
            let mut l = host.listeners.borrow_mut();
            l.add(Target::Node(p), "click", "p");
            l.add(Target::Node(body), "click", "b");
            l.add(Target::Node(NodeId::ROOT), "click", "doc");
            l.add(Target::Window, "click", "win");
        }
        let ev = host.events.borrow_mut().insert(Event::new("click", true, false));

        assert!(dispatch(&host, p, ev));
        let log = host.log.borrow();
        assert_eq!(log.len(), 2);
        assert!(log[1].starts_with("b:"));
    }
}
