//! Script host tests for hdom-js
//!
//! Each test builds a [`ScriptHost`] over a small page and drives it the
//! way the session worker does: evaluate scripts, fire the load sequence,
//! click, run timers and deliver XHR completions.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hdom_dom::{queue, MutationKind, MutationReceiver};
use hdom_js::{Callbacks, HostOptions, JsError, Scheduler, ScriptHost, Task, XhrResponse};
use url::Url;

fn options() -> HostOptions {
    HostOptions::new(Url::parse("https://example.com/app/index.html").unwrap())
}

fn idle_scheduler() -> Scheduler {
    Arc::new(|_task: Task| {})
}

fn host_with(html: &str, options: HostOptions, callbacks: Callbacks, scheduler: Scheduler) -> (ScriptHost, MutationReceiver) {
    let (tx, rx) = queue(1000);
    let host = ScriptHost::new(html, options, callbacks, tx, scheduler).unwrap();
    rx.drain();
    (host, rx)
}

fn host(html: &str) -> (ScriptHost, MutationReceiver) {
    host_with(html, options(), Callbacks::default(), idle_scheduler())
}

/// A host whose scheduler hands tasks back to the test
fn host_with_xhr(html: &str, body: &'static str) -> (ScriptHost, mpsc::Receiver<Task>) {
    let (task_tx, task_rx) = mpsc::channel::<Task>();
    let scheduler: Scheduler = Arc::new(move |task: Task| {
        let _ = task_tx.send(task);
    });
    let callbacks = Callbacks {
        xhr: Some(Arc::new(move |_req| Ok(XhrResponse::ok(body)))),
        ..Callbacks::default()
    };
    let (host, _rx) = host_with(html, options(), callbacks, scheduler);
    (host, task_rx)
}

fn run_next_task(host: &mut ScriptHost, tasks: &mpsc::Receiver<Task>) {
    let task = tasks.recv_timeout(Duration::from_secs(5)).unwrap();
    task(host);
}

const DEMO: &str = r#"<html><head></head><body id="b"><p id="demo">x</p><div id="d" class="box">text</div></body></html>"#;

// ============================================================================
// EVALUATION
// ============================================================================

#[test]
fn test_eval_result() {
    let (mut host, _rx) = host(DEMO);
    assert_eq!(host.eval("1 + 2").unwrap(), "3");
    assert_eq!(host.eval("var x = 1").unwrap(), "");
    assert_eq!(host.eval("typeof document").unwrap(), "object");
}

#[test]
fn test_script_error_has_excerpt() {
    let (mut host, _rx) = host(DEMO);
    match host.eval("var a = 1;\nnope();\nvar b = 2;") {
        Err(JsError::Script { message, excerpt }) => {
            assert!(message.contains("nope"), "{message}");
            assert!(excerpt.contains("nope();"), "{excerpt}");
        }
        other => panic!("expected script error, got {other:?}"),
    }
    // the host stays usable
    assert_eq!(host.eval("'ok'").unwrap(), "ok");
}

#[test]
fn test_window_stop_halts() {
    let (mut host, _rx) = host(DEMO);
    let err = host.eval("window.stop(); document.title = 'late'").unwrap_err();
    assert!(err.is_halted());
    assert_eq!(host.eval("document.title").unwrap(), "");
}

#[test]
fn test_deadline() {
    let mut opts = options();
    opts.script_timeout = Some(Duration::from_millis(200));
    let (mut host, _rx) = host_with(DEMO, opts, Callbacks::default(), idle_scheduler());
    assert!(matches!(host.eval("while (true) {}"), Err(JsError::Deadline)));
    assert_eq!(host.eval("2 * 21").unwrap(), "42");
}

// ============================================================================
// DOCUMENT AND MUTATIONS
// ============================================================================

#[test]
fn test_inner_html_end_to_end() {
    let (mut host, rx) = host(DEMO);
    host.eval("document.getElementById('demo').innerHTML = 'y'").unwrap();

    let m = rx.try_pop().unwrap();
    assert_eq!(m.kind, MutationKind::Value);
    assert_eq!(m.tag.as_deref(), Some("p"));
    assert_eq!(m.inner_html.as_deref(), Some("y"));
    assert!(rx.try_pop().is_none());

    assert!(host.render().contains(r#"<p id="demo">y</p>"#));
}

#[test]
fn test_wrapper_identity() {
    let (mut host, _rx) = host(DEMO);
    let same = host
        .eval("document.getElementById('demo') === document.body.firstChild")
        .unwrap();
    assert_eq!(same, "true");
    let kind = host
        .eval("document.body instanceof HTMLElement && document instanceof Document")
        .unwrap();
    assert_eq!(kind, "true");
}

#[test]
fn test_live_collection() {
    let (mut host, _rx) = host(DEMO);
    let counts = host
        .eval(
            "var c = document.body.children; var before = c.length; \
             document.body.appendChild(document.createElement('span')); \
             before + ',' + c.length + ',' + c[2].tagName",
        )
        .unwrap();
    assert_eq!(counts, "2,3,SPAN");
}

#[test]
fn test_selector_errors_are_syntax_errors() {
    let (mut host, _rx) = host(DEMO);
    let name = host
        .eval("try { document.querySelector('a[b^=c]'); 'none' } catch (e) { e.name }")
        .unwrap();
    assert_eq!(name, "SyntaxError");
    let found = host.eval("document.querySelectorAll('#b > *').length").unwrap();
    assert_eq!(found, "2");
}

#[test]
fn test_style_and_class_helpers() {
    let (mut host, _rx) = host(DEMO);
    let style = host
        .eval(
            "var d = document.getElementById('d'); d.style.backgroundColor = 'red'; \
             d.style.backgroundColor + '|' + d.style.color + '|' + typeof d.style.nonsense",
        )
        .unwrap();
    assert_eq!(style, "red||undefined");

    let classes = host
        .eval("d.classList.add('x', 'y'); d.classList.remove('box', 'x'); d.className")
        .unwrap();
    assert_eq!(classes, "y");

    let data = host
        .eval("d.dataset.fooBar = '1'; d.getAttribute('data-foo-bar') + d.dataset.fooBar")
        .unwrap();
    assert_eq!(data, "11");
}

#[test]
fn test_put_attr() {
    let (mut host, rx) = host(DEMO);
    assert!(host.put_attr("#d", "title", "hello").unwrap());
    assert_eq!(rx.try_pop().map(|m| m.kind), Some(MutationKind::ChangeAttr));
    assert!(!host.put_attr("#missing", "title", "x").unwrap());
    assert_eq!(host.eval("document.getElementById('d').title || document.getElementById('d').getAttribute('title')").unwrap(), "hello");
}

#[test]
fn test_fragment_member_parent_is_fragment() {
    let (mut host, _rx) = host(DEMO);
    let before = host
        .eval(
            "var f = document.createDocumentFragment(); var d = document.createElement('div'); \
             f.appendChild(d); (d.parentNode === f) + ',' + (d.getRootNode() === f) + ',' + d.parentElement",
        )
        .unwrap();
    assert_eq!(before, "true,true,null");

    let after = host
        .eval("document.body.appendChild(f); (d.parentNode === document.body) + ',' + f.childNodes.length")
        .unwrap();
    assert_eq!(after, "true,0");
    assert_eq!(host.eval("document.createElement('p').parentNode").unwrap(), "null");
}

#[test]
fn test_outer_html_with_several_nodes_is_rejected() {
    let (mut host, rx) = host(DEMO);
    let still = host
        .eval("document.getElementById('demo').outerHTML = '<b>1</b><b>2</b>'; !!document.getElementById('demo')")
        .unwrap();
    assert_eq!(still, "true");
    assert!(rx.try_pop().is_none());
    assert!(host.render().contains(r#"<p id="demo">x</p>"#));

    host.eval("document.getElementById('demo').outerHTML = '<em id=\"e\">y</em>'").unwrap();
    assert_eq!(rx.try_pop().map(|m| m.kind), Some(MutationKind::Value));
    assert!(host.render().contains(r#"<em id="e">y</em>"#));
}

#[test]
fn test_move_versus_insert() {
    let (mut host, rx) = host(DEMO);
    host.eval("var s = document.createElement('span'); document.body.appendChild(s);").unwrap();
    let m = rx.try_pop().unwrap();
    assert_eq!((m.kind, m.tag.as_deref(), m.connected), (MutationKind::Insert, Some("span"), true));

    host.eval("document.getElementById('d').appendChild(s);").unwrap();
    let m = rx.try_pop().unwrap();
    assert_eq!((m.kind, m.tag.as_deref()), (MutationKind::Move, Some("span")));
    assert!(rx.try_pop().is_none());

    // an existing page node moved with insertBefore is a move too
    host.eval("document.body.insertBefore(document.getElementById('d'), document.getElementById('demo'));")
        .unwrap();
    assert_eq!(rx.try_pop().map(|m| m.kind), Some(MutationKind::Move));
}

// ============================================================================
// EVENTS
// ============================================================================

#[test]
fn test_bubbling_order() {
    let (mut host, _rx) = host(r#"<html><body id="b"><p id="p">hi</p></body></html>"#);
    let log = host
        .eval(
            "var log = []; var p = document.getElementById('p'); \
             p.addEventListener('click', function (e) { log.push('p:' + e.target.id + ':' + e.currentTarget.id); }); \
             document.body.addEventListener('click', function (e) { log.push('b:' + e.target.id + ':' + e.currentTarget.id); }); \
             document.addEventListener('click', function (e) { log.push('d:' + e.target.id); }); \
             p.dispatchEvent(new Event('click', { bubbles: true })); \
             log.join(',')",
        )
        .unwrap();
    assert_eq!(log, "p:p:p,b:p:b,d:p");
}

#[test]
fn test_close_document_sequence() {
    let (mut host, _rx) = host(
        r#"<html><head></head><body onload="document.title = 'loaded'"><p>x</p></body></html>"#,
    );
    host.eval(
        "var order = []; \
         document.addEventListener('readystatechange', function () { order.push(document.readyState); }); \
         document.addEventListener('DOMContentLoaded', function () { order.push('dcl'); }); \
         window.addEventListener('load', function () { order.push('load'); });",
    )
    .unwrap();
    host.close_document().unwrap();
    assert_eq!(host.eval("order.join(',')").unwrap(), "interactive,dcl,complete,load");
    assert_eq!(host.eval("document.title").unwrap(), "loaded");
}

#[test]
fn test_click_submit_is_consumed() {
    let (mut host, _rx) = host(
        r#"<html><body><form onsubmit="return false"><button id="go">Go</button></form><div id="plain">x</div></body></html>"#,
    );
    assert_eq!(host.click("#go").unwrap(), Some(true));
    assert_eq!(host.click("#plain").unwrap(), Some(false));
    assert_eq!(host.click("#missing").unwrap(), None);
}

#[test]
fn test_click_runs_inline_handler() {
    let (mut host, _rx) = host(
        r#"<html><body><a id="l" onclick="this.textContent = 'clicked'">go</a></body></html>"#,
    );
    assert_eq!(host.click("#l").unwrap(), Some(true));
    assert!(host.render().contains(">clicked</a>"));
}

// ============================================================================
// TIMERS
// ============================================================================

#[test]
fn test_timeout_fires_once() {
    let (mut host, _rx) = host(DEMO);
    host.eval("var n = 0; setTimeout(function () { n++; }, 0);").unwrap();
    assert!(host.next_deadline().is_some());

    let later = Instant::now() + Duration::from_millis(50);
    host.run_timers(later).unwrap();
    host.run_timers(later + Duration::from_millis(50)).unwrap();
    assert_eq!(host.eval("n").unwrap(), "1");
    assert!(host.next_deadline().is_none());
}

#[test]
fn test_cleared_timeout_never_fires() {
    let (mut host, _rx) = host(DEMO);
    host.eval("var fired = false; var t = setTimeout(function () { fired = true; }, 0); clearTimeout(t);")
        .unwrap();
    host.run_timers(Instant::now() + Duration::from_millis(50)).unwrap();
    assert_eq!(host.eval("fired").unwrap(), "false");
}

#[test]
fn test_animation_frame() {
    let (mut host, _rx) = host(DEMO);
    host.eval("var ts = -1; requestAnimationFrame(function (t) { ts = t; });").unwrap();
    host.run_animation_frame(Instant::now()).unwrap();
    assert_eq!(host.eval("ts").unwrap(), "-1");
    host.run_animation_frame(Instant::now() + Duration::from_millis(100)).unwrap();
    assert_eq!(host.eval("ts >= 0").unwrap(), "true");
}

#[test]
fn test_microtasks_drain_after_eval() {
    let (mut host, _rx) = host(DEMO);
    host.eval("var m = 'sync'; Promise.resolve().then(function () { m = 'async'; });").unwrap();
    assert_eq!(host.eval("m").unwrap(), "async");
}

// ============================================================================
// XHR
// ============================================================================

#[test]
fn test_xhr_completion_is_marshalled() {
    let (mut host, tasks) = host_with_xhr(DEMO, "hello");
    host.eval(
        "var got = 'pending'; var x = new XMLHttpRequest(); x.open('GET', 'data.txt'); \
         x.onload = function () { got = x.status + ':' + x.responseText; }; x.send();",
    )
    .unwrap();
    assert_eq!(host.eval("got").unwrap(), "pending");
    run_next_task(&mut host, &tasks);
    assert_eq!(host.eval("got").unwrap(), "200:hello");
}

#[test]
fn test_fetch_resolves() {
    let (mut host, tasks) = host_with_xhr(DEMO, r#"{"n": 7}"#);
    host.eval("var out; fetch('/api').then(function (r) { return r.json(); }).then(function (j) { out = j.n; });")
        .unwrap();
    run_next_task(&mut host, &tasks);
    assert_eq!(host.eval("out").unwrap(), "7");
}

#[test]
fn test_xhr_without_transport_reports_error() {
    let (task_tx, task_rx) = mpsc::channel::<Task>();
    let scheduler: Scheduler = Arc::new(move |task: Task| {
        let _ = task_tx.send(task);
    });
    let (mut host, _rx) = host_with(DEMO, options(), Callbacks::default(), scheduler);
    host.eval(
        "var failed = false; var x = new XMLHttpRequest(); x.open('GET', '/x'); \
         x.onerror = function () { failed = true; }; x.send();",
    )
    .unwrap();
    run_next_task(&mut host, &task_rx);
    assert_eq!(host.eval("failed + ':' + x.status").unwrap(), "true:0");
}

// ============================================================================
// WINDOW
// ============================================================================

#[test]
fn test_location_and_base64() {
    let (mut host, _rx) = host(DEMO);
    assert_eq!(host.eval("location.hostname + location.pathname").unwrap(), "example.com/app/index.html");
    assert_eq!(host.eval("btoa('hello')").unwrap(), "aGVsbG8=");
    assert_eq!(host.eval("atob('aGVsbG8=')").unwrap(), "hello");
    assert_eq!(host.eval("window === self && window.document === document").unwrap(), "true");
}

#[test]
fn test_computed_style_uses_query() {
    let callbacks = Callbacks {
        query: Some(Arc::new(|path: &str, property: &str| Ok(format!("{path} {property}")))),
        ..Callbacks::default()
    };
    let (mut host, _rx) = host_with(DEMO, options(), callbacks, idle_scheduler());
    let value = host
        .eval("getComputedStyle(document.getElementById('d')).getPropertyValue('backgroundColor')")
        .unwrap();
    assert!(value.starts_with("/0"), "{value}");
    assert!(value.ends_with(" background-color"), "{value}");
}
