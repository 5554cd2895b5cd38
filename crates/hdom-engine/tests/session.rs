//! Session tests for hdom-engine
//!
//! Sessions run a real script thread; the idle cutoff is shortened so
//! change tracking returns quickly.

use std::sync::Arc;
use std::time::{Duration, Instant};

use hdom_engine::{Callbacks, Config, Session, SessionError, XhrResponse};

fn config() -> Config {
    Config {
        idle_timeout: Duration::from_millis(300),
        ..Config::default()
    }
}

fn started(html: &str, callbacks: Callbacks) -> Session {
    let mut session = Session::new(html, config(), callbacks);
    session.start().unwrap();
    session
}

const DEMO: &str = r#"<html><head></head><body><p id="demo">x</p></body></html>"#;

// ============================================================================
// EXEC AND CHANGE TRACKING
// ============================================================================

#[test]
fn test_end_to_end_inner_html() {
    let session = started(DEMO, Callbacks::default());
    session
        .exec("document.getElementById('demo').innerHTML = 'y'", true)
        .unwrap();
    let html = session.track_changes().unwrap().expect("document changed");
    assert!(html.contains(r#"<p id="demo">y</p>"#), "{html}");
}

#[test]
fn test_track_changes_idle_twice() {
    let session = started(DEMO, Callbacks::default());
    assert_eq!(session.exec("1 + 1", true).unwrap(), "2");
    assert_eq!(session.track_changes().unwrap(), None);
    assert_eq!(session.track_changes().unwrap(), None);

    session
        .exec("document.body.innerHTML = '<b>fresh</b>'", false)
        .unwrap();
    let html = session.track_changes().unwrap().unwrap();
    assert!(html.contains("<b>fresh</b>"));
}

#[test]
fn test_compat_comment_markers() {
    let session = started(DEMO, Callbacks::default());
    assert_eq!(session.exec("<!--\n'ok'\n-->", true).unwrap(), "ok");
}

#[test]
fn test_exec_requires_initial() {
    let session = started(DEMO, Callbacks::default());
    let err = session.exec("1", false).unwrap_err();
    assert!(matches!(err, SessionError::Script(_)));
}

#[test]
fn test_halt_is_typed() {
    let session = started(DEMO, Callbacks::default());
    let err = session.exec("window.stop(); 1", true).unwrap_err();
    assert!(err.is_halted(), "{err}");
    // the next script runs normally
    assert_eq!(session.exec("'after'", false).unwrap(), "after");
}

#[test]
fn test_runaway_script_times_out() {
    let mut session = Session::new(
        DEMO,
        Config {
            exec_timeout: Duration::from_millis(500),
            ..config()
        },
        Callbacks::default(),
    );
    session.start().unwrap();
    assert!(session.exec("while (true) {}", true).is_err());
    assert_eq!(session.exec("'alive'", false).unwrap(), "alive");
}

// ============================================================================
// DOCUMENT LIFECYCLE AND CLICKS
// ============================================================================

#[test]
fn test_close_doc_runs_ready_handlers() {
    let session = started(DEMO, Callbacks::default());
    session
        .exec(
            "document.addEventListener('DOMContentLoaded', function () { document.getElementById('demo').textContent = 'ready'; });",
            true,
        )
        .unwrap();
    assert_eq!(session.track_changes().unwrap(), None);
    session.close_doc().unwrap();
    let html = session.track_changes().unwrap().unwrap();
    assert!(html.contains(">ready</p>"), "{html}");
}

#[test]
fn test_trigger_click() {
    let session = started(
        r#"<html><body><form onsubmit="document.getElementById('out').textContent = 'sent'; return false"><button id="go">Go</button></form><div id="out"></div><span id="idle">z</span></body></html>"#,
        Callbacks::default(),
    );
    session.exec("", true).unwrap();

    let html = session.trigger_click("#go").unwrap().unwrap();
    assert!(html.contains(r#"<div id="out">sent</div>"#), "{html}");

    assert_eq!(session.trigger_click("#idle").unwrap(), None);
    assert!(matches!(
        session.trigger_click("#nothing"),
        Err(SessionError::NoMatch(sel)) if sel == "#nothing"
    ));
}

#[test]
fn test_put_attr() {
    let session = started(r#"<html><body><input id="q"></body></html>"#, Callbacks::default());
    session.exec("", true).unwrap();
    assert!(session.put_attr("#q", "value", "hello").unwrap());
    assert!(!session.put_attr("#missing", "value", "x").unwrap());
    assert_eq!(session.exec("document.getElementById('q').value", false).unwrap(), "hello");
}

// ============================================================================
// INJECTED SCRIPTS AND TIMERS
// ============================================================================

#[test]
fn test_inserted_inline_script_runs() {
    let session = started(DEMO, Callbacks::default());
    session
        .exec(
            "var s = document.createElement('script'); s.textContent = \"document.getElementById('demo').textContent = 'injected'\"; document.body.appendChild(s);",
            true,
        )
        .unwrap();
    let html = session.track_changes().unwrap().unwrap();
    assert!(html.contains(">injected</p>"), "{html}");
}

#[test]
fn test_inserted_src_script_is_fetched() {
    let callbacks = Callbacks {
        xhr: Some(Arc::new(|req| {
            assert_eq!(req.uri, "/js/app.js");
            Ok(XhrResponse::ok("document.getElementById('demo').textContent = 'fetched'"))
        })),
        ..Callbacks::default()
    };
    let session = started(DEMO, callbacks);
    session
        .exec(
            "var s = document.createElement('script'); s.setAttribute('src', './js/app.js'); document.body.appendChild(s);",
            true,
        )
        .unwrap();
    let html = session.track_changes().unwrap().unwrap();
    assert!(html.contains(">fetched</p>"), "{html}");
}

#[test]
fn test_script_src_set_after_insertion_runs_once() {
    let callbacks = Callbacks {
        xhr: Some(Arc::new(|_req| {
            Ok(XhrResponse::ok("document.getElementById('demo').textContent += '!'"))
        })),
        ..Callbacks::default()
    };
    let session = started(DEMO, callbacks);
    session
        .exec(
            "var s = document.createElement('script'); document.head.appendChild(s); s.src = '/late.js'; s.setAttribute('data-n', '1');",
            true,
        )
        .unwrap();
    let html = session.track_changes().unwrap().unwrap();
    assert!(html.contains(">x!</p>"), "{html}");
}

#[test]
fn test_script_text_set_after_insertion_runs_once() {
    let session = started(DEMO, Callbacks::default());
    session
        .exec(
            "var s = document.createElement('script'); document.body.appendChild(s); \
             s.textContent = \"document.getElementById('demo').textContent += '!'\"; \
             s.setAttribute('data-n', '1'); document.head.appendChild(s);",
            true,
        )
        .unwrap();
    let html = session.track_changes().unwrap().unwrap();
    assert!(html.contains(">x!</p>"), "{html}");
}

#[test]
fn test_detached_script_does_not_run() {
    let session = started(DEMO, Callbacks::default());
    session
        .exec(
            "var s = document.createElement('script'); s.textContent = \"document.getElementById('demo').textContent = 'ran'\"; s.setAttribute('data-n', '1');",
            true,
        )
        .unwrap();
    session.track_changes().unwrap();
    assert_eq!(session.exec("document.getElementById('demo').textContent", false).unwrap(), "x");
}

#[test]
fn test_due_timer_fires_between_jobs() {
    let session = started(DEMO, Callbacks::default());
    session
        .exec("var fired = false; setTimeout(function () { fired = true; }, 20);", true)
        .unwrap();
    let start = Instant::now();
    let mut fired = false;
    while !fired && start.elapsed() < Duration::from_secs(3) {
        fired = session.exec("fired", false).unwrap() == "true";
    }
    assert!(fired);
}

#[test]
fn test_timer_changes_are_tracked() {
    let session = started(DEMO, Callbacks::default());
    session
        .exec(
            "setTimeout(function () { document.getElementById('demo').textContent = 'later'; }, 50);",
            true,
        )
        .unwrap();
    let html = session.track_changes().unwrap().unwrap();
    assert!(html.contains(">later</p>"), "{html}");
}

#[test]
fn test_xhr_completes_on_script_thread() {
    let callbacks = Callbacks {
        xhr: Some(Arc::new(|_req| Ok(XhrResponse::ok("from server")))),
        ..Callbacks::default()
    };
    let session = started(DEMO, callbacks);
    session
        .exec(
            "var x = new XMLHttpRequest(); x.onload = function () { document.getElementById('demo').textContent = x.responseText; }; x.open('GET', '/data'); x.send();",
            true,
        )
        .unwrap();
    let html = session.track_changes().unwrap().unwrap();
    assert!(html.contains(">from server</p>"), "{html}");
}

// ============================================================================
// PATH ACCESS
// ============================================================================

const LIST: &str = r#"<html><body><div id="a">one</div><p>two</p></body></html>"#;

#[test]
fn test_retrieve_and_write() {
    let session = started(LIST, Callbacks::default());
    session.exec("", true).unwrap();
    assert_eq!(session.retrieve("/0/1/textContent").unwrap(), "two");
    assert_eq!(session.retrieve("/0/0/id").unwrap(), "a");

    session.write("/0/0/innerHTML", "it's <i>new</i>").unwrap();
    assert_eq!(session.retrieve("/0/0/innerHTML").unwrap(), "it's <i>new</i>");
    assert!(session.track_changes().unwrap().is_some());
}

#[test]
fn test_list() {
    let session = started(LIST, Callbacks::default());
    session.exec("", true).unwrap();
    let items = session.list("/0").unwrap();
    assert_eq!(&items[..2], ["0", "1"]);
    assert!(!items.contains(&"2".to_string()));
    assert!(items.contains(&"appendChild()".to_string()), "{items:?}");
}

#[test]
fn test_malformed_paths() {
    let session = started(LIST, Callbacks::default());
    session.exec("", true).unwrap();
    assert!(matches!(session.retrieve("/1/0"), Err(SessionError::Path(_))));
    assert!(matches!(session.write("/0/0", "x"), Err(SessionError::Path(_))));
    assert!(matches!(session.list("body"), Err(SessionError::Path(_))));
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[test]
fn test_stop() {
    let mut session = started(DEMO, Callbacks::default());
    session
        .exec("document.getElementById('demo').innerHTML = 'y'", true)
        .unwrap();
    session.stop();
    assert!(!session.is_running());
    assert!(matches!(session.exec("1", false), Err(SessionError::NotStarted)));
    assert!(matches!(session.track_changes(), Err(SessionError::NotStarted)));
}
