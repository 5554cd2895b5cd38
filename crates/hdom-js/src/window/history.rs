//! History API
//!
//! Implements history.pushState, replaceState, back, forward and go.
//! Entries only move `location`; nothing is loaded.

use std::rc::Rc;

use rquickjs::function::{Opt, Rest};
use rquickjs::{Ctx, Function, Object, Value};

use crate::bridge;
use crate::realm::Realm;

/// History entry
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub url: String,
    pub title: String,
    /// JSON-serialized state
    pub state: Option<String>,
}

/// History manager
#[derive(Debug)]
pub struct HistoryManager {
    entries: Vec<HistoryEntry>,
    current: usize,
}

impl HistoryManager {
    pub fn new(initial_url: String) -> Self {
        Self {
            entries: vec![HistoryEntry {
                url: initial_url,
                title: String::new(),
                state: None,
            }],
            current: 0,
        }
    }

    /// Push a new entry, dropping forward history
    pub fn push_state(&mut self, state: Option<String>, title: String, url: String) {
        self.entries.truncate(self.current + 1);
        self.entries.push(HistoryEntry { url, title, state });
        self.current = self.entries.len() - 1;
    }

    pub fn replace_state(&mut self, state: Option<String>, title: String, url: String) {
        if let Some(entry) = self.entries.get_mut(self.current) {
            *entry = HistoryEntry { url, title, state };
        }
    }

    /// Move by `delta` entries; out-of-range moves are ignored
    pub fn go(&mut self, delta: i64) -> Option<&HistoryEntry> {
        let target = self.current as i64 + delta;
        if delta == 0 || target < 0 || target >= self.entries.len() as i64 {
            return None;
        }
        self.current = target as usize;
        self.entries.get(self.current)
    }

    pub fn current(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.current)
    }

    pub fn length(&self) -> usize {
        self.entries.len()
    }
}

fn entry_args<'js>(
    ctx: &Ctx<'js>,
    realm: &Realm,
    args: &[Value<'js>],
) -> rquickjs::Result<(Option<String>, String, String)> {
    let state = match args.first() {
        Some(v) if !v.is_null() && !v.is_undefined() => ctx.json_stringify(v.clone())?
            .map(|s| s.to_string())
            .transpose()?,
        _ => None,
    };
    let title = bridge::arg_string_or_empty(ctx, args, 1)?;
    let url = match args.get(2).filter(|v| !v.is_null() && !v.is_undefined()) {
        Some(v) => {
            let relative = bridge::to_string(ctx, v.clone())?;
            let mut location = realm.location.borrow_mut();
            if let Err(err) = location.set_href(&relative) {
                tracing::warn!("history: bad url {}: {}", relative, err);
            }
            location.href()
        }
        None => realm.location.borrow().href(),
    };
    Ok((state, title, url))
}

fn moved(realm: &Realm, url: Option<String>) {
    if let Some(url) = url {
        if let Err(err) = realm.location.borrow_mut().set_href(&url) {
            tracing::warn!("history: bad url {}: {}", url, err);
        }
    }
}

/// Install `history` into the global object
pub fn install_history<'js>(ctx: &Ctx<'js>, realm: &Rc<Realm>) -> rquickjs::Result<()> {
    let obj = Object::new(ctx.clone())?;

    let r = realm.clone();
    obj.set(
        "pushState",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<()> {
            let (state, title, url) = entry_args(&ctx, &r, &args.0)?;
            r.history.borrow_mut().push_state(state, title, url);
            Ok(())
        })?,
    )?;

    let r = realm.clone();
    obj.set(
        "replaceState",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<()> {
            let (state, title, url) = entry_args(&ctx, &r, &args.0)?;
            r.history.borrow_mut().replace_state(state, title, url);
            Ok(())
        })?,
    )?;

    let r = realm.clone();
    obj.set(
        "go",
        Function::new(ctx.clone(), move |delta: Opt<i32>| {
            let url = r.history.borrow_mut().go(i64::from(delta.0.unwrap_or(0))).map(|e| e.url.clone());
            moved(&r, url);
        })?,
    )?;

    let r = realm.clone();
    obj.set(
        "back",
        Function::new(ctx.clone(), move || {
            let url = r.history.borrow_mut().go(-1).map(|e| e.url.clone());
            moved(&r, url);
        })?,
    )?;

    let r = realm.clone();
    obj.set(
        "forward",
        Function::new(ctx.clone(), move || {
            let url = r.history.borrow_mut().go(1).map(|e| e.url.clone());
            moved(&r, url);
        })?,
    )?;

    let r = realm.clone();
    obj.set(
        "getLength",
        Function::new(ctx.clone(), move || r.history.borrow().length() as u32)?,
    )?;

    let r = realm.clone();
    obj.set(
        "getState",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>| -> rquickjs::Result<Value<'js>> {
            let state = r.history.borrow().current().and_then(|e| e.state.clone());
            match state {
                Some(json) => ctx.json_parse(json),
                None => Ok(Value::new_null(ctx.clone())),
            }
        })?,
    )?;

    ctx.globals().set("history", obj)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_navigate() {
        let mut h = HistoryManager::new("https://example.com/".into());
        h.push_state(None, String::new(), "https://example.com/a".into());
        h.push_state(Some("{}".into()), String::new(), "https://example.com/b".into());
        assert_eq!(h.length(), 3);

        assert_eq!(h.go(-1).map(|e| e.url.as_str()), Some("https://example.com/a"));
        assert!(h.go(-5).is_none());
        assert_eq!(h.current().map(|e| e.url.as_str()), Some("https://example.com/a"));

        h.push_state(None, String::new(), "https://example.com/c".into());
        assert_eq!(h.length(), 3);
        assert!(h.go(1).is_none());
    }

    #[test]
    fn test_replace_state() {
        let mut h = HistoryManager::new("https://example.com/".into());
        h.replace_state(Some("1".into()), "t".into(), "https://example.com/x".into());
        assert_eq!(h.length(), 1);
        assert_eq!(h.current().and_then(|e| e.state.as_deref()), Some("1"));
    }
}
