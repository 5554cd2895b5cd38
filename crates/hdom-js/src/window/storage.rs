//! Storage APIs
//!
//! localStorage and sessionStorage. Both live as long as the session;
//! nothing is written to disk.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use rquickjs::convert::Coerced;
use rquickjs::{Ctx, Function, Object};

use crate::realm::Realm;

/// Storage backend
#[derive(Debug, Default)]
pub struct Storage {
    data: BTreeMap<String, String>,
}

impl Storage {
    pub fn get_item(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    pub fn set_item(&mut self, key: &str, value: &str) {
        self.data.insert(key.to_string(), value.to_string());
    }

    pub fn remove_item(&mut self, key: &str) {
        self.data.remove(key);
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Key at index, in key order
    pub fn key(&self, index: usize) -> Option<&str> {
        self.data.keys().nth(index).map(String::as_str)
    }

    pub fn length(&self) -> usize {
        self.data.len()
    }
}

/// Install localStorage and sessionStorage into the global object
pub fn install_storage<'js>(ctx: &Ctx<'js>, realm: &Rc<Realm>) -> rquickjs::Result<()> {
    let globals = ctx.globals();
    globals.set(
        "localStorage",
        create_storage_object(ctx, realm.clone(), |r| &r.local_storage)?,
    )?;
    globals.set(
        "sessionStorage",
        create_storage_object(ctx, realm.clone(), |r| &r.session_storage)?,
    )?;
    Ok(())
}

fn create_storage_object<'js>(
    ctx: &Ctx<'js>,
    realm: Rc<Realm>,
    pick: fn(&Realm) -> &RefCell<Storage>,
) -> rquickjs::Result<Object<'js>> {
    let obj = Object::new(ctx.clone())?;

    let r = realm.clone();
    obj.set(
        "getItem",
        Function::new(ctx.clone(), move |key: Coerced<String>| {
            pick(&r).borrow().get_item(&key.0).map(str::to_string)
        })?,
    )?;

    let r = realm.clone();
    obj.set(
        "setItem",
        Function::new(
            ctx.clone(),
            move |key: Coerced<String>, value: Coerced<String>| {
                pick(&r).borrow_mut().set_item(&key.0, &value.0);
            },
        )?,
    )?;

    let r = realm.clone();
    obj.set(
        "removeItem",
        Function::new(ctx.clone(), move |key: Coerced<String>| {
            pick(&r).borrow_mut().remove_item(&key.0);
        })?,
    )?;

    let r = realm.clone();
    obj.set(
        "clear",
        Function::new(ctx.clone(), move || pick(&r).borrow_mut().clear())?,
    )?;

    let r = realm.clone();
    obj.set(
        "key",
        Function::new(ctx.clone(), move |index: u32| {
            pick(&r).borrow().key(index as usize).map(str::to_string)
        })?,
    )?;

    let r = realm;
    obj.set(
        "getLength",
        Function::new(ctx.clone(), move || pick(&r).borrow().length() as u32)?,
    )?;

    Ok(obj)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage() {
        let mut s = Storage::default();
        s.set_item("b", "2");
        s.set_item("a", "1");
        assert_eq!(s.get_item("a"), Some("1"));
        assert_eq!(s.key(0), Some("a"));
        assert_eq!(s.length(), 2);

        s.remove_item("a");
        assert_eq!(s.get_item("a"), None);
        s.clear();
        assert_eq!(s.length(), 0);
    }
}
