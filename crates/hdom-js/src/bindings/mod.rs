//! Host classes for the DOM wrappers
//!
//! Each submodule builds the [`HostClass`](crate::realm::HostClass) of one
//! wrapper kind. Getters, setters and methods are plain functions taking
//! the wrapper id; they borrow the page only for as long as they read or
//! edit it and never across a call back into script code.

pub(crate) mod attributes;
pub(crate) mod collection;
pub(crate) mod document;
pub(crate) mod element;
pub(crate) mod event;
pub(crate) mod fragment;
pub(crate) mod style;

use rquickjs::Value;

pub(crate) type JsResult<'js> = rquickjs::Result<Value<'js>>;

/// Index form of a property key (`"0"`, `"12"`), as used by collections
pub(crate) fn index_key(name: &str) -> Option<usize> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) || (name.len() > 1 && name.starts_with('0')) {
        return None;
    }
    name.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_key() {
        assert_eq!(index_key("0"), Some(0));
        assert_eq!(index_key("12"), Some(12));
        assert_eq!(index_key("01"), None);
        assert_eq!(index_key("-1"), None);
        assert_eq!(index_key("+1"), None);
        assert_eq!(index_key("length"), None);
        assert_eq!(index_key(""), None);
    }
}
