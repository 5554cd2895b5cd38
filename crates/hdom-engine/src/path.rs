//! Path addressing
//!
//! `/0` is the document body. Numeric segments after it pick the n-th
//! element or non-blank text child (the indexing geometry paths use) and
//! other segments are property names, so `/0/2/innerHTML` reads
//! `__hdom.child(document.body, 2).innerHTML`.

use std::fmt::Write as _;

use crate::error::SessionError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Child(usize),
    Property(String),
}

/// A parsed body-relative path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocPath {
    segments: Vec<Segment>,
}

impl DocPath {
    pub fn parse(path: &str) -> Result<Self, SessionError> {
        let malformed = || SessionError::Path(path.to_string());
        let mut parts = path.split('/').filter(|p| !p.is_empty());
        if !path.starts_with('/') || parts.next() != Some("0") {
            return Err(malformed());
        }
        let segments = parts
            .map(|part| {
                if let Ok(n) = part.parse::<usize>() {
                    Ok(Segment::Child(n))
                } else if is_identifier(part) {
                    Ok(Segment::Property(part.to_string()))
                } else {
                    Err(malformed())
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Accessor chain evaluating to the addressed value
    pub fn expression(&self) -> String {
        let mut expr = String::from("document.body");
        for segment in &self.segments {
            match segment {
                Segment::Child(n) => expr = format!("__hdom.child({expr}, {n})"),
                Segment::Property(name) => {
                    let _ = write!(expr, ".{name}");
                }
            }
        }
        expr
    }

    /// Script reading the value as a string, `""` for null or undefined
    pub fn retrieve_script(&self) -> String {
        format!(
            "(function () {{ var v = {}; return v == null ? '' : String(v); }})()",
            self.expression()
        )
    }

    /// Script assigning `value` to the addressed property
    pub fn write_script(&self, value: &str) -> Result<String, SessionError> {
        match self.segments.last() {
            Some(Segment::Property(_)) => Ok(format!("{} = {}; undefined", self.expression(), js_string(value))),
            _ => Err(SessionError::Path(format!("{self} does not name a property"))),
        }
    }

    /// Script listing child indices, property names and `method()` names,
    /// one per line
    pub fn list_script(&self) -> String {
        format!(
            r#"(function () {{
  var n = {};
  if (n == null) return '';
  var items = [];
  var i = 0;
  if (n.__hdom_kind === 1) {{
    while (__hdom.child(n, i)) items.push(String(i++));
  }}
  Object.keys(n).forEach(function (k) {{ items.push(k); }});
  var proto = Object.getPrototypeOf(n);
  while (proto && proto !== Object.prototype) {{
    Object.getOwnPropertyNames(proto).forEach(function (k) {{
      if (k === 'constructor') return;
      var d = Object.getOwnPropertyDescriptor(proto, k);
      if (d && typeof d.value === 'function' && items.indexOf(k + '()') < 0) items.push(k + '()');
    }});
    proto = Object.getPrototypeOf(proto);
  }}
  return items.join('\n');
}})()"#,
            self.expression()
        )
    }
}

impl std::fmt::Display for DocPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("/0")?;
        for segment in &self.segments {
            match segment {
                Segment::Child(n) => write!(f, "/{n}")?,
                Segment::Property(name) => write!(f, "/{name}")?,
            }
        }
        Ok(())
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Single-quoted JavaScript string literal
pub(crate) fn js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_segments() {
        let path = DocPath::parse("/0/2/innerHTML").unwrap();
        assert_eq!(
            path.segments(),
            &[Segment::Child(2), Segment::Property("innerHTML".into())]
        );
        assert_eq!(path.to_string(), "/0/2/innerHTML");
        assert!(DocPath::parse("/0").unwrap().segments().is_empty());
        assert!(DocPath::parse("/0/").unwrap().segments().is_empty());
    }

    #[test]
    fn test_malformed() {
        for bad in ["", "0/1", "/1/2", "/body", "/0/a-b", "/0/x;alert(1)"] {
            assert!(matches!(DocPath::parse(bad), Err(SessionError::Path(_))), "{bad}");
        }
    }

    #[test]
    fn test_expression() {
        let path = DocPath::parse("/0/1/0/textContent").unwrap();
        assert_eq!(
            path.expression(),
            "__hdom.child(__hdom.child(document.body, 1), 0).textContent"
        );
        assert_eq!(DocPath::parse("/0").unwrap().expression(), "document.body");
    }

    #[test]
    fn test_write_needs_property() {
        let path = DocPath::parse("/0/1").unwrap();
        assert!(matches!(path.write_script("x"), Err(SessionError::Path(_))));
        let path = DocPath::parse("/0/1/id").unwrap();
        assert_eq!(
            path.write_script("it's").unwrap(),
            "__hdom.child(document.body, 1).id = 'it\\'s'; undefined"
        );
    }

    #[test]
    fn test_js_string() {
        assert_eq!(js_string("a\nb\\c"), "'a\\nb\\\\c'");
        assert_eq!(js_string("\u{1}"), "'\\x01'");
    }
}
