//! Inline style declarations
//!
//! `element.style` is a live view of the `style` attribute: every read
//! parses the attribute, every write serializes the declarations back.
//! Values are kept as written. lightningcss decides which property names
//! are known and rejects values a browser would drop.

use lightningcss::properties::{Property, PropertyId};
use lightningcss::stylesheet::ParserOptions;

/// One `name: value` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Lowercase, hyphenated property name
    pub name: String,
    pub value: String,
    pub important: bool,
}

/// Ordered declarations of a `style` attribute
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleDeclaration {
    decls: Vec<Declaration>,
}

impl StyleDeclaration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the text of a `style` attribute. Malformed entries are skipped;
    /// a later declaration of the same property replaces an earlier one.
    pub fn parse(text: &str) -> Self {
        let mut style = Self::new();
        for entry in split_declarations(text) {
            let Some((name, value)) = entry.split_once(':') else {
                continue;
            };
            let name = name.trim().to_ascii_lowercase();
            let mut value = value.trim();
            let mut important = false;
            if let Some(v) = strip_important(value) {
                value = v;
                important = true;
            }
            if name.is_empty() || value.is_empty() {
                continue;
            }
            style.put(Declaration {
                name,
                value: value.to_string(),
                important,
            });
        }
        style
    }

    fn put(&mut self, decl: Declaration) {
        match self.decls.iter_mut().find(|d| d.name == decl.name) {
            Some(existing) => *existing = decl,
            None => self.decls.push(decl),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.decls
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.value.as_str())
    }

    pub fn priority(&self, name: &str) -> &'static str {
        let name = name.to_ascii_lowercase();
        match self.decls.iter().find(|d| d.name == name) {
            Some(d) if d.important => "important",
            _ => "",
        }
    }

    /// `setProperty`: an empty value removes the property. Returns false
    /// when the value was rejected and nothing changed.
    pub fn set(&mut self, name: &str, value: &str, important: bool) -> bool {
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();
        if name.is_empty() {
            return false;
        }
        if value.is_empty() {
            self.remove(&name);
            return true;
        }
        if !is_valid_value(&name, value) {
            tracing::debug!("ignoring invalid value for {}: {}", name, value);
            return false;
        }
        self.put(Declaration {
            name,
            value: value.to_string(),
            important,
        });
        true
    }

    /// `removeProperty`: returns the old value, empty when unset
    pub fn remove(&mut self, name: &str) -> String {
        let name = name.to_ascii_lowercase();
        match self.decls.iter().position(|d| d.name == name) {
            Some(at) => self.decls.remove(at).value,
            None => String::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// Property name at `index`
    pub fn item(&self, index: usize) -> Option<&str> {
        self.decls.get(index).map(|d| d.name.as_str())
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.decls
    }

    /// Serialize as `cssText`
    pub fn to_css(&self) -> String {
        self.decls
            .iter()
            .map(|d| {
                if d.important {
                    format!("{}: {} !important;", d.name, d.value)
                } else {
                    format!("{}: {};", d.name, d.value)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Split on `;` outside parentheses and quotes
fn split_declarations(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, ch) in text.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                out.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&text[start..]);
    out
}

fn strip_important(value: &str) -> Option<&str> {
    let lower = value.to_ascii_lowercase();
    let at = lower.rfind('!')?;
    if lower[at + 1..].trim() == "important" {
        Some(value[..at].trim_end())
    } else {
        None
    }
}

/// Whether lightningcss knows the property (vendor prefixes included)
pub fn is_known_property(name: &str) -> bool {
    let name = to_kebab_case(name);
    !matches!(PropertyId::from(name.as_str()), PropertyId::Custom(_))
}

/// Values of unknown and custom properties are taken as they are; values of
/// known properties must parse.
fn is_valid_value(name: &str, value: &str) -> bool {
    let id = PropertyId::from(name);
    if matches!(id, PropertyId::Custom(_)) {
        return true;
    }
    match Property::parse_string(id, value, ParserOptions::default()) {
        Ok(Property::Unparsed(_)) => {
            value.contains("var(")
                || matches!(value.to_ascii_lowercase().as_str(), "inherit" | "initial" | "unset" | "revert")
        }
        Ok(_) => true,
        Err(_) => false,
    }
}

/// `backgroundColor` -> `background-color`, `webkitTransform` ->
/// `-webkit-transform`, `cssFloat` -> `float`
pub fn to_kebab_case(name: &str) -> String {
    if name == "cssFloat" {
        return "float".to_string();
    }
    let prefixed = ["webkit", "moz", "ms", "o"].iter().any(|p| {
        name.strip_prefix(p)
            .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_uppercase()))
    });
    let mut out = String::with_capacity(name.len() + 4);
    if prefixed {
        out.push('-');
    }
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// `background-color` -> `backgroundColor`
pub fn to_camel_case(name: &str) -> String {
    let name = name.strip_prefix('-').unwrap_or(name);
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for ch in name.chars() {
        if ch == '-' {
            upper = true;
        } else if upper {
            out.push(ch.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_serialize() {
        let style = StyleDeclaration::parse("color: red; background: url(a;b.png) ; width:10px !important;;");
        assert_eq!(style.len(), 3);
        assert_eq!(style.get("color"), Some("red"));
        assert_eq!(style.get("background"), Some("url(a;b.png)"));
        assert_eq!(style.priority("width"), "important");
        assert_eq!(
            style.to_css(),
            "color: red; background: url(a;b.png); width: 10px !important;"
        );
    }

    #[test]
    fn test_later_declaration_wins() {
        let style = StyleDeclaration::parse("color: red; COLOR: blue");
        assert_eq!(style.len(), 1);
        assert_eq!(style.get("color"), Some("blue"));
    }

    #[test]
    fn test_set_and_remove() {
        let mut style = StyleDeclaration::parse("display: block");
        assert!(style.set("display", "none", false));
        assert!(style.set("--gap", "4px", false));
        assert_eq!(style.to_css(), "display: none; --gap: 4px;");
        assert_eq!(style.remove("display"), "none");
        assert!(style.set("--gap", "", false));
        assert!(style.is_empty());
    }

    #[test]
    fn test_invalid_value_rejected() {
        let mut style = StyleDeclaration::new();
        assert!(!style.set("width", "wide", false));
        assert!(style.is_empty());
        assert!(style.set("width", "10px", false));
    }

    #[test]
    fn test_case_conversion() {
        assert_eq!(to_kebab_case("backgroundColor"), "background-color");
        assert_eq!(to_kebab_case("webkitTransform"), "-webkit-transform");
        assert_eq!(to_kebab_case("cssFloat"), "float");
        assert_eq!(to_kebab_case("opacity"), "opacity");
        assert_eq!(to_camel_case("background-color"), "backgroundColor");
        assert_eq!(to_camel_case("-webkit-transform"), "webkitTransform");
    }

    #[test]
    fn test_known_properties() {
        assert!(is_known_property("color"));
        assert!(is_known_property("backgroundColor"));
        assert!(!is_known_property("notAProperty"));
    }
}
