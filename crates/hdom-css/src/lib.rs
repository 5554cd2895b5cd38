//! hdom CSS - selectors and inline styles
//!
//! Selector matching over the node arena and the `style` attribute view
//! used by `element.style`.

mod selectors;
mod style;

pub use selectors::{select, SelectorGroup};
pub use style::{is_known_property, to_camel_case, to_kebab_case, Declaration, StyleDeclaration};

/// Selector parsing error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,

    #[error("cannot parse selector term '{0}'")]
    Term(String),

    #[error("unsupported pseudo-class ':{0}'")]
    Pseudo(String),

    #[error("unsupported combinator '{0}'")]
    Combinator(char),

    #[error("unbalanced brackets or quotes in '{0}'")]
    Unbalanced(String),
}
