//! Selector engine
//!
//! Supports type, universal, `#id`, `.class`, `[attr]`, `[attr=value]`,
//! `:scope`, `:first-child`, `:nth-child(n)`, `:not(..)` and `:has(..)`
//! joined by descendant and child combinators. Matching runs top-down from
//! the root: a compound that matches consumes the head of the chain and
//! the remainder is searched for among the children.
//!
//! Comma branches are evaluated independently and concatenated, so a node
//! matched by two branches appears twice.

use hdom_dom::{DomTree, NodeId};

use crate::SelectorError;

/// A parsed, comma-separated selector list
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorGroup {
    branches: Vec<Chain>,
}

#[derive(Debug, Clone, PartialEq)]
struct Chain {
    steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
enum Step {
    /// `>`: the next compound must match an immediate child
    Child,
    Compound(Compound),
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Compound {
    /// 1-based rank among element siblings
    nth: Option<usize>,
    scope: bool,
    blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq)]
enum Block {
    Universal,
    Tag(String),
    Id(String),
    Class(String),
    Attr { name: String, value: Option<String> },
    Not(Box<SelectorGroup>),
    Has(Box<SelectorGroup>),
}

/// Parse `selector` and match it below `root`.
///
/// With `skip_root` the root itself is never a result (`:scope` still
/// refers to it). With `root_must_match_first` the first compound must
/// match `root` itself instead of being searched for among descendants.
pub fn select(
    tree: &DomTree,
    selector: &str,
    root: NodeId,
    skip_root: bool,
    root_must_match_first: bool,
) -> Result<Vec<NodeId>, SelectorError> {
    let group = SelectorGroup::parse(selector)?;
    Ok(group.select_with(tree, root, skip_root, root_must_match_first))
}

impl SelectorGroup {
    pub fn parse(selector: &str) -> Result<Self, SelectorError> {
        let branches = split_top_level(selector, ',')?
            .into_iter()
            .map(|b| parse_chain(b.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { branches })
    }

    /// All elements under `root` matching any branch (`querySelectorAll`)
    pub fn select(&self, tree: &DomTree, root: NodeId) -> Vec<NodeId> {
        self.select_with(tree, root, true, false)
    }

    pub fn select_with(
        &self,
        tree: &DomTree,
        root: NodeId,
        skip_root: bool,
        root_must_match_first: bool,
    ) -> Vec<NodeId> {
        let matcher = Matcher { tree, scope: root };
        let mut out = Vec::new();
        for branch in &self.branches {
            let mut found = Vec::new();
            matcher.select_chain(&branch.steps, root, skip_root, root_must_match_first, &mut found);
            out.extend(found.into_iter().filter(|n| tree.is_element(*n)));
        }
        out
    }

    /// First result of [`select`](Self::select) (`querySelector`); with
    /// several branches that is the first match of the earliest branch
    /// that matched at all
    pub fn select_first(&self, tree: &DomTree, root: NodeId) -> Option<NodeId> {
        self.select(tree, root).first().copied()
    }

    /// Whether `node` is matched when the selector runs from its root
    pub fn matches(&self, tree: &DomTree, node: NodeId) -> bool {
        let root = tree.root_of(node);
        self.select_with(tree, root, false, false).contains(&node)
    }
}

struct Matcher<'a> {
    tree: &'a DomTree,
    /// Node `:scope` refers to
    scope: NodeId,
}

impl Matcher<'_> {
    fn select_chain(
        &self,
        steps: &[Step],
        node: NodeId,
        skip_root: bool,
        strict: bool,
        out: &mut Vec<NodeId>,
    ) {
        let Some(n) = self.tree.get(node) else {
            return;
        };
        if n.is_text() || n.character_data().is_some() {
            return;
        }
        let Some((head, rest)) = steps.split_first() else {
            return;
        };

        let compound = match head {
            Step::Child => return self.select_chain(rest, node, skip_root, true, out),
            Step::Compound(c) => c,
        };

        if skip_root && !compound.scope {
            for child in self.tree.children(node) {
                self.select_chain(steps, child, false, strict, out);
            }
            return;
        }

        if self.matches_compound(compound, node) {
            // the first matching node claims the head; the remainder is
            // only searched below it
            if rest.is_empty() {
                out.push(node);
            } else {
                for child in self.tree.children(node) {
                    self.select_chain(rest, child, false, false, out);
                }
            }
        } else if !strict {
            for child in self.tree.children(node) {
                self.select_chain(steps, child, false, false, out);
            }
        }
    }

    fn matches_compound(&self, compound: &Compound, node: NodeId) -> bool {
        if let Some(n) = compound.nth {
            if self.element_rank(node) != n {
                return false;
            }
        }
        if compound.scope && node != self.scope {
            return false;
        }
        compound.blocks.iter().all(|b| self.matches_block(b, node))
    }

    fn matches_block(&self, block: &Block, node: NodeId) -> bool {
        let tree = self.tree;
        match block {
            Block::Universal => true,
            Block::Tag(tag) => tree.tag_name(node).is_some_and(|t| t.eq_ignore_ascii_case(tag)),
            Block::Id(id) => tree.attr(node, "id") == Some(id.as_str()),
            Block::Class(class) => tree
                .element(node)
                .is_some_and(|e| e.classes().any(|c| c == class)),
            Block::Attr { name, value: None } => tree.has_attr(node, name),
            Block::Attr { name, value: Some(v) } => tree.attr(node, name) == Some(v.as_str()),
            Block::Has(group) => {
                let inner = Matcher { tree, scope: node };
                group.branches.iter().any(|b| {
                    let mut found = Vec::new();
                    inner.select_chain(&b.steps, node, true, false, &mut found);
                    found.iter().any(|n| tree.is_element(*n))
                })
            }
            Block::Not(group) => {
                let inner = Matcher { tree, scope: node };
                group.branches.iter().all(|b| {
                    let mut found = Vec::new();
                    inner.select_chain(&b.steps, node, false, true, &mut found);
                    found.is_empty()
                })
            }
        }
    }

    /// 1-based position among element siblings
    fn element_rank(&self, node: NodeId) -> usize {
        let mut rank = 1;
        let mut prev = self.tree.prev_sibling(node);
        while let Some(p) = prev {
            if self.tree.is_element(p) {
                rank += 1;
            }
            prev = self.tree.prev_sibling(p);
        }
        rank
    }
}

// ---- parsing ------------------------------------------------------------

/// Characters of `s`, each flagged when it sits outside quotes, brackets
/// and parentheses and is not preceded by a backslash. Opening and closing
/// brackets at depth zero are flagged themselves.
fn classify(s: &str) -> Result<Vec<(char, bool)>, SelectorError> {
    let mut out = Vec::with_capacity(s.len());
    let mut paren = 0usize;
    let mut bracket = false;
    let mut quote: Option<char> = None;
    let mut prev_backslash = false;

    for ch in s.chars() {
        let escaped = prev_backslash;
        prev_backslash = ch == '\\';
        if escaped {
            out.push((ch, false));
            continue;
        }
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            out.push((ch, false));
            continue;
        }
        let top = paren == 0 && !bracket;
        match ch {
            '"' | '\'' if !top => quote = Some(ch),
            '[' if paren == 0 => {
                if bracket {
                    return Err(SelectorError::Unbalanced(s.to_string()));
                }
                bracket = true;
            }
            ']' if paren == 0 => {
                if !bracket {
                    return Err(SelectorError::Unbalanced(s.to_string()));
                }
                bracket = false;
                out.push((ch, true));
                continue;
            }
            '(' if !bracket => paren += 1,
            ')' if !bracket => {
                if paren == 0 {
                    return Err(SelectorError::Unbalanced(s.to_string()));
                }
                paren -= 1;
                out.push((ch, paren == 0));
                continue;
            }
            _ => {}
        }
        out.push((ch, top));
    }
    if paren != 0 || bracket || quote.is_some() {
        return Err(SelectorError::Unbalanced(s.to_string()));
    }
    Ok(out)
}

fn split_top_level(s: &str, sep: char) -> Result<Vec<String>, SelectorError> {
    let mut parts = vec![String::new()];
    for (ch, top) in classify(s)? {
        if top && ch == sep {
            parts.push(String::new());
        } else if let Some(last) = parts.last_mut() {
            last.push(ch);
        }
    }
    Ok(parts)
}

fn parse_chain(s: &str) -> Result<Chain, SelectorError> {
    let mut steps = Vec::new();
    let mut current = String::new();

    fn flush(current: &mut String, steps: &mut Vec<Step>) -> Result<(), SelectorError> {
        if !current.is_empty() {
            steps.push(Step::Compound(parse_compound(current)?));
            current.clear();
        }
        Ok(())
    }

    for (ch, top) in classify(s)? {
        if top && ch.is_whitespace() {
            flush(&mut current, &mut steps)?;
        } else if top && ch == '>' {
            flush(&mut current, &mut steps)?;
            if matches!(steps.last(), Some(Step::Child)) {
                return Err(SelectorError::Term(s.to_string()));
            }
            steps.push(Step::Child);
        } else if top && (ch == '+' || ch == '~') {
            return Err(SelectorError::Combinator(ch));
        } else {
            current.push(ch);
        }
    }
    flush(&mut current, &mut steps)?;

    match steps.last() {
        None => Err(SelectorError::Empty),
        Some(Step::Child) => Err(SelectorError::Term(s.to_string())),
        Some(_) => Ok(Chain { steps }),
    }
}

/// Split a compound selector into its blocks: tag, `#id`, `.class`,
/// `[attr]` and `:pseudo`. Escaped punctuation stays in its block.
fn split_blocks(s: &str) -> Result<Vec<String>, SelectorError> {
    let mut blocks = Vec::new();
    let mut current = String::new();
    for (ch, top) in classify(s)? {
        if top && matches!(ch, '.' | '#' | '[' | ':') && !current.is_empty() {
            blocks.push(std::mem::take(&mut current));
        }
        current.push(ch);
        if top && ch == ']' {
            blocks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    Ok(blocks)
}

fn parse_compound(s: &str) -> Result<Compound, SelectorError> {
    let mut compound = Compound::default();
    for block in split_blocks(s)? {
        if let Some(id) = block.strip_prefix('#') {
            compound.blocks.push(Block::Id(unescape(&id.replace("\\\\", ""))));
        } else if let Some(class) = block.strip_prefix('.') {
            compound.blocks.push(Block::Class(unescape(class)));
        } else if let Some(attr) = block.strip_prefix('[') {
            let inner = attr.strip_suffix(']').ok_or_else(|| SelectorError::Term(block.clone()))?;
            compound.blocks.push(parse_attribute(inner)?);
        } else if let Some(pseudo) = block.strip_prefix(':') {
            parse_pseudo(pseudo, &mut compound)?;
        } else if block == "*" {
            compound.blocks.push(Block::Universal);
        } else if block.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '\\') {
            compound.blocks.push(Block::Tag(unescape(&block).to_ascii_lowercase()));
        } else {
            return Err(SelectorError::Term(block));
        }
    }
    Ok(compound)
}

fn parse_attribute(inner: &str) -> Result<Block, SelectorError> {
    let Some((name, value)) = inner.split_once('=') else {
        let name = inner.trim();
        if name.is_empty() {
            return Err(SelectorError::Term(format!("[{inner}]")));
        }
        return Ok(Block::Attr {
            name: name.to_ascii_lowercase(),
            value: None,
        });
    };
    let name = name.trim();
    if name.is_empty() || name.ends_with(['^', '$', '*', '~', '|', '!']) {
        return Err(SelectorError::Term(format!("[{inner}]")));
    }
    let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
    Ok(Block::Attr {
        name: name.to_ascii_lowercase(),
        value: Some(unescape(value)),
    })
}

fn parse_pseudo(pseudo: &str, compound: &mut Compound) -> Result<(), SelectorError> {
    let (name, arg) = match pseudo.split_once('(') {
        Some((name, rest)) => {
            let arg = rest
                .strip_suffix(')')
                .ok_or_else(|| SelectorError::Term(format!(":{pseudo}")))?;
            (name, Some(arg.trim()))
        }
        None => (pseudo, None),
    };
    match (name.to_ascii_lowercase().as_str(), arg) {
        ("scope", None) => compound.scope = true,
        ("first-child", None) => compound.nth = Some(1),
        ("nth-child", Some(n)) => {
            let n: usize = n
                .parse()
                .map_err(|_| SelectorError::Term(format!(":{pseudo}")))?;
            compound.nth = Some(n);
        }
        ("not", Some(inner)) => compound.blocks.push(Block::Not(Box::new(SelectorGroup::parse(inner)?))),
        ("has", Some(inner)) => compound.blocks.push(Block::Has(Box::new(SelectorGroup::parse(inner)?))),
        _ => return Err(SelectorError::Pseudo(pseudo.to_string())),
    }
    Ok(())
}

/// Drop backslash escapes: `\x` becomes `x`
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_blocks() {
        assert_eq!(split_blocks("div.a#b").unwrap(), vec!["div", ".a", "#b"]);
        assert_eq!(
            split_blocks(r#"input[type="a.b"]:not(.x)"#).unwrap(),
            vec!["input", r#"[type="a.b"]"#, ":not(.x)"]
        );
        assert_eq!(split_blocks(r"#a\\.b").unwrap(), vec![r"#a\\.b"]);
        assert_eq!(split_blocks(r"#a\.b").unwrap(), vec![r"#a\.b"]);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(SelectorGroup::parse(""), Err(SelectorError::Empty));
        assert!(matches!(SelectorGroup::parse("p:hover"), Err(SelectorError::Pseudo(_))));
        assert!(matches!(SelectorGroup::parse("a + b"), Err(SelectorError::Combinator('+'))));
        assert!(matches!(SelectorGroup::parse("p:nth-child(odd)"), Err(SelectorError::Term(_))));
        assert!(matches!(SelectorGroup::parse("[href^=x]"), Err(SelectorError::Term(_))));
        assert!(matches!(SelectorGroup::parse("div >"), Err(SelectorError::Term(_))));
        assert!(matches!(SelectorGroup::parse("a[x"), Err(SelectorError::Unbalanced(_))));
    }

    #[test]
    fn test_parse_chain_shapes() {
        let group = SelectorGroup::parse("body>p, :scope > li:has(a[href])").unwrap();
        assert_eq!(group.branches.len(), 2);
        assert_eq!(group.branches[0].steps.len(), 3);
        assert_eq!(group.branches[0].steps[1], Step::Child);

        let Step::Compound(c) = &group.branches[1].steps[0] else {
            panic!("expected compound");
        };
        assert!(c.scope);
    }

    #[test]
    fn test_escaped_id_value() {
        let group = SelectorGroup::parse(r"#a\\.b").unwrap();
        let Step::Compound(c) = &group.branches[0].steps[0] else {
            panic!("expected compound");
        };
        assert_eq!(c.blocks, vec![Block::Id("a.b".to_string())]);
    }
}
