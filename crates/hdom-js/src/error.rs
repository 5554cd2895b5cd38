//! Script host errors

use hdom_css::SelectorError;

/// Errors surfaced by [`ScriptHost`](crate::ScriptHost)
#[derive(Debug, thiserror::Error)]
pub enum JsError {
    #[error("QuickJS error: {0}")]
    Engine(#[from] rquickjs::Error),

    /// An uncaught exception, with the failing source lines
    #[error("{message}\n{excerpt}")]
    Script { message: String, excerpt: String },

    /// `window.stop()` was called while the script ran
    #[error("script halted")]
    Halted,

    #[error("script deadline exceeded")]
    Deadline,

    #[error("script host is not initialized")]
    NotInitialized,

    #[error(transparent)]
    Selector(#[from] SelectorError),
}

impl JsError {
    pub fn is_halted(&self) -> bool {
        matches!(self, JsError::Halted)
    }
}

/// Source lines around `line` (1-based) for error reports: the failing
/// line with one line of context on each side, or a 100 column window
/// around `column` when the line is too long to show whole.
pub fn excerpt(source: &str, line: usize, column: usize) -> String {
    const WIDTH: usize = 100;
    let lines: Vec<&str> = source.lines().collect();
    if line == 0 || line > lines.len() {
        return String::new();
    }
    let failing = lines[line - 1];
    if failing.chars().count() > WIDTH {
        let start = column.saturating_sub(WIDTH / 2);
        let window: String = failing.chars().skip(start).take(WIDTH).collect();
        return format!("{line}: {window}");
    }
    let first = line.saturating_sub(2);
    let last = line.min(lines.len() - 1);
    (first..=last)
        .map(|i| format!("{}: {}", i + 1, lines[i]))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Line and column of the innermost frame of a QuickJS stack trace
/// (`at f (eval_script:3:7)`)
pub(crate) fn stack_position(stack: &str) -> Option<(usize, usize)> {
    stack.lines().find_map(|frame| {
        let frame = frame.trim().trim_end_matches(')');
        let mut parts = frame.rsplit(':');
        let last: usize = parts.next()?.parse().ok()?;
        match parts.next().and_then(|p| p.parse::<usize>().ok()) {
            Some(line) => Some((line, last)),
            None => Some((last, 0)),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_context() {
        let src = "var a = 1;\nfoo();\nvar b = 2;\nvar c = 3;";
        assert_eq!(excerpt(src, 2, 1), "1: var a = 1;\n2: foo();\n3: var b = 2;");
        assert_eq!(excerpt(src, 1, 1), "1: var a = 1;\n2: foo();");
        assert_eq!(excerpt(src, 9, 1), "");
    }

    #[test]
    fn test_excerpt_long_line() {
        let src = format!("{}bad(){}", "x".repeat(300), "y".repeat(300));
        let ex = excerpt(&src, 1, 303);
        assert!(ex.starts_with("1: "));
        assert!(ex.contains("bad()"));
        assert_eq!(ex.chars().count(), 103);
    }

    #[test]
    fn test_stack_position() {
        assert_eq!(stack_position("    at <eval> (eval_script:3:7)\n"), Some((3, 7)));
        assert_eq!(stack_position("    at eval_script:12\n"), Some((12, 0)));
        assert_eq!(stack_position("no frames here"), None);
    }
}
