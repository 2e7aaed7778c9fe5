//! Compile errors.
//!
//! Every error is terminal for the compilation that raised it.  Errors carry
//! the source position of the token being examined when they were raised, if
//! one is known; errors raised while inlining a function body take the
//! position of the call site.

use std::path::PathBuf;

use thiserror::Error;

/// A 1-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    pub line: usize,
    pub col: usize,
}

impl Pos {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

/// Error raised by any phase of the compiler.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Unrecognized input in the source text.
    #[error("Unrecognized input: `{text}'")]
    Lexical { text: String, pos: Pos },

    /// The token stream did not match the grammar.
    #[error("{message}")]
    Syntax { message: String, pos: Option<Pos> },

    /// Duplicate, missing or otherwise invalid declaration.
    #[error("{message}")]
    Declaration { message: String, pos: Option<Pos> },

    /// Argument count does not match the callee's parameter list.
    #[error("Function `{function}' expects {} arguments{}, got {got}", .params.len(), param_list(.params))]
    Arity {
        function: String,
        params: Vec<String>,
        got: usize,
        pos: Option<Pos>,
    },

    /// Division or modulo by zero, or an invalid result while folding.
    #[error("{message}")]
    Arithmetic { message: String, pos: Option<Pos> },

    /// A const placeholder could not be bound.
    #[error("Missing definition for const `{name}' in function `{function}'")]
    UnresolvedConst {
        function: String,
        name: String,
        pos: Option<Pos>,
    },

    #[error("Error reading source file `{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Error writing destination file `{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The builtin library failed to compile.
    #[error("builtin library failed to compile: {0}")]
    Bootstrap(String),
}

fn param_list(params: &[String]) -> String {
    if params.is_empty() {
        String::new()
    } else {
        format!(": `{}'", params.join(", "))
    }
}

impl CompileError {
    pub fn syntax(message: impl Into<String>, pos: Pos) -> Self {
        Self::Syntax {
            message: message.into(),
            pos: Some(pos),
        }
    }

    pub fn declaration(message: impl Into<String>, pos: Option<Pos>) -> Self {
        Self::Declaration {
            message: message.into(),
            pos,
        }
    }

    pub fn arithmetic(message: impl Into<String>) -> Self {
        Self::Arithmetic {
            message: message.into(),
            pos: None,
        }
    }

    pub fn unresolved(function: impl Into<String>, name: impl Into<String>) -> Self {
        Self::UnresolvedConst {
            function: function.into(),
            name: name.into(),
            pos: None,
        }
    }

    /// Source position of the error, if known.
    pub fn pos(&self) -> Option<Pos> {
        match self {
            Self::Lexical { pos, .. } => Some(*pos),
            Self::Syntax { pos, .. }
            | Self::Declaration { pos, .. }
            | Self::Arity { pos, .. }
            | Self::Arithmetic { pos, .. }
            | Self::UnresolvedConst { pos, .. } => *pos,
            Self::Read { .. } | Self::Write { .. } | Self::Bootstrap(_) => None,
        }
    }

    /// Attach `at` as the position unless one is already recorded.
    pub fn at(mut self, at: Pos) -> Self {
        match &mut self {
            Self::Syntax { pos, .. }
            | Self::Declaration { pos, .. }
            | Self::Arity { pos, .. }
            | Self::Arithmetic { pos, .. }
            | Self::UnresolvedConst { pos, .. } => {
                pos.get_or_insert(at);
            }
            Self::Lexical { .. } | Self::Read { .. } | Self::Write { .. } | Self::Bootstrap(_) => {}
        }
        self
    }

    /// Human-readable report, quoting the offending source line when the
    /// position is known:
    ///
    /// ```text
    /// Line 3, Col 12, 'return 1/0': Division by zero.
    /// ```
    pub fn diagnostic(&self, source: &str) -> String {
        match self.pos() {
            Some(pos) => {
                let line = source
                    .lines()
                    .nth(pos.line.saturating_sub(1))
                    .unwrap_or("");
                format!("Line {}, Col {}, '{}': {self}.", pos.line, pos.col, line)
            }
            None => format!("{self}."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_message_lists_params() {
        let err = CompileError::Arity {
            function: "clamp".into(),
            params: vec!["current".into(), "min".into(), "max".into()],
            got: 1,
            pos: None,
        };
        assert_eq!(
            err.to_string(),
            "Function `clamp' expects 3 arguments: `current, min, max', got 1"
        );
    }

    #[test]
    fn arity_message_without_params() {
        let err = CompileError::Arity {
            function: "gyroX".into(),
            params: vec![],
            got: 2,
            pos: None,
        };
        assert_eq!(err.to_string(), "Function `gyroX' expects 0 arguments, got 2");
    }

    #[test]
    fn diagnostic_quotes_line() {
        let src = "function main()\n  return 1/0\n";
        let err = CompileError::arithmetic("Division by zero").at(Pos::new(2, 11));
        assert_eq!(
            err.diagnostic(src),
            "Line 2, Col 11, '  return 1/0': Division by zero."
        );
    }

    #[test]
    fn diagnostic_without_position() {
        let err = CompileError::declaration("Missing required function declaration: `main'", None);
        assert_eq!(
            err.diagnostic(""),
            "Missing required function declaration: `main'."
        );
    }

    #[test]
    fn at_keeps_first_position() {
        let err = CompileError::arithmetic("Division by zero")
            .at(Pos::new(1, 2))
            .at(Pos::new(5, 6));
        assert_eq!(err.pos(), Some(Pos::new(1, 2)));
    }
}
