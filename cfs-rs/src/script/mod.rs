//! Closed-form script compiler.
//!
//! Compiles a small C-like language (functions, consts, arithmetic,
//! comparisons, boolean logic, conditionals, `#tag#` sensor references) into
//! a single arithmetic expression for evaluators that have no branching or
//! comparison operators:
//!
//! - [`lexer`] turns source text into tokens
//! - [`builtins`] holds the extern catalog and the library of lowerings
//! - [`parser`] parses, inlines and folds each function in turn
//! - [`render`] prints the compiled `main`
//!
//! # Quick start
//!
//! ```rust
//! use cfs::config::Options;
//! use cfs::script::compile;
//!
//! let src = "function double(x) return x*2\nfunction main() return double(10)";
//! assert_eq!(compile(src, &Options::default()).unwrap(), "(20)");
//!
//! let src = "function main() return if (#gyro# > 0 ? 1 : -1)";
//! assert!(compile(src, &Options::default()).unwrap().contains("#gyro#"));
//! ```

pub mod builtins;
pub mod error;
pub mod expr;
pub mod lexer;
pub mod parser;
pub mod render;

use tracing::debug;

use crate::config::Options;

pub use error::{CompileError, Pos};
pub use expr::Expr;

/// Compile `source` and return the expression for its `main` function.
pub fn compile_main(source: &str, opts: &Options) -> Result<Expr, CompileError> {
    let functions = builtins::catalog()?.clone();
    let tokens = lexer::tokenize(source)?;
    debug!(tokens = tokens.len(), "lexed source");

    let mut parser = parser::Parser::new(functions, tokens).with_lenient(opts.lenient);
    parser.parse_program()?;

    let main = parser
        .into_functions()
        .get("main")
        .and_then(|def| def.body.clone())
        .ok_or_else(|| {
            CompileError::declaration("Missing required function declaration: `main'", None)
        })?;
    debug!(?main, "compiled main");
    Ok(main)
}

/// Compile `source` to closed-form text.
pub fn compile(source: &str, opts: &Options) -> Result<String, CompileError> {
    let main = compile_main(source, opts)?;
    render::render(&main, opts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> Result<String, CompileError> {
        compile(src, &Options::default())
    }

    #[test]
    fn literal_arithmetic() {
        assert_eq!(run("function main() return 2 + 3 * 4").unwrap(), "(14)");
    }

    #[test]
    fn conditional_folds() {
        assert_eq!(run("function main() return if (5 > 3 ? 1 : 0)").unwrap(), "(1)");
    }

    #[test]
    fn inlined_call() {
        let src = "function double(x) return x*2\nfunction main() return double(10)";
        assert_eq!(run(src).unwrap(), "(20)");
    }

    #[test]
    fn tags_pass_through() {
        assert_eq!(run("function main() return #DWE# * 2").unwrap(), "(#DWE#*2)");
        assert_eq!(
            run("function main() return -sqrt(#a# + 1)").unwrap(),
            "(-sqrt(#a#+1))"
        );
    }

    #[test]
    fn power_lowers_for_runtime_operands() {
        assert_eq!(
            run("function main() return #x# ^ 2").unwrap(),
            "(exp(log(#x#)*2))"
        );
    }

    #[test]
    fn missing_main() {
        let err = run("function f() return 1").unwrap_err();
        assert_eq!(err.to_string(), "Missing required function declaration: `main'");
        assert_eq!(err.pos(), None);
    }

    #[test]
    fn unresolved_main_const() {
        let err = run("function main() return x + 1").unwrap_err();
        assert!(matches!(err, CompileError::UnresolvedConst { .. }));
        let lenient = Options {
            lenient: true,
            ..Options::default()
        };
        assert_eq!(compile("function main() return x + 1", &lenient).unwrap(), "(x+1)");
    }

    #[test]
    fn division_by_zero_diagnostic() {
        let src = "function main()\n  return 1/0";
        let err = run(src).unwrap_err();
        assert_eq!(
            err.diagnostic(src),
            "Line 2, Col 11, '  return 1/0': Division by zero."
        );
    }

    #[test]
    fn undeclared_function_diagnostic() {
        let src = "function main() return foo(1)";
        let err = run(src).unwrap_err();
        assert_eq!(
            err.diagnostic(src),
            "Line 1, Col 24, 'function main() return foo(1)': \
             Missing function declaration for `foo'."
        );
    }

    #[test]
    fn output_is_a_fixpoint() {
        let src = "function main() return if (#a# >= 2 ? #b# : -#c#) - 3 * -#d#";
        let once = run(src).unwrap();
        let twice = run(&format!("function main() return {once}")).unwrap();
        assert_eq!(once, twice);
    }
}
