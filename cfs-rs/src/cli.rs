//! Command-line interface.
//!
//! Usage:
//!   cfs compile <source> [-o <dest>] [-d] [-m] [--precision <n>]
//!   cfs -V | --version

use std::fs;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::config::Options;
use crate::script::{self, CompileError};

// ── Public types ──────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "cfs", version)]
#[command(about = "Compile closed-form scripts into single arithmetic expressions")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compile a source file to stdout or to a destination file.
    Compile(CompileArgs),
}

#[derive(Debug, Args)]
pub struct CompileArgs {
    /// Script to compile.
    pub source: PathBuf,

    /// Write the expression here instead of stdout.
    #[arg(short = 'o', long = "output")]
    pub dest: Option<PathBuf>,

    /// Trace every compilation step on stderr.
    #[arg(short, long)]
    pub debug: bool,

    /// Emit unbound consts by name instead of failing.
    #[arg(short = 'm', long)]
    pub allow_missing_const: bool,

    /// Round numeric literals to this many fractional digits.
    #[arg(long, env = "CFS_PRECISION")]
    pub precision: Option<usize>,
}

impl Cli {
    pub fn debug(&self) -> bool {
        match &self.command {
            Command::Compile(args) => args.debug,
        }
    }
}

impl CompileArgs {
    pub fn options(&self) -> Options {
        Options {
            lenient: self.allow_missing_const,
            precision: self.precision,
        }
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse a slice of argument strings, program name excluded (exposed for
/// testing).
pub fn parse_argv(argv: &[String]) -> Result<Cli, String> {
    Cli::try_parse_from(std::iter::once("cfs".to_owned()).chain(argv.iter().cloned()))
        .map_err(|e| e.to_string())
}

// ── Driver ────────────────────────────────────────────────────────────────────

/// Execute a parsed command line.  On failure the returned message is the
/// full diagnostic, ready to print.
pub fn run(cli: &Cli) -> Result<(), String> {
    match &cli.command {
        Command::Compile(args) => compile(args),
    }
}

fn compile(args: &CompileArgs) -> Result<(), String> {
    let source = fs::read_to_string(&args.source).map_err(|source| {
        CompileError::Read {
            path: args.source.clone(),
            source,
        }
        .diagnostic("")
    })?;

    let output = script::compile(&source, &args.options()).map_err(|e| e.diagnostic(&source))?;

    match &args.dest {
        Some(dest) => {
            fs::write(dest, format!("{output}\n")).map_err(|source| {
                CompileError::Write {
                    path: dest.clone(),
                    source,
                }
                .diagnostic("")
            })?;
            info!(dest = %dest.display(), bytes = output.len(), "wrote expression");
        }
        None => println!("{output}"),
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|&s| s.to_owned()).collect()
    }

    fn compile_args(args: &[&str]) -> CompileArgs {
        match parse_argv(&argv(args)).unwrap().command {
            Command::Compile(a) => a,
        }
    }

    #[test]
    fn source_only() {
        let a = compile_args(&["compile", "prog.cfs"]);
        assert_eq!(a.source, PathBuf::from("prog.cfs"));
        assert_eq!(a.dest, None);
        assert!(!a.debug);
        assert!(!a.allow_missing_const);
    }

    #[test]
    fn destination() {
        let a = compile_args(&["compile", "prog.cfs", "-o", "out.txt"]);
        assert_eq!(a.dest, Some(PathBuf::from("out.txt")));
        let a = compile_args(&["compile", "--output", "out.txt", "prog.cfs"]);
        assert_eq!(a.dest, Some(PathBuf::from("out.txt")));
    }

    #[test]
    fn bool_flags() {
        let a = compile_args(&["compile", "-d", "-m", "prog.cfs"]);
        assert!(a.debug);
        assert!(a.allow_missing_const);
        assert!(a.options().lenient);
    }

    #[test]
    fn combined_bool_flags() {
        let a = compile_args(&["compile", "-dm", "prog.cfs"]);
        assert!(a.debug && a.allow_missing_const);
    }

    #[test]
    fn long_flags() {
        let a = compile_args(&["compile", "--debug", "--allow-missing-const", "prog.cfs"]);
        assert!(a.debug && a.allow_missing_const);
    }

    #[test]
    fn precision() {
        let a = compile_args(&["compile", "--precision", "6", "prog.cfs"]);
        assert_eq!(a.options().precision, Some(6));
    }

    #[test]
    fn debug_accessor() {
        let cli = parse_argv(&argv(&["compile", "-d", "prog.cfs"])).unwrap();
        assert!(cli.debug());
    }

    #[test]
    fn missing_source() {
        assert!(parse_argv(&argv(&["compile"])).is_err());
    }

    #[test]
    fn missing_subcommand() {
        assert!(parse_argv(&argv(&[])).is_err());
    }

    #[test]
    fn unknown_flag() {
        assert!(parse_argv(&argv(&["compile", "-z", "prog.cfs"])).is_err());
    }
}
