//! Builtin function catalog.
//!
//! Two kinds of builtin:
//!
//! - **extern** functions are provided by the runtime evaluator.  They have a
//!   fixed parameter list and no body; calls are emitted verbatim unless the
//!   function is foldable and every argument is a literal.
//! - **library** functions are written in closed-form script itself and are
//!   compiled once, before any user source is read.  The operator lowerings
//!   (`<`, `==`, `&&`, `if(…)`, `%`, `^`, …) live here so that they inline
//!   and fold like any user function.

use std::collections::HashMap;
use std::sync::OnceLock;

use tracing::debug;

use super::error::CompileError;
use super::expr::Expr;
use super::lexer;
use super::parser::Parser;

/// A declared function.  `body == None` marks an extern.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Option<Expr>,
}

impl FunctionDef {
    pub fn is_extern(&self) -> bool {
        self.body.is_none()
    }
}

/// Append-only table of declared functions.
#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    defs: HashMap<String, FunctionDef>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table holding only the extern functions.
    pub fn with_externs() -> Self {
        let mut table = Self::new();
        for (name, params) in EXTERNS {
            table.insert(FunctionDef {
                name: (*name).to_owned(),
                params: params.iter().map(|p| (*p).to_owned()).collect(),
                body: None,
            });
        }
        table
    }

    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.defs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    /// Insert a new definition.  Existing entries are never replaced; returns
    /// `false` if `def.name` was already declared.
    pub fn insert(&mut self, def: FunctionDef) -> bool {
        if self.defs.contains_key(&def.name) {
            return false;
        }
        self.defs.insert(def.name.clone(), def);
        true
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

// ── Externs ───────────────────────────────────────────────────────────────────

const EXTERNS: &[(&str, &[&str])] = &[
    ("rand", &["min", "max"]),
    ("stRand", &["min", "max"]),
    ("wakeRand", &["min", "max"]),
    ("abs", &["number"]),
    ("sin", &["number"]),
    ("cos", &["number"]),
    ("tan", &["number"]),
    ("asin", &["number"]),
    ("acos", &["number"]),
    ("atan", &["number"]),
    ("sinh", &["number"]),
    ("cosh", &["number"]),
    ("tanh", &["number"]),
    ("round", &["number"]),
    ("ceil", &["number"]),
    ("floor", &["number"]),
    ("log", &["number"]),
    ("log2", &["number"]),
    ("log10", &["number"]),
    ("sqrt", &["number"]),
    ("cbrt", &["number"]),
    ("exp", &["number"]),
    ("expm1", &["number"]),
    ("deg", &["radians"]),
    ("rad", &["degrees"]),
    ("clamp", &["current", "min", "max"]),
    ("squareWave", &["current", "amplitude", "period", "xOffset"]),
    ("interpAccel", &["current", "min", "max", "accelerationFactor"]),
    ("interpDecel", &["current", "min", "max", "accelerationFactor"]),
    ("interpAccelDecel", &["current", "min", "max"]),
    ("gyroX", &[]),
    ("gyroY", &[]),
    ("accelerometerX", &[]),
    ("accelerometerY", &[]),
    ("gyroRawX", &[]),
    ("gyroRawY", &[]),
    ("accelerometerRawX", &[]),
    ("accelerometerRawY", &[]),
];

/// Evaluate a foldable extern on literal arguments.
///
/// Returns `None` if `name` is not in the foldable subset (the call must be
/// left for the runtime evaluator).  A NaN or infinite result is an error.
pub fn eval_extern(name: &str, args: &[f64]) -> Option<Result<f64, CompileError>> {
    let [x] = args else { return None };
    let x = *x;
    let value = match name {
        "abs" => x.abs(),
        "sin" => x.sin(),
        "cos" => x.cos(),
        "tan" => x.tan(),
        "asin" => x.asin(),
        "acos" => x.acos(),
        "atan" => x.atan(),
        "sinh" => x.sinh(),
        "cosh" => x.cosh(),
        "tanh" => x.tanh(),
        "round" => x.round(),
        "ceil" => x.ceil(),
        "floor" => x.floor(),
        "log" => x.ln(),
        "log2" => x.log2(),
        "log10" => x.log10(),
        "sqrt" => x.sqrt(),
        "cbrt" => x.cbrt(),
        "exp" => x.exp(),
        "expm1" => x.exp_m1(),
        "deg" => x.to_degrees(),
        "rad" => x.to_radians(),
        _ => return None,
    };
    Some(if value.is_finite() {
        Ok(value)
    } else {
        Err(CompileError::arithmetic(format!(
            "Invalid argument for function `{name}': {x}"
        )))
    })
}

// ── Library ───────────────────────────────────────────────────────────────────

/// Library source.  Order matters: a function may only use functions (and
/// operators) lowered by entries above it.
const LIBRARY: &str = r#"
// degree-based trigonometry
function asind(x) return deg(asin(x))
function acosd(x) return deg(acos(x))
function atand(x) return deg(atan(x))
function sind(angle) return sin(rad(angle))
function cosd(angle) return cos(rad(angle))
function tand(angle) return tan(rad(angle))

// sign helpers; sign and signn are biased for integer comparisons,
// signf is exact and undefined at zero
function signf(x) return abs(x) / x
function sign(i) return signf(i + 0.5)
function signn(i) return signf(i - 0.5)
function int(x) return floor(x) + (1 - sign(floor(x))) / 2

// operator lowerings
function __le(l, r) return (1 - signn(l - r)) / 2
function __ge(l, r) return (1 + sign(l - r)) / 2
function __lt(l, r) return (1 - sign(l - r)) / 2
function __gt(l, r) return (1 + signn(l - r)) / 2
function __lts(l, r) return (1 - signf(l - r)) / 2
function __gts(l, r) return (1 + signf(l - r)) / 2
function __eq(l, r) return (l >= r) * (l <= r)
function __ne(l, r) return (4 - (1 + sign(l - r)) * (1 - signn(l - r))) / 4
function __and(a, b) return a * b
function __or(a, b) return 1 - (1 - a) * (1 - b)
function __not(a) return 1 - a
function __if(b, t, f) return b * (t - f) + f
function __when(b, t) return b * t
function __mod(a, b) return a - b * floor(a / b)
function __pow(a, b) return exp(log(a) * b)

function atan2(y, x) return atan(y / x) + (x <: 0) * signf(y) * pi
function atan2d(y, x) return deg(atan2(y, x))
"#;

fn bootstrap() -> Result<FunctionTable, CompileError> {
    let tokens = lexer::tokenize(LIBRARY)?;
    let mut parser = Parser::new(FunctionTable::with_externs(), tokens).with_folding(false);
    parser.parse_program()?;
    let table = parser.into_functions();
    debug!(functions = table.len(), "builtin catalog ready");
    Ok(table)
}

/// The process-wide builtin catalog, compiled on first use.
pub fn catalog() -> Result<&'static FunctionTable, CompileError> {
    static CATALOG: OnceLock<Result<FunctionTable, String>> = OnceLock::new();
    CATALOG
        .get_or_init(|| bootstrap().map_err(|e| e.diagnostic(LIBRARY)))
        .as_ref()
        .map_err(|msg| CompileError::Bootstrap(msg.clone()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_bootstraps() {
        let table = catalog().expect("library must compile");
        assert_eq!(table.len(), EXTERNS.len() + 27);
        assert!(table.get("abs").unwrap().is_extern());
        assert!(!table.get("atan2").unwrap().is_extern());
    }

    #[test]
    fn library_bodies_reference_their_params() {
        let table = catalog().unwrap();
        let signf = table.get("signf").unwrap();
        assert_eq!(signf.params, vec!["x".to_string()]);
        assert!(signf.body.as_ref().unwrap().has_const());
    }

    #[test]
    fn library_bodies_are_inlined() {
        // sign calls signf, which must already be expanded into abs(...)/(...)
        let table = catalog().unwrap();
        let body = table.get("sign").unwrap().body.clone().unwrap();
        match body {
            Expr::Binary(_, l, _) => assert!(matches!(*l, Expr::Call(ref n, _) if n == "abs")),
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn insert_never_replaces() {
        let mut table = FunctionTable::with_externs();
        let def = FunctionDef {
            name: "abs".into(),
            params: vec![],
            body: Some(Expr::Num(1.0)),
        };
        assert!(!table.insert(def));
        assert!(table.get("abs").unwrap().is_extern());
    }

    #[test]
    fn eval_foldable() {
        assert_eq!(eval_extern("sqrt", &[9.0]).unwrap().unwrap(), 3.0);
        assert_eq!(eval_extern("deg", &[std::f64::consts::PI]).unwrap().unwrap(), 180.0);
        assert_eq!(eval_extern("round", &[2.5]).unwrap().unwrap(), 3.0);
    }

    #[test]
    fn eval_not_foldable() {
        assert!(eval_extern("rand", &[0.0, 1.0]).is_none());
        assert!(eval_extern("clamp", &[0.5, 0.0, 1.0]).is_none());
        assert!(eval_extern("gyroX", &[]).is_none());
    }

    #[test]
    fn eval_domain_errors() {
        assert!(eval_extern("asin", &[2.0]).unwrap().is_err());
        assert!(eval_extern("log10", &[0.0]).unwrap().is_err());
        assert!(eval_extern("exp", &[1000.0]).unwrap().is_err());
    }
}
