//! Closed-form expression tree.
//!
//! Every sub-expression produced by the compiler is already in the target
//! grammar: numbers, tags, unary minus, the four arithmetic operators and
//! calls to extern functions.  The one exception is [`Expr::Const`], a
//! placeholder for a const or parameter that is bound later when the owning
//! function is inlined.
//!
//! The constructors here ([`binary`], [`negate`], [`call`]) fold eagerly
//! when every operand is a literal, so literal sub-expressions never survive
//! into later combination steps.

use super::builtins;
use super::error::CompileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    pub fn symbol(self) -> char {
        match self {
            BinOp::Add => '+',
            BinOp::Sub => '-',
            BinOp::Mul => '*',
            BinOp::Div => '/',
        }
    }

    pub fn apply(self, l: f64, r: f64) -> Result<f64, CompileError> {
        let value = match self {
            BinOp::Add => l + r,
            BinOp::Sub => l - r,
            BinOp::Mul => l * r,
            BinOp::Div => {
                if r == 0.0 {
                    return Err(CompileError::arithmetic("Division by zero"));
                }
                l / r
            }
        };
        finite(value, "Arithmetic overflow")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Tag(String),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// Call to an extern function, kept for the runtime evaluator.
    Call(String, Vec<Expr>),
    /// Deferred reference to `name` in the scope of `function`.
    Const { function: String, name: String },
}

impl Expr {
    pub fn constant(function: &str, name: &str) -> Self {
        Expr::Const {
            function: function.to_owned(),
            name: name.to_owned(),
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Expr::Num(x) => Some(*x),
            _ => None,
        }
    }

    /// True if any const placeholder remains anywhere in the tree.
    pub fn has_const(&self) -> bool {
        match self {
            Expr::Num(_) | Expr::Tag(_) => false,
            Expr::Const { .. } => true,
            Expr::Neg(x) => x.has_const(),
            Expr::Binary(_, l, r) => l.has_const() || r.has_const(),
            Expr::Call(_, args) => args.iter().any(Expr::has_const),
        }
    }

    /// Replace every placeholder owned by `callee` with the argument bound to
    /// the parameter of the same name.
    ///
    /// A placeholder naming something that is not a parameter of `callee` is
    /// an error, unless `lenient` is set, in which case it is left in place.
    pub fn substitute(
        &self,
        callee: &str,
        params: &[String],
        args: &[Expr],
        lenient: bool,
    ) -> Result<Expr, CompileError> {
        let sub = |e: &Expr| e.substitute(callee, params, args, lenient);
        Ok(match self {
            Expr::Const { function, name } if function == callee => {
                match params.iter().position(|p| p == name) {
                    Some(idx) => args[idx].clone(),
                    None if lenient => self.clone(),
                    None => return Err(CompileError::unresolved(function, name)),
                }
            }
            Expr::Neg(x) => Expr::Neg(Box::new(sub(x)?)),
            Expr::Binary(op, l, r) => Expr::Binary(*op, Box::new(sub(l)?), Box::new(sub(r)?)),
            Expr::Call(name, call_args) => Expr::Call(
                name.clone(),
                call_args.iter().map(sub).collect::<Result<_, _>>()?,
            ),
            Expr::Num(_) | Expr::Tag(_) | Expr::Const { .. } => self.clone(),
        })
    }

    /// Re-normalize a tree after substitution: rebuild it bottom-up through
    /// the folding constructors so that newly literal sub-expressions
    /// collapse, transitively through every level of inlining.
    pub fn simplify(self, fold: bool) -> Result<Expr, CompileError> {
        match self {
            Expr::Neg(x) => negate(x.simplify(fold)?, fold),
            Expr::Binary(op, l, r) => binary(op, l.simplify(fold)?, r.simplify(fold)?, fold),
            Expr::Call(name, args) => {
                let args = args
                    .into_iter()
                    .map(|a| a.simplify(fold))
                    .collect::<Result<Vec<_>, _>>()?;
                call(&name, args, fold)
            }
            leaf => Ok(leaf),
        }
    }
}

fn finite(value: f64, message: &str) -> Result<f64, CompileError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CompileError::arithmetic(message))
    }
}

// ── Folding constructors ──────────────────────────────────────────────────────

pub fn binary(op: BinOp, l: Expr, r: Expr, fold: bool) -> Result<Expr, CompileError> {
    if fold {
        if let (Some(a), Some(b)) = (l.as_num(), r.as_num()) {
            return Ok(Expr::Num(op.apply(a, b)?));
        }
    }
    Ok(Expr::Binary(op, Box::new(l), Box::new(r)))
}

pub fn negate(x: Expr, fold: bool) -> Result<Expr, CompileError> {
    match x {
        Expr::Num(v) if fold => Ok(Expr::Num(if v == 0.0 { 0.0 } else { -v })),
        other => Ok(Expr::Neg(Box::new(other))),
    }
}

/// Build a call to an extern, evaluating it now if it is foldable and every
/// argument is a literal.
pub fn call(name: &str, args: Vec<Expr>, fold: bool) -> Result<Expr, CompileError> {
    if fold {
        let literals: Option<Vec<f64>> = args.iter().map(Expr::as_num).collect();
        if let Some(values) = literals {
            if let Some(result) = builtins::eval_extern(name, &values) {
                return result.map(Expr::Num);
            }
        }
    }
    Ok(Expr::Call(name.to_owned(), args))
}

/// Floored modulo on literals, matching the `a - b*floor(a/b)` lowering.
pub fn modulo(a: f64, b: f64) -> Result<f64, CompileError> {
    if b == 0.0 {
        return Err(CompileError::arithmetic("Modulo by zero"));
    }
    finite(a - b * (a / b).floor(), "Arithmetic overflow")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
