//! Closed-form script parser, inliner and folder.
//!
//! Grammar (lowest → highest precedence):
//!
//! ```text
//! program    = function { function }
//! function   = [keyword] ID "(" [ID {[","] ID}] ")" [":" | "{"]
//!              { ID "=" expression } "return" expression ["}"]
//! expression = or
//! or         = and { ("||" | "or") and }
//! and        = equality { ("&&" | "and") equality }
//! equality   = relational { ("==" | "=" | "!=" | "<>") relational }
//! relational = additive { ("<=" | ">=" | "<:" | ">:" | "<" | ">") additive }
//! additive   = multiplicative { ("+" | "-") multiplicative }
//! multiplicative = exponent { ("*" | "/" | "%") exponent }
//! exponent   = unary [ "^" exponent ]
//! unary      = ("-" | "!" | "not") unary | primary
//! primary    = "(" expression ")"
//!            | "if" "(" expression ("?" | ",") expression [(":" | ",") expression] ")"
//!            | ID "(" [expression {[","] expression}] ")"
//!            | ID | NUMBER | TAG
//! ```
//!
//! `^` always goes through `exp(log(a)*b)`, so a literal power folds to the
//! same value, and fails on the same bases, as the emitted formula would at
//! run time.  `<:` and `>:` compare floats exactly; `<` and `>` are biased
//! for integer operands.
//!
//! There is no separate optimisation pass: each operator application folds
//! as soon as its operands are literals, and every call to a compiled
//! function is inlined on the spot.  Operators with no arithmetic
//! counterpart are lowered by inlining the matching library function.

use std::collections::HashMap;

use tracing::{debug, trace};

use super::builtins::{FunctionDef, FunctionTable};
use super::error::{CompileError, Pos};
use super::expr::{self, BinOp, Expr};
use super::lexer::{Op, Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    functions: FunctionTable,
    consts: HashMap<(String, String), Expr>,
    /// Function whose body is being parsed.
    function: String,
    fold: bool,
    lenient: bool,
}

impl Parser {
    pub fn new(functions: FunctionTable, tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            pos: 0,
            functions,
            consts: HashMap::new(),
            function: String::new(),
            fold: true,
            lenient: false,
        }
    }

    pub fn with_folding(mut self, fold: bool) -> Self {
        self.fold = fold;
        self
    }

    /// Leave unbound const placeholders in place instead of failing.
    pub fn with_lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    pub fn into_functions(self) -> FunctionTable {
        self.functions
    }

    // ── Token helpers ─────────────────────────────────────────────────────────

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> &Token {
        let idx = (self.pos + n).min(self.tokens.len().saturating_sub(1));
        &self.tokens[idx]
    }

    fn here(&self) -> Pos {
        self.peek().pos()
    }

    fn at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if !self.at_end() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, op: Op) -> bool {
        self.peek().kind == TokenKind::Op(op)
    }

    fn eat(&mut self, op: Op) -> bool {
        if self.check(op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn check_word(&self, word: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Ident(s) if s == word)
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if self.check_word(word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, op: Op) -> Result<(), CompileError> {
        if self.eat(op) {
            Ok(())
        } else {
            Err(CompileError::syntax(
                format!("Expected `{}', saw {}", op.text(), self.peek().kind),
                self.here(),
            ))
        }
    }

    fn expect_one_of(&mut self, ops: &[Op]) -> Result<Op, CompileError> {
        for &op in ops {
            if self.eat(op) {
                return Ok(op);
            }
        }
        let wanted: Vec<String> = ops.iter().map(|op| format!("`{}'", op.text())).collect();
        Err(CompileError::syntax(
            format!("Expected one of {}; saw {}", wanted.join(", "), self.peek().kind),
            self.here(),
        ))
    }

    fn expect_word(&mut self, word: &str) -> Result<(), CompileError> {
        if self.eat_word(word) {
            Ok(())
        } else {
            Err(CompileError::syntax(
                format!("Expected `{word}', saw {}", self.peek().kind),
                self.here(),
            ))
        }
    }

    fn expect_ident(&mut self) -> Result<String, CompileError> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            other => Err(CompileError::syntax(
                format!("Expected IDENTIFIER, saw {}", other.category()),
                self.here(),
            )),
        }
    }

    // ── Program structure ─────────────────────────────────────────────────────

    pub fn parse_program(&mut self) -> Result<(), CompileError> {
        loop {
            self.parse_function()?;
            if self.at_end() {
                return Ok(());
            }
        }
    }

    fn parse_function(&mut self) -> Result<(), CompileError> {
        // optional leading keyword, e.g. `function`
        if matches!(self.peek().kind, TokenKind::Ident(_))
            && matches!(self.peek_at(1).kind, TokenKind::Ident(_))
        {
            self.advance();
        }

        let name_pos = self.here();
        let name = self.expect_ident()?;
        if self.functions.contains(&name) {
            return Err(CompileError::declaration(
                format!("Duplicate function declaration for `{name}'"),
                Some(name_pos),
            ));
        }
        self.function = name.clone();

        self.expect(Op::LParen)?;
        let mut params: Vec<String> = Vec::new();
        while !self.eat(Op::RParen) {
            let param_pos = self.here();
            let param = self.expect_ident()?;
            if params.contains(&param) {
                return Err(CompileError::declaration(
                    format!("Duplicate parameter `{param}' in function `{name}'"),
                    Some(param_pos),
                ));
            }
            params.push(param);
            self.eat(Op::Comma);
        }

        if name == "main" && !params.is_empty() {
            return Err(CompileError::declaration(
                "Function `main' must not require arguments",
                Some(name_pos),
            ));
        }

        if !self.eat(Op::Colon) {
            self.eat(Op::LBrace);
        }
        while !self.eat_word("return") {
            self.parse_statement()?;
        }
        let body = self.parse_expression()?;
        self.eat(Op::RBrace);

        debug!(function = %name, ?params, "compiled function");
        trace!(function = %name, ?body, "function body");
        self.functions.insert(FunctionDef {
            name,
            params,
            body: Some(body),
        });
        Ok(())
    }

    fn parse_statement(&mut self) -> Result<(), CompileError> {
        if self.at_end() {
            return self.expect_word("return");
        }
        let name_pos = self.here();
        let name = self.expect_ident()?;
        self.expect(Op::Eq)?;
        let value = self.parse_expression()?;

        let key = (self.function.clone(), name);
        if self.consts.contains_key(&key) {
            return Err(CompileError::declaration(
                format!(
                    "Duplicate const declaration for `{}' in function `{}'",
                    key.1, key.0
                ),
                Some(name_pos),
            ));
        }
        trace!(function = %key.0, name = %key.1, ?value, "const defined");
        self.consts.insert(key, value);
        Ok(())
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    pub fn parse_expression(&mut self) -> Result<Expr, CompileError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_and()?;
        loop {
            let pos = self.here();
            if !(self.eat(Op::OrOr) || self.eat_word("or")) {
                return Ok(lhs);
            }
            let rhs = self.parse_and()?;
            lhs = self.apply("__or", vec![lhs, rhs], pos)?;
        }
    }

    fn parse_and(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_equality()?;
        loop {
            let pos = self.here();
            if !(self.eat(Op::AndAnd) || self.eat_word("and")) {
                return Ok(lhs);
            }
            let rhs = self.parse_equality()?;
            lhs = self.apply("__and", vec![lhs, rhs], pos)?;
        }
    }

    fn parse_equality(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_relational()?;
        loop {
            let pos = self.here();
            let lowering = match self.peek().kind {
                TokenKind::Op(Op::EqEq | Op::Eq) => "__eq",
                TokenKind::Op(Op::Ne | Op::LtGt) => "__ne",
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_relational()?;
            lhs = self.apply(lowering, vec![lhs, rhs], pos)?;
        }
    }

    fn parse_relational(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let pos = self.here();
            let lowering = match self.peek().kind {
                TokenKind::Op(Op::Le) => "__le",
                TokenKind::Op(Op::Ge) => "__ge",
                TokenKind::Op(Op::Lt) => "__lt",
                TokenKind::Op(Op::Gt) => "__gt",
                TokenKind::Op(Op::LtStrict) => "__lts",
                TokenKind::Op(Op::GtStrict) => "__gts",
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = self.apply(lowering, vec![lhs, rhs], pos)?;
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let pos = self.here();
            let op = match self.peek().kind {
                TokenKind::Op(Op::Plus) => BinOp::Add,
                TokenKind::Op(Op::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = expr::binary(op, lhs, rhs, self.fold).map_err(|e| e.at(pos))?;
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_exponent()?;
        loop {
            let pos = self.here();
            let op = match self.peek().kind {
                TokenKind::Op(Op::Star) => BinOp::Mul,
                TokenKind::Op(Op::Slash) => BinOp::Div,
                TokenKind::Op(Op::Percent) => {
                    self.advance();
                    let rhs = self.parse_exponent()?;
                    lhs = match (self.fold, lhs.as_num(), rhs.as_num()) {
                        (true, Some(a), Some(b)) => {
                            Expr::Num(expr::modulo(a, b).map_err(|e| e.at(pos))?)
                        }
                        _ => self.apply("__mod", vec![lhs, rhs], pos)?,
                    };
                    continue;
                }
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_exponent()?;
            lhs = expr::binary(op, lhs, rhs, self.fold).map_err(|e| e.at(pos))?;
        }
    }

    fn parse_exponent(&mut self) -> Result<Expr, CompileError> {
        let base = self.parse_unary()?;
        let pos = self.here();
        if !self.eat(Op::Caret) {
            return Ok(base);
        }
        let exponent = self.parse_exponent()?;
        self.apply("__pow", vec![base, exponent], pos)
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        let pos = self.here();
        if self.eat(Op::Minus) {
            let operand = self.parse_unary()?;
            return expr::negate(operand, self.fold);
        }
        if self.eat(Op::Bang) || self.eat_word("not") {
            let operand = self.parse_unary()?;
            return self.apply("__not", vec![operand], pos);
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        let tok = self.peek().clone();
        let pos = tok.pos();
        match tok.kind {
            TokenKind::Op(Op::LParen) => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(Op::RParen)?;
                Ok(inner)
            }
            TokenKind::Ident(name) => {
                self.advance();
                if name == "if" && self.check(Op::LParen) {
                    self.parse_conditional(pos)
                } else if self.eat(Op::LParen) {
                    self.parse_call(&name, pos)
                } else {
                    Ok(self.resolve_const(&name))
                }
            }
            TokenKind::Int(n) => {
                self.advance();
                Ok(Expr::Num(n as f64))
            }
            TokenKind::Float(x) => {
                self.advance();
                Ok(Expr::Num(x))
            }
            TokenKind::Tag(tag) => {
                self.advance();
                Ok(Expr::Tag(tag))
            }
            other => Err(CompileError::syntax(
                format!("Expected one of `(', IDENTIFIER, NUMBER, TAG; saw {other}"),
                pos,
            )),
        }
    }

    /// `if(b ? t : f)` → `b*(t-f)+f`, `if(b ? t)` → `b*t`.
    fn parse_conditional(&mut self, pos: Pos) -> Result<Expr, CompileError> {
        self.expect(Op::LParen)?;
        let cond = self.parse_expression()?;
        self.expect_one_of(&[Op::Question, Op::Comma])?;
        let then = self.parse_expression()?;
        let value = if self.eat(Op::Colon) || self.eat(Op::Comma) {
            let otherwise = self.parse_expression()?;
            self.apply("__if", vec![cond, then, otherwise], pos)?
        } else {
            self.apply("__when", vec![cond, then], pos)?
        };
        self.expect(Op::RParen)?;
        Ok(value)
    }

    fn parse_call(&mut self, name: &str, pos: Pos) -> Result<Expr, CompileError> {
        if name == self.function {
            return Err(CompileError::declaration(
                format!("Recursive function definition for `{name}'"),
                Some(pos),
            ));
        }
        if !self.functions.contains(name) {
            return Err(CompileError::declaration(
                format!("Missing function declaration for `{name}'"),
                Some(pos),
            ));
        }

        let mut args = Vec::new();
        while !self.eat(Op::RParen) {
            if self.at_end() {
                self.expect(Op::RParen)?;
            }
            args.push(self.parse_expression()?);
            self.eat(Op::Comma);
        }
        self.apply(name, args, pos)
    }

    /// Look up `name` in the current function's const scope, or defer it as a
    /// placeholder to be bound when this function is inlined.
    fn resolve_const(&self, name: &str) -> Expr {
        let key = (self.function.clone(), name.to_owned());
        match self.consts.get(&key) {
            Some(value) => value.clone(),
            None => Expr::constant(&self.function, name),
        }
    }

    /// Apply a declared function to already-compiled arguments: externs
    /// become calls (folded when possible), compiled functions are inlined.
    /// Operators without an arithmetic form come through here too, named by
    /// their library lowering.
    fn apply(&self, name: &str, args: Vec<Expr>, pos: Pos) -> Result<Expr, CompileError> {
        let def = self.functions.get(name).ok_or_else(|| {
            CompileError::declaration(format!("Missing function declaration for `{name}'"), Some(pos))
        })?;
        if args.len() != def.params.len() {
            return Err(CompileError::Arity {
                function: name.to_owned(),
                params: def.params.clone(),
                got: args.len(),
                pos: Some(pos),
            });
        }

        match &def.body {
            None => expr::call(name, args, self.fold).map_err(|e| e.at(pos)),
            Some(body) => {
                trace!(callee = %name, "inlining");
                body.substitute(name, &def.params, &args, self.lenient)
                    .and_then(|e| e.simplify(self.fold))
                    .map_err(|e| e.at(pos))
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
