//! Closed-form text output.

use super::error::CompileError;
use super::expr::Expr;
use crate::config::Options;

/// Render a compiled expression as one closed-form formula, wrapped in an
/// outer pair of parentheses.
pub fn render(expr: &Expr, opts: &Options) -> Result<String, CompileError> {
    let mut out = String::from("(");
    write_expr(&mut out, expr, opts)?;
    out.push(')');
    Ok(out)
}

fn write_expr(out: &mut String, expr: &Expr, opts: &Options) -> Result<(), CompileError> {
    match expr {
        Expr::Num(v) => out.push_str(&format_number(*v, opts.precision)),
        Expr::Tag(tag) => out.push_str(tag),
        Expr::Neg(x) => {
            out.push('-');
            write_operand(out, x, opts)?;
        }
        Expr::Binary(op, l, r) => {
            write_operand(out, l, opts)?;
            out.push(op.symbol());
            write_operand(out, r, opts)?;
        }
        Expr::Call(name, args) => {
            out.push_str(name);
            out.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_expr(out, arg, opts)?;
            }
            out.push(')');
        }
        Expr::Const { function, name } => {
            if !opts.lenient {
                return Err(CompileError::unresolved(function, name));
            }
            out.push_str(name);
        }
    }
    Ok(())
}

/// Operands of `-` and the binary operators are parenthesized unless they
/// are atomic.
fn write_operand(out: &mut String, expr: &Expr, opts: &Options) -> Result<(), CompileError> {
    let atomic = match expr {
        Expr::Num(v) => *v >= 0.0,
        Expr::Tag(_) | Expr::Call(..) | Expr::Const { .. } => true,
        Expr::Neg(_) | Expr::Binary(..) => false,
    };
    if atomic {
        write_expr(out, expr, opts)
    } else {
        out.push('(');
        write_expr(out, expr, opts)?;
        out.push(')');
        Ok(())
    }
}

/// Fixed-point rendering, never in exponent notation.
///
/// Without a `precision` the text is the shortest that parses back to
/// `value`.  With one, the value is rounded to that many fractional digits
/// and trailing zeros are dropped.
pub fn format_number(value: f64, precision: Option<usize>) -> String {
    let mut text = match precision {
        None => format!("{value}"),
        Some(digits) => {
            let mut text = format!("{value:.digits$}");
            if text.contains('.') {
                let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
                text.truncate(trimmed);
            }
            text
        }
    };
    if text == "-0" {
        text = "0".to_owned();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::expr::BinOp;

    fn opts() -> Options {
        Options::default()
    }

    fn bin(op: BinOp, l: Expr, r: Expr) -> Expr {
        Expr::Binary(op, Box::new(l), Box::new(r))
    }

    #[test]
    fn numbers() {
        assert_eq!(format_number(14.0, None), "14");
        assert_eq!(format_number(0.25, None), "0.25");
        assert_eq!(format_number(-3.5, None), "-3.5");
        assert_eq!(format_number(-0.0, None), "0");
        assert_eq!(format_number(123456.7, None), "123456.7");
        assert_eq!(format_number(1e21, None), "1000000000000000000000");
    }

    #[test]
    fn tiny_numbers_keep_their_value() {
        let text = format_number(1e-20, None);
        assert_eq!(text, "0.00000000000000000001");
        assert_eq!(text.parse::<f64>().unwrap(), 1e-20);
        assert_eq!(format_number(1e-16, None), "0.0000000000000001");
        let third = 1.0 / 3.0;
        assert_eq!(format_number(third, None).parse::<f64>().unwrap(), third);
    }

    #[test]
    fn explicit_precision_rounds() {
        assert_eq!(format_number(std::f64::consts::PI, Some(4)), "3.1416");
        assert_eq!(format_number(1.23456, Some(2)), "1.23");
        assert_eq!(format_number(2.0, Some(6)), "2");
        assert_eq!(format_number(-1e-9, Some(3)), "0");
    }

    #[test]
    fn small_literals_survive_compilation() {
        let src = "function main() return #x# * 0.0000000000000001";
        let out = crate::script::compile(src, &opts()).unwrap();
        assert_eq!(out, "(#x#*0.0000000000000001)");
    }

    #[test]
    fn literal_output_is_wrapped() {
        assert_eq!(render(&Expr::Num(14.0), &opts()).unwrap(), "(14)");
        assert_eq!(render(&Expr::Num(-1.0), &opts()).unwrap(), "(-1)");
    }

    #[test]
    fn operands_are_parenthesized_when_compound() {
        let e = bin(
            BinOp::Mul,
            bin(BinOp::Add, Expr::Tag("#a#".into()), Expr::Num(1.0)),
            Expr::Num(-2.0),
        );
        assert_eq!(render(&e, &opts()).unwrap(), "((#a#+1)*(-2))");
    }

    #[test]
    fn right_operand_keeps_grouping() {
        let e = bin(
            BinOp::Sub,
            Expr::Tag("#a#".into()),
            bin(BinOp::Sub, Expr::Tag("#b#".into()), Expr::Num(1.0)),
        );
        assert_eq!(render(&e, &opts()).unwrap(), "(#a#-(#b#-1))");
    }

    #[test]
    fn negation_and_calls() {
        let call = Expr::Call(
            "clamp".into(),
            vec![Expr::Tag("#x#".into()), Expr::Num(-1.0), Expr::Num(1.0)],
        );
        assert_eq!(render(&call, &opts()).unwrap(), "(clamp(#x#,-1,1))");
        let neg = Expr::Neg(Box::new(Expr::Call("gyroX".into(), vec![])));
        assert_eq!(render(&neg, &opts()).unwrap(), "(-gyroX())");
        let nested = Expr::Neg(Box::new(Expr::Neg(Box::new(Expr::Tag("#x#".into())))));
        assert_eq!(render(&nested, &opts()).unwrap(), "(-(-#x#))");
    }

    #[test]
    fn unresolved_const() {
        let e = bin(BinOp::Add, Expr::constant("main", "x"), Expr::Num(1.0));
        let err = render(&e, &opts()).unwrap_err();
        assert!(matches!(err, CompileError::UnresolvedConst { .. }));

        let lenient = Options {
            lenient: true,
            ..Options::default()
        };
        assert_eq!(render(&e, &lenient).unwrap(), "(x+1)");
    }
}
