//! Arithmetic over numbers with `+ - * /`, the usual precedence, left
//! associativity and parentheses.
//!
//! Integer operands stay integers except for `/`, which always yields a
//! float.

use crate::builder::{Grammar, P};
use crate::error::GrammarError;
use crate::value::Value;

/// `expr EOF`, evaluating to the result.
pub fn grammar<'a>(g: &Grammar<'a>) -> Result<P<'a>, GrammarError> {
    let expr = g.named(g.forward(), "expr");
    let ws = g.ws();

    let parens = g.keep_left(g.keep_right(g.char('('), expr), g.char(')'));
    let factor = g.named(g.keep_left(g.keep_right(ws, g.or(g.number(), parens)), ws), "factor");

    let mul_op = g.named(g.or(g.char('*'), g.char('/')), "* or /");
    let term = g.try_map(g.concat(factor, g.many(g.concat(mul_op, factor))), fold);
    let term = g.named(term, "term");

    let add_op = g.named(g.or(g.char('+'), g.char('-')), "+ or -");
    expr.set_target(g.try_map(g.concat(term, g.many(g.concat(add_op, term))), fold))?;

    Ok(g.keep_left(expr, g.end()))
}

/// `[first, [[op, operand], ...]]`, folded left to right.
fn fold(args: Value) -> Result<Value, String> {
    let mut parts = args.into_list().unwrap_or_default().into_iter();
    let mut acc = parts.next().unwrap_or_default();
    let rest = parts.next().and_then(Value::into_list).unwrap_or_default();
    for step in rest {
        let mut step = step.into_list().unwrap_or_default().into_iter();
        let op = step.next().and_then(|op| op.as_char());
        let rhs = step.next().unwrap_or_default();
        acc = apply(op, acc, rhs)?;
    }
    Ok(acc)
}

fn number(v: &Value) -> Result<f64, String> {
    v.as_f64().ok_or_else(|| format!("Not a number: {}", v))
}

fn apply(op: Option<char>, lhs: Value, rhs: Value) -> Result<Value, String> {
    match (op, &lhs, &rhs) {
        (Some('/'), ..) => {
            let divisor = number(&rhs)?;
            if divisor == 0.0 {
                return Err("Division by zero".to_string());
            }
            Ok(Value::Float(number(&lhs)? / divisor))
        }
        (Some(op), Value::Int(l), Value::Int(r)) => {
            let result = match op {
                '+' => l.checked_add(*r),
                '-' => l.checked_sub(*r),
                '*' => l.checked_mul(*r),
                _ => return Err(format!("Unknown operator {}", op)),
            };
            result.map(Value::Int).ok_or_else(|| format!("Integer overflow in {} {} {}", l, op, r))
        }
        (Some(op), ..) => {
            let (l, r) = (number(&lhs)?, number(&rhs)?);
            match op {
                '+' => Ok(Value::Float(l + r)),
                '-' => Ok(Value::Float(l - r)),
                '*' => Ok(Value::Float(l * r)),
                _ => Err(format!("Unknown operator {}", op)),
            }
        }
        (None, ..) => Err("Missing operator".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;

    use super::*;
    use crate::parser_vm::compile;

    fn eval(text: &str) -> Result<Value, String> {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let program = compile(&arena, grammar(&g).unwrap()).unwrap();
        program.value(text).map_err(|f| f.message)
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("(1+2)*3"), Ok(Value::Int(9)));
        assert_eq!(eval("1+2*3"), Ok(Value::Int(7)));
        assert_eq!(eval("10 - 4 - 3"), Ok(Value::Int(3)));
        assert_eq!(eval("7/2"), Ok(Value::Float(3.5)));
        assert_eq!(eval("1.5*2"), Ok(Value::Float(3.0)));
    }

    #[test]
    fn test_transform_errors_fail_the_parse() {
        assert_eq!(eval("1/0"), Err("Division by zero".to_string()));
        assert_eq!(
            eval("9223372036854775807+1"),
            Err("Integer overflow in 9223372036854775807 + 1".to_string())
        );
    }

    #[test]
    fn test_unbalanced_parens() {
        assert!(eval("(1+2").is_err());
        assert!(eval("1+2)").is_err());
    }
}
