//! Arithmetic, comparison and `%`-formatting semantics.

use crate::ast::{BinaryOperator, CompareOperator, UnaryOperator};
use crate::error::ExprError;
use crate::value::{Value, format_float};
use std::cmp::Ordering;

pub fn unary(op: UnaryOperator, operand: Value) -> Result<Value, ExprError> {
    match op {
        UnaryOperator::Not => Ok(Value::Bool(!operand.truthy())),
        UnaryOperator::Plus => match operand {
            Value::Int(_) | Value::Float(_) => Ok(operand),
            Value::Bool(b) => Ok(Value::Int(b as i64)),
            other => Err(bad_operand("unary +", &other)),
        },
        UnaryOperator::Minus => match operand {
            Value::Int(n) => n.checked_neg().map(Value::Int).ok_or_else(overflow),
            Value::Bool(b) => Ok(Value::Int(-(b as i64))),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(bad_operand("unary -", &other)),
        },
    }
}

pub fn binary(op: BinaryOperator, left: Value, right: Value) -> Result<Value, ExprError> {
    match op {
        BinaryOperator::Add => add(left, right),
        BinaryOperator::Sub => arithmetic(op, &left, &right, i64::checked_sub, |a, b| a - b),
        BinaryOperator::Mul => multiply(left, right),
        BinaryOperator::Div => {
            let (a, b) = floats(op, &left, &right)?;
            if b == 0.0 {
                return Err(ExprError::ZeroDivision);
            }
            Ok(Value::Float(a / b))
        }
        BinaryOperator::FloorDiv => match (left.as_int(), right.as_int()) {
            (Some(_), Some(0)) => Err(ExprError::ZeroDivision),
            (Some(a), Some(b)) if is_integral(&left) && is_integral(&right) => {
                floor_div(a, b).map(Value::Int).ok_or_else(overflow)
            }
            _ => {
                let (a, b) = floats(op, &left, &right)?;
                if b == 0.0 {
                    return Err(ExprError::ZeroDivision);
                }
                Ok(Value::Float((a / b).floor()))
            }
        },
        BinaryOperator::Mod => match (&left, &right) {
            (Value::Str(fmt), _) => percent_format(fmt, &right),
            (Value::Markup(fmt), _) => percent_format(fmt, &right),
            _ if is_integral(&left) && is_integral(&right) => {
                let (a, b) = (left.as_int().unwrap_or(0), right.as_int().unwrap_or(0));
                if b == 0 {
                    return Err(ExprError::ZeroDivision);
                }
                Ok(Value::Int(floor_mod(a, b)))
            }
            _ => {
                let (a, b) = floats(op, &left, &right)?;
                if b == 0.0 {
                    return Err(ExprError::ZeroDivision);
                }
                Ok(Value::Float(a - b * (a / b).floor()))
            }
        },
        BinaryOperator::Pow => match (&left, &right) {
            _ if is_integral(&left) && is_integral(&right) => {
                let (a, b) = (left.as_int().unwrap_or(0), right.as_int().unwrap_or(0));
                if b >= 0 {
                    let exp = u32::try_from(b).map_err(|_| overflow())?;
                    a.checked_pow(exp).map(Value::Int).ok_or_else(overflow)
                } else {
                    Ok(Value::Float((a as f64).powf(b as f64)))
                }
            }
            _ => {
                let (a, b) = floats(op, &left, &right)?;
                Ok(Value::Float(a.powf(b)))
            }
        },
    }
}

pub fn compare(op: CompareOperator, left: &Value, right: &Value) -> Result<bool, ExprError> {
    Ok(match op {
        CompareOperator::Eq => left.py_eq(right),
        CompareOperator::NotEq => !left.py_eq(right),
        CompareOperator::Lt => left.py_cmp(right)? == Ordering::Less,
        CompareOperator::LtE => left.py_cmp(right)? != Ordering::Greater,
        CompareOperator::Gt => left.py_cmp(right)? == Ordering::Greater,
        CompareOperator::GtE => left.py_cmp(right)? != Ordering::Less,
        CompareOperator::In => right.contains(left)?,
        CompareOperator::NotIn => !right.contains(left)?,
        CompareOperator::Is => left.is_identical(right),
        CompareOperator::IsNot => !left.is_identical(right),
    })
}

fn add(left: Value, right: Value) -> Result<Value, ExprError> {
    match (&left, &right) {
        (Value::Str(a) | Value::Markup(a), Value::Str(b) | Value::Markup(b)) => {
            Ok(Value::Str(format!("{}{}", a, b)))
        }
        (Value::List(a), Value::List(b)) => {
            let mut items = a.as_ref().clone();
            items.extend(b.iter().cloned());
            Ok(Value::list(items))
        }
        _ => arithmetic(
            BinaryOperator::Add,
            &left,
            &right,
            i64::checked_add,
            |a, b| a + b,
        ),
    }
}

fn multiply(left: Value, right: Value) -> Result<Value, ExprError> {
    match (&left, &right) {
        (Value::Str(s) | Value::Markup(s), n) | (n, Value::Str(s) | Value::Markup(s))
            if is_integral(n) =>
        {
            let times = n.as_int().unwrap_or(0).max(0) as usize;
            Ok(Value::Str(s.repeat(times)))
        }
        (Value::List(items), n) | (n, Value::List(items)) if is_integral(n) => {
            let times = n.as_int().unwrap_or(0).max(0) as usize;
            let mut out = Vec::with_capacity(items.len() * times);
            for _ in 0..times {
                out.extend(items.iter().cloned());
            }
            Ok(Value::list(out))
        }
        _ => arithmetic(
            BinaryOperator::Mul,
            &left,
            &right,
            i64::checked_mul,
            |a, b| a * b,
        ),
    }
}

fn arithmetic(
    op: BinaryOperator,
    left: &Value,
    right: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, ExprError> {
    if is_integral(left) && is_integral(right) {
        let (a, b) = (left.as_int().unwrap_or(0), right.as_int().unwrap_or(0));
        return int_op(a, b).map(Value::Int).ok_or_else(overflow);
    }
    let (a, b) = floats(op, left, right)?;
    Ok(Value::Float(float_op(a, b)))
}

fn is_integral(v: &Value) -> bool {
    matches!(v, Value::Int(_) | Value::Bool(_))
}

fn floats(op: BinaryOperator, left: &Value, right: &Value) -> Result<(f64, f64), ExprError> {
    match (left.as_float(), right.as_float()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(ExprError::type_error(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            symbol(op),
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

/// Remainder with the sign of the divisor. `i64::MIN % -1` is 0.
fn floor_mod(a: i64, b: i64) -> i64 {
    let r = a.wrapping_rem(b);
    if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r }
}

fn symbol(op: BinaryOperator) -> &'static str {
    match op {
        BinaryOperator::Add => "+",
        BinaryOperator::Sub => "-",
        BinaryOperator::Mul => "*",
        BinaryOperator::Div => "/",
        BinaryOperator::FloorDiv => "//",
        BinaryOperator::Mod => "%",
        BinaryOperator::Pow => "**",
    }
}

pub(crate) fn overflow() -> ExprError {
    ExprError::type_error("integer overflow")
}

fn bad_operand(op: &str, v: &Value) -> ExprError {
    ExprError::type_error(format!("bad operand type for {}: '{}'", op, v.type_name()))
}

/// printf-style `'%s of %d' % (a, b)` and `'%(name)s' % mapping` formatting.
pub fn percent_format(fmt: &str, args: &Value) -> Result<Value, ExprError> {
    let positional: Vec<Value> = match args {
        Value::List(items) => items.as_ref().clone(),
        Value::Map(_) if fmt.contains("%(") => Vec::new(),
        other => vec![other.clone()],
    };
    let mut next_arg = positional.into_iter();
    let mut out = String::new();
    let mut chars = fmt.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }

        let mut key = None;
        if chars.peek() == Some(&'(') {
            chars.next();
            let name: String = chars.by_ref().take_while(|&ch| ch != ')').collect();
            key = Some(name);
        }
        let mut precision = None;
        let mut flags = String::new();
        while let Some(&ch) = chars.peek() {
            if ch.is_ascii_digit() || ch == '-' || ch == '+' || ch == ' ' {
                flags.push(ch);
                chars.next();
            } else {
                break;
            }
        }
        if chars.peek() == Some(&'.') {
            chars.next();
            let digits: String = std::iter::from_fn(|| chars.next_if(char::is_ascii_digit)).collect();
            precision = digits.parse::<usize>().ok();
        }
        let conversion = chars
            .next()
            .ok_or_else(|| ExprError::type_error("incomplete format"))?;

        let arg = match &key {
            Some(name) => match args {
                Value::Map(map) => map
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ExprError::Key(format!("'{}'", name)))?,
                _ => return Err(ExprError::type_error("format requires a mapping")),
            },
            None => next_arg
                .next()
                .ok_or_else(|| ExprError::type_error("not enough arguments for format string"))?,
        };

        let rendered = match conversion {
            's' => arg.py_str(),
            'r' => arg.py_repr(),
            'd' | 'i' => match arg.as_float() {
                Some(f) => (f.trunc() as i64).to_string(),
                None => {
                    return Err(ExprError::type_error(format!(
                        "%d format: a number is required, not {}",
                        arg.type_name()
                    )));
                }
            },
            'f' | 'F' => match arg.as_float() {
                Some(f) => format!("{:.*}", precision.unwrap_or(6), f),
                None => {
                    return Err(ExprError::type_error(format!(
                        "must be real number, not {}",
                        arg.type_name()
                    )));
                }
            },
            'g' => arg.as_float().map(format_float).unwrap_or_else(|| arg.py_str()),
            other => {
                return Err(ExprError::type_error(format!(
                    "unsupported format character '{}'",
                    other
                )));
            }
        };

        let width = flags
            .trim_start_matches(['-', '+', ' '])
            .parse::<usize>()
            .unwrap_or(0);
        if flags.starts_with('-') {
            out.push_str(&format!("{:<width$}", rendered, width = width));
        } else {
            out.push_str(&format!("{:>width$}", rendered, width = width));
        }
    }

    if next_arg.next().is_some() && !matches!(args, Value::Map(_)) {
        return Err(ExprError::type_error(
            "not all arguments converted during string formatting",
        ));
    }
    Ok(Value::Str(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_arithmetic_follows_python() {
        assert_eq!(
            binary(BinaryOperator::FloorDiv, Value::Int(-7), Value::Int(2)).unwrap(),
            Value::Int(-4)
        );
        assert_eq!(
            binary(BinaryOperator::Mod, Value::Int(-7), Value::Int(2)).unwrap(),
            Value::Int(1)
        );
        assert_eq!(
            binary(BinaryOperator::Div, Value::Int(7), Value::Int(2)).unwrap(),
            Value::Float(3.5)
        );
        assert!(matches!(
            binary(BinaryOperator::Div, Value::Int(1), Value::Int(0)),
            Err(ExprError::ZeroDivision)
        ));
    }

    #[test]
    fn test_integer_overflow_is_an_error() {
        let min = binary(
            BinaryOperator::Sub,
            Value::Int(-9223372036854775807),
            Value::Int(1),
        )
        .unwrap();
        assert_eq!(min, Value::Int(i64::MIN));
        let err = binary(BinaryOperator::FloorDiv, min.clone(), Value::Int(-1)).unwrap_err();
        assert!(err.to_string().contains("integer overflow"));
        assert_eq!(
            binary(BinaryOperator::Mod, min.clone(), Value::Int(-1)).unwrap(),
            Value::Int(0)
        );
        assert_eq!(
            binary(BinaryOperator::Mod, Value::Int(7), Value::Int(-2)).unwrap(),
            Value::Int(-1)
        );
        let expr = crate::parser::parse_expression("abs(-9223372036854775807 - 1)").unwrap();
        let err = crate::eval::evaluate(&expr, &crate::context::Values::new()).unwrap_err();
        assert!(err.to_string().contains("integer overflow"));
    }

    #[test]
    fn test_string_operations() {
        assert_eq!(
            binary(BinaryOperator::Add, Value::str("a"), Value::str("b")).unwrap(),
            Value::str("ab")
        );
        assert_eq!(
            binary(BinaryOperator::Mul, Value::str("ab"), Value::Int(2)).unwrap(),
            Value::str("abab")
        );
        assert!(binary(BinaryOperator::Add, Value::str("a"), Value::Int(1)).is_err());
    }

    #[test]
    fn test_percent_format() {
        let args = Value::list(vec![Value::str("x"), Value::Int(3), Value::Float(2.5)]);
        assert_eq!(
            percent_format("%s has %d items at %.2f", &args).unwrap(),
            Value::str("x has 3 items at 2.50")
        );
        assert_eq!(
            percent_format("100%%", &Value::list(vec![])).unwrap(),
            Value::str("100%")
        );
        assert!(percent_format("%s %s", &Value::str("only")).is_err());
    }

    #[test]
    fn test_membership() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2)]);
        assert!(compare(CompareOperator::In, &Value::Int(2), &list).unwrap());
        assert!(compare(CompareOperator::NotIn, &Value::Int(5), &list).unwrap());
        assert!(compare(CompareOperator::In, &Value::str("ell"), &Value::str("hello")).unwrap());
    }
}
