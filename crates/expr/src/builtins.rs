//! Builtin functions and the methods of the primitive types.

use crate::ast::BinaryOperator;
use crate::error::ExprError;
use crate::eval::Evaluator;
use crate::operators;
use crate::value::{Builtin, Map, Value, key_string};
use std::cmp::Ordering;

const MAX_RANGE_LEN: i64 = 1_000_000;

type Kwargs = Vec<(String, Value)>;

pub(crate) fn call(
    ev: &mut Evaluator<'_>,
    builtin: Builtin,
    args: Vec<Value>,
    mut kwargs: Kwargs,
) -> Result<Value, ExprError> {
    let name = builtin.name();
    let result = match builtin {
        Builtin::Len => {
            let [v] = exact::<1>(name, args)?;
            v.len().map(Value::from).ok_or_else(|| {
                ExprError::type_error(format!("object of type '{}' has no len()", v.type_name()))
            })?
        }
        Builtin::Str => match optional(name, args)? {
            None => Value::str(""),
            Some(v) => Value::Str(v.py_str()),
        },
        Builtin::Int => match optional(name, args)? {
            None => Value::Int(0),
            Some(v) => to_int(&v)?,
        },
        Builtin::Float => match optional(name, args)? {
            None => Value::Float(0.0),
            Some(v) => to_float(&v)?,
        },
        Builtin::Bool => match optional(name, args)? {
            None => Value::Bool(false),
            Some(v) => Value::Bool(v.truthy()),
        },
        Builtin::List | Builtin::Tuple => match optional(name, args)? {
            None => Value::list(Vec::new()),
            Some(v) => Value::list(v.iterate()?),
        },
        Builtin::Dict => {
            let mut map = match optional(name, args)? {
                None => Map::new(),
                Some(Value::Map(m)) => m.as_ref().clone(),
                Some(pairs) => {
                    let mut map = Map::new();
                    for pair in pairs.iterate()? {
                        let kv = pair.iterate()?;
                        let [k, v] = <[Value; 2]>::try_from(kv).map_err(|_| {
                            ExprError::call(name, "sequence elements must have length 2")
                        })?;
                        map.insert(key_string(&k)?, v);
                    }
                    map
                }
            };
            map.extend(kwargs.drain(..));
            Value::map(map)
        }
        Builtin::Range => range(args)?,
        Builtin::Min | Builtin::Max => {
            let key = take_kwarg(&mut kwargs, "key");
            let items = if args.len() == 1 {
                args[0].iterate()?
            } else {
                args
            };
            extremum(ev, name, items, key, builtin == Builtin::Max)?
        }
        Builtin::Sum => {
            let start = take_kwarg(&mut kwargs, "start");
            let mut args = args.into_iter();
            let iterable = args
                .next()
                .ok_or_else(|| ExprError::call(name, "expected at least 1 argument"))?;
            let mut total = args.next().or(start).unwrap_or(Value::Int(0));
            for item in iterable.iterate()? {
                total = operators::binary(BinaryOperator::Add, total, item)?;
            }
            total
        }
        Builtin::Abs => {
            let [v] = exact::<1>(name, args)?;
            match v {
                Value::Int(n) => Value::Int(n.checked_abs().ok_or_else(operators::overflow)?),
                Value::Bool(b) => Value::Int(b as i64),
                Value::Float(f) => Value::Float(f.abs()),
                other => {
                    return Err(ExprError::type_error(format!(
                        "bad operand type for abs(): '{}'",
                        other.type_name()
                    )));
                }
            }
        }
        Builtin::Round => {
            let ndigits = take_kwarg(&mut kwargs, "ndigits");
            let mut args = args.into_iter();
            let number = args
                .next()
                .ok_or_else(|| ExprError::call(name, "missing required argument 'number'"))?;
            round(&number, args.next().or(ndigits))?
        }
        Builtin::Sorted => {
            let key = take_kwarg(&mut kwargs, "key");
            let reverse = take_kwarg(&mut kwargs, "reverse").is_some_and(|v| v.truthy());
            let [iterable] = exact::<1>(name, args)?;
            Value::list(sort(ev, iterable.iterate()?, key, reverse)?)
        }
        Builtin::Reversed => {
            let [v] = exact::<1>(name, args)?;
            let mut items = v.iterate()?;
            items.reverse();
            Value::list(items)
        }
        Builtin::Enumerate => {
            let start = take_kwarg(&mut kwargs, "start");
            let mut args = args.into_iter();
            let iterable = args
                .next()
                .ok_or_else(|| ExprError::call(name, "missing required argument 'iterable'"))?;
            let start = args.next().or(start).and_then(|v| v.as_int()).unwrap_or(0);
            let items = iterable
                .iterate()?
                .into_iter()
                .enumerate()
                .map(|(i, v)| Value::list(vec![Value::Int(start + i as i64), v]))
                .collect();
            Value::list(items)
        }
        Builtin::Zip => {
            let columns = args
                .iter()
                .map(Value::iterate)
                .collect::<Result<Vec<_>, _>>()?;
            let len = columns.iter().map(Vec::len).min().unwrap_or(0);
            let rows = (0..len)
                .map(|i| Value::list(columns.iter().map(|c| c[i].clone()).collect()))
                .collect();
            Value::list(rows)
        }
        Builtin::Any => {
            let [v] = exact::<1>(name, args)?;
            Value::Bool(v.iterate()?.iter().any(Value::truthy))
        }
        Builtin::All => {
            let [v] = exact::<1>(name, args)?;
            Value::Bool(v.iterate()?.iter().all(Value::truthy))
        }
        Builtin::Repr => {
            let [v] = exact::<1>(name, args)?;
            Value::Str(v.py_repr())
        }
        Builtin::Defined => {
            let [v] = exact::<1>(name, args)?;
            let var = v
                .as_str()
                .ok_or_else(|| ExprError::call(name, "argument must be a variable name"))?;
            Value::Bool(ev.is_defined(var))
        }
    };

    if let Some((unexpected, _)) = kwargs.first() {
        return Err(ExprError::call(
            name,
            format!("got an unexpected keyword argument '{}'", unexpected),
        ));
    }
    Ok(result)
}

/// Methods of `str`, `dict` and `list`. `Ok(None)` means the receiver has no such method.
pub(crate) fn call_method(
    receiver: &Value,
    method: &str,
    args: &[Value],
    kwargs: &[(String, Value)],
) -> Result<Option<Value>, ExprError> {
    let result = match receiver {
        Value::Str(s) | Value::Markup(s) => string_method(s, method, args, kwargs)?,
        Value::Map(map) => match method {
            "get" => {
                let key = arg(method, args, 0)?;
                let fallback = args.get(1).cloned().unwrap_or(Value::None);
                Some(
                    key_string(key)
                        .ok()
                        .and_then(|k| map.get(&k).cloned())
                        .unwrap_or(fallback),
                )
            }
            "keys" => Some(Value::list(
                map.keys().map(|k| Value::Str(k.clone())).collect(),
            )),
            "values" => Some(Value::list(map.values().cloned().collect())),
            "items" => Some(Value::list(
                map.iter()
                    .map(|(k, v)| Value::list(vec![Value::Str(k.clone()), v.clone()]))
                    .collect(),
            )),
            _ => None,
        },
        Value::List(items) => match method {
            "index" => {
                let needle = arg(method, args, 0)?;
                let pos = items.iter().position(|v| v.py_eq(needle)).ok_or_else(|| {
                    ExprError::call(method, format!("{} is not in list", needle.py_repr()))
                })?;
                Some(Value::from(pos))
            }
            "count" => {
                let needle = arg(method, args, 0)?;
                Some(Value::from(items.iter().filter(|v| v.py_eq(needle)).count()))
            }
            _ => None,
        },
        _ => None,
    };
    Ok(result)
}

fn string_method(
    s: &str,
    method: &str,
    args: &[Value],
    kwargs: &[(String, Value)],
) -> Result<Option<Value>, ExprError> {
    let str_arg = |i: usize| str_arg(method, args, i);

    let out = match method {
        "upper" => Value::str(s.to_uppercase()),
        "lower" => Value::str(s.to_lowercase()),
        "strip" => match str_arg(0)? {
            Some(chars) => Value::str(s.trim_matches(|c: char| chars.contains(c))),
            None => Value::str(s.trim()),
        },
        "lstrip" => match str_arg(0)? {
            Some(chars) => Value::str(s.trim_start_matches(|c: char| chars.contains(c))),
            None => Value::str(s.trim_start()),
        },
        "rstrip" => match str_arg(0)? {
            Some(chars) => Value::str(s.trim_end_matches(|c: char| chars.contains(c))),
            None => Value::str(s.trim_end()),
        },
        "split" => {
            let parts: Vec<Value> = match str_arg(0)? {
                Some("") => return Err(ExprError::call(method, "empty separator")),
                Some(sep) => s.split(sep).map(Value::from).collect(),
                None => s.split_whitespace().map(Value::from).collect(),
            };
            Value::list(parts)
        }
        "join" => {
            let items = arg(method, args, 0)?.iterate()?;
            let parts = items
                .iter()
                .map(|v| {
                    v.as_str().map(str::to_string).ok_or_else(|| {
                        ExprError::call(
                            method,
                            format!("expected str instance, {} found", v.type_name()),
                        )
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Value::str(parts.join(s))
        }
        "startswith" | "endswith" => {
            let candidates = match arg(method, args, 0)? {
                Value::List(items) => items.as_ref().clone(),
                other => vec![other.clone()],
            };
            let hit = candidates.iter().filter_map(Value::as_str).any(|c| {
                if method == "startswith" {
                    s.starts_with(c)
                } else {
                    s.ends_with(c)
                }
            });
            Value::Bool(hit)
        }
        "replace" => {
            let (Some(old), Some(new)) = (str_arg(0)?, str_arg(1)?) else {
                return Err(ExprError::call(method, "expected 2 arguments"));
            };
            Value::str(s.replace(old, new))
        }
        "capitalize" => {
            let mut chars = s.chars();
            match chars.next() {
                Some(first) => {
                    Value::str(first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect::<String>())
                }
                None => Value::str(""),
            }
        }
        "title" => {
            let mut out = String::with_capacity(s.len());
            let mut at_word_start = true;
            for c in s.chars() {
                if c.is_alphabetic() {
                    if at_word_start {
                        out.extend(c.to_uppercase());
                    } else {
                        out.extend(c.to_lowercase());
                    }
                    at_word_start = false;
                } else {
                    out.push(c);
                    at_word_start = true;
                }
            }
            Value::str(out)
        }
        "count" => {
            let needle = str_arg(0)?.unwrap_or_default();
            if needle.is_empty() {
                Value::from(s.chars().count() + 1)
            } else {
                Value::from(s.matches(needle).count())
            }
        }
        "find" => {
            let needle = str_arg(0)?.unwrap_or_default();
            match s.find(needle) {
                Some(byte_idx) => Value::from(s[..byte_idx].chars().count()),
                None => Value::Int(-1),
            }
        }
        "format" => Value::str(str_format(s, args, kwargs)?),
        _ => return Ok(None),
    };
    Ok(Some(out))
}

fn str_arg<'a>(method: &str, args: &'a [Value], i: usize) -> Result<Option<&'a str>, ExprError> {
    match args.get(i) {
        None | Some(Value::None) => Ok(None),
        Some(v) => v.as_str().map(Some).ok_or_else(|| {
            ExprError::call(method, format!("must be str, not {}", v.type_name()))
        }),
    }
}

/// `str.format` with positional (`{}`, `{0}`) and named (`{name}`) fields.
fn str_format(fmt: &str, args: &[Value], kwargs: &[(String, Value)]) -> Result<String, ExprError> {
    let mut out = String::with_capacity(fmt.len());
    let mut auto_index = 0;
    let mut chars = fmt.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let field: String = chars.by_ref().take_while(|&ch| ch != '}').collect();
                let (name, spec) = field.split_once(':').unwrap_or((field.as_str(), ""));
                let value = if name.is_empty() {
                    auto_index += 1;
                    args.get(auto_index - 1)
                } else if let Ok(i) = name.parse::<usize>() {
                    args.get(i)
                } else {
                    kwargs.iter().find(|(k, _)| k == name).map(|(_, v)| v)
                };
                let value = value.ok_or_else(|| {
                    ExprError::call("format", format!("missing value for field '{{{}}}'", name))
                })?;
                match spec.strip_prefix('.').and_then(|p| p.strip_suffix('f')) {
                    Some(precision) => {
                        let precision = precision.parse::<usize>().unwrap_or(6);
                        let f = value.as_float().ok_or_else(|| {
                            ExprError::call("format", "precision given for a non-number")
                        })?;
                        out.push_str(&format!("{:.*}", precision, f));
                    }
                    None => out.push_str(&value.py_str()),
                }
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

fn exact<const N: usize>(name: &str, args: Vec<Value>) -> Result<[Value; N], ExprError> {
    let given = args.len();
    <[Value; N]>::try_from(args).map_err(|_| {
        ExprError::call(
            name,
            format!("takes exactly {} argument(s) ({} given)", N, given),
        )
    })
}

fn optional(name: &str, args: Vec<Value>) -> Result<Option<Value>, ExprError> {
    if args.len() > 1 {
        return Err(ExprError::call(
            name,
            format!("takes at most 1 argument ({} given)", args.len()),
        ));
    }
    Ok(args.into_iter().next())
}

fn arg<'a>(method: &str, args: &'a [Value], index: usize) -> Result<&'a Value, ExprError> {
    args.get(index)
        .ok_or_else(|| ExprError::call(method, format!("missing argument {}", index + 1)))
}

fn take_kwarg(kwargs: &mut Kwargs, name: &str) -> Option<Value> {
    let pos = kwargs.iter().position(|(k, _)| k == name)?;
    Some(kwargs.remove(pos).1)
}

fn to_int(v: &Value) -> Result<Value, ExprError> {
    match v {
        Value::Int(_) => Ok(v.clone()),
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        Value::Float(f) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
        Value::Str(s) | Value::Markup(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
            ExprError::call("int", format!("invalid literal for int(): '{}'", s))
        }),
        other => Err(ExprError::type_error(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn to_float(v: &Value) -> Result<Value, ExprError> {
    match v {
        Value::Str(s) | Value::Markup(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            ExprError::call("float", format!("could not convert string to float: '{}'", s))
        }),
        other => other.as_float().map(Value::Float).ok_or_else(|| {
            ExprError::type_error(format!(
                "float() argument must be a string or a number, not '{}'",
                other.type_name()
            ))
        }),
    }
}

fn range(args: Vec<Value>) -> Result<Value, ExprError> {
    let ints = args
        .iter()
        .map(|v| {
            v.as_int().ok_or_else(|| {
                ExprError::type_error(format!(
                    "'{}' object cannot be interpreted as an integer",
                    v.type_name()
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(ExprError::call("range", "expected 1 to 3 arguments")),
    };
    if step == 0 {
        return Err(ExprError::call("range", "arg 3 must not be zero"));
    }
    let len = if step > 0 {
        (stop - start + step - 1).max(0) / step
    } else {
        (start - stop - step - 1).max(0) / -step
    };
    if len > MAX_RANGE_LEN {
        return Err(ExprError::call(
            "range",
            format!("range of {} items exceeds the limit of {}", len, MAX_RANGE_LEN),
        ));
    }
    Ok(Value::list(
        (0..len).map(|i| Value::Int(start + i * step)).collect(),
    ))
}

fn round(number: &Value, ndigits: Option<Value>) -> Result<Value, ExprError> {
    let f = number.as_float().ok_or_else(|| {
        ExprError::type_error(format!(
            "type {} doesn't define __round__ method",
            number.type_name()
        ))
    })?;
    match ndigits.filter(|v| !matches!(v, Value::None)) {
        None => {
            if let Value::Int(_) = number {
                return Ok(number.clone());
            }
            Ok(Value::Int(round_half_even(f) as i64))
        }
        Some(digits) => {
            let digits = digits
                .as_int()
                .ok_or_else(|| ExprError::type_error("ndigits must be an integer"))?;
            if let Value::Int(_) = number
                && digits >= 0
            {
                return Ok(number.clone());
            }
            let scale = 10f64.powi(digits as i32);
            Ok(Value::Float(round_half_even(f * scale) / scale))
        }
    }
}

fn round_half_even(y: f64) -> f64 {
    if (y - y.trunc()).abs() == 0.5 {
        2.0 * (y / 2.0).round()
    } else {
        y.round()
    }
}

fn sort_keys(
    ev: &mut Evaluator<'_>,
    items: &[Value],
    key: Option<Value>,
) -> Result<Vec<Value>, ExprError> {
    match key.filter(|k| !matches!(k, Value::None)) {
        Some(key_fn) => items
            .iter()
            .map(|item| ev.call_value(&key_fn, vec![item.clone()], Vec::new()))
            .collect(),
        None => Ok(items.to_vec()),
    }
}

fn sort(
    ev: &mut Evaluator<'_>,
    items: Vec<Value>,
    key: Option<Value>,
    reverse: bool,
) -> Result<Vec<Value>, ExprError> {
    let keys = sort_keys(ev, &items, key)?;
    let mut pairs: Vec<(Value, Value)> = keys.into_iter().zip(items).collect();
    let mut failure = None;
    pairs.sort_by(|a, b| {
        let ordering = if reverse {
            b.0.py_cmp(&a.0)
        } else {
            a.0.py_cmp(&b.0)
        };
        ordering.unwrap_or_else(|e| {
            failure.get_or_insert(e);
            Ordering::Equal
        })
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(pairs.into_iter().map(|(_, v)| v).collect()),
    }
}

fn extremum(
    ev: &mut Evaluator<'_>,
    name: &str,
    items: Vec<Value>,
    key: Option<Value>,
    max: bool,
) -> Result<Value, ExprError> {
    let keys = sort_keys(ev, &items, key)?;
    let mut best: Option<usize> = None;
    for (i, k) in keys.iter().enumerate() {
        best = match best {
            None => Some(i),
            Some(b) => {
                let ord = k.py_cmp(&keys[b])?;
                let better = if max {
                    ord == Ordering::Greater
                } else {
                    ord == Ordering::Less
                };
                Some(if better { i } else { b })
            }
        };
    }
    best.map(|i| items[i].clone())
        .ok_or_else(|| ExprError::call(name, "arg is an empty sequence"))
}
