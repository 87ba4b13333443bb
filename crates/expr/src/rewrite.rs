//! Free-variable rewriting and the expression sandbox.
//!
//! Rewriting turns every name that is not bound by an enclosing lambda or
//! comprehension into a [`Expr::Lookup`] against the render values, so the
//! compiled template never depends on the host's global namespace.

use crate::ast::{Comprehension, Expr, Index, LambdaDef, Param};
use crate::error::ExprError;
use crate::parser::parse_expression;
use log::debug;
use std::collections::HashSet;
use std::sync::Arc;

/// Node kinds an untrusted template may use. `Lookup` is absent: it only
/// ever comes out of the rewriter.
const SAFE_NODE_KINDS: &[&str] = &[
    "Literal",
    "Name",
    "List",
    "Tuple",
    "Dict",
    "UnaryOp",
    "BinOp",
    "BoolOp",
    "Compare",
    "IfExp",
    "Attribute",
    "Subscript",
    "Call",
    "Lambda",
    "ListComp",
    "DictComp",
];

const FORBIDDEN_NAMES: &[&str] = &[
    "eval", "exec", "compile", "open", "getattr", "setattr", "delattr", "globals", "locals",
    "vars", "import", "__import__", "breakpoint",
];

const UNSAFE_ATTRIBUTES: &[&str] = &[
    "f_builtins",
    "f_code",
    "f_globals",
    "f_locals",
    "func_code",
    "func_globals",
    "gi_code",
    "gi_frame",
    "co_code",
    "mro",
    "tb_frame",
    "format_map",
];

/// Parses `source` and rewrites its free variables into value lookups.
pub fn rewrite(source: &str) -> Result<Expr, ExprError> {
    let expr = parse_expression(source)?;
    Ok(contextify(expr, &HashSet::new()))
}

/// Like [`rewrite`], but first rejects anything outside the safe subset.
pub fn rewrite_sandboxed(source: &str) -> Result<Expr, ExprError> {
    let head = source.trim_start();
    if head.starts_with("import ") || (head.starts_with("from ") && head.contains(" import ")) {
        return Err(ExprError::security("import statement"));
    }
    let expr = parse_expression(source)?;
    check_safe(&expr).inspect_err(|e| debug!("Rejected expression '{}': {}", source, e))?;
    Ok(contextify(expr, &HashSet::new()))
}

/// Rewrites unbound `Name`s into `Lookup`s. `bound` holds the names bound by
/// enclosing lambdas and comprehensions.
pub fn contextify(expr: Expr, bound: &HashSet<String>) -> Expr {
    let ctx = |e: Expr| contextify(e, bound);
    let boxed = |e: Box<Expr>| Box::new(contextify(*e, bound));
    match expr {
        Expr::Name(name) if !bound.contains(&name) => Expr::Lookup(name),
        Expr::Name(_) | Expr::Lookup(_) | Expr::Literal(_) => expr,
        Expr::List(items) => Expr::List(items.into_iter().map(ctx).collect()),
        Expr::Tuple(items) => Expr::Tuple(items.into_iter().map(ctx).collect()),
        Expr::Dict(entries) => Expr::Dict(
            entries
                .into_iter()
                .map(|(k, v)| (contextify(k, bound), contextify(v, bound)))
                .collect(),
        ),
        Expr::Unary { op, operand } => Expr::Unary {
            op,
            operand: boxed(operand),
        },
        Expr::Binary { left, op, right } => Expr::Binary {
            left: boxed(left),
            op,
            right: boxed(right),
        },
        Expr::BoolOp { op, values } => Expr::BoolOp {
            op,
            values: values.into_iter().map(ctx).collect(),
        },
        Expr::Compare { left, ops } => Expr::Compare {
            left: boxed(left),
            ops: ops
                .into_iter()
                .map(|(op, e)| (op, contextify(e, bound)))
                .collect(),
        },
        Expr::Conditional { test, body, orelse } => Expr::Conditional {
            test: boxed(test),
            body: boxed(body),
            orelse: boxed(orelse),
        },
        Expr::Attribute { value, attr } => Expr::Attribute {
            value: boxed(value),
            attr,
        },
        Expr::Subscript { value, index } => Expr::Subscript {
            value: boxed(value),
            index: Box::new(match *index {
                Index::Item(e) => Index::Item(contextify(e, bound)),
                Index::Slice { lower, upper, step } => Index::Slice {
                    lower: lower.map(ctx),
                    upper: upper.map(ctx),
                    step: step.map(ctx),
                },
            }),
        },
        Expr::Call { func, args, kwargs } => Expr::Call {
            func: boxed(func),
            args: args.into_iter().map(ctx).collect(),
            kwargs: kwargs
                .into_iter()
                .map(|(k, e)| (k, contextify(e, bound)))
                .collect(),
        },
        Expr::Lambda(def) => {
            let def = Arc::unwrap_or_clone(def);
            let mut inner = bound.clone();
            inner.extend(def.bound_names().map(str::to_string));
            Expr::Lambda(Arc::new(LambdaDef {
                // Defaults are evaluated where the lambda is defined.
                params: def
                    .params
                    .into_iter()
                    .map(|p| Param {
                        name: p.name,
                        default: p.default.map(ctx),
                    })
                    .collect(),
                vararg: def.vararg,
                kwarg: def.kwarg,
                body: contextify(def.body, &inner),
            }))
        }
        Expr::ListComp {
            element,
            generators,
        } => {
            let (generators, inner) = contextify_generators(generators, bound);
            Expr::ListComp {
                element: Box::new(contextify(*element, &inner)),
                generators,
            }
        }
        Expr::DictComp {
            key,
            value,
            generators,
        } => {
            let (generators, inner) = contextify_generators(generators, bound);
            Expr::DictComp {
                key: Box::new(contextify(*key, &inner)),
                value: Box::new(contextify(*value, &inner)),
                generators,
            }
        }
    }
}

fn contextify_generators(
    generators: Vec<Comprehension>,
    bound: &HashSet<String>,
) -> (Vec<Comprehension>, HashSet<String>) {
    let mut inner = bound.clone();
    let generators = generators
        .into_iter()
        .map(|generator| {
            let iter = contextify(generator.iter, &inner);
            inner.extend(generator.target.names().into_iter().map(str::to_string));
            let conditions = generator
                .conditions
                .into_iter()
                .map(|c| contextify(c, &inner))
                .collect();
            Comprehension {
                target: generator.target,
                iter,
                conditions,
            }
        })
        .collect();
    (generators, inner)
}

/// Walks the tree and fails on the first construct outside the safe subset.
pub fn check_safe(expr: &Expr) -> Result<(), ExprError> {
    if !SAFE_NODE_KINDS.contains(&expr.kind()) {
        return Err(ExprError::security(format!("{} node", expr.kind())));
    }
    match expr {
        Expr::Name(name) => check_name(name),
        Expr::Lookup(_) | Expr::Literal(_) => Ok(()),
        Expr::List(items) | Expr::Tuple(items) => items.iter().try_for_each(check_safe),
        Expr::Dict(entries) => entries.iter().try_for_each(|(k, v)| {
            check_safe(k)?;
            check_safe(v)
        }),
        Expr::Unary { operand, .. } => check_safe(operand),
        Expr::Binary { left, right, .. } => {
            check_safe(left)?;
            check_safe(right)
        }
        Expr::BoolOp { values, .. } => values.iter().try_for_each(check_safe),
        Expr::Compare { left, ops } => {
            check_safe(left)?;
            ops.iter().try_for_each(|(_, e)| check_safe(e))
        }
        Expr::Conditional { test, body, orelse } => {
            check_safe(test)?;
            check_safe(body)?;
            check_safe(orelse)
        }
        Expr::Attribute { value, attr } => {
            if is_dunder(attr) || UNSAFE_ATTRIBUTES.contains(&attr.as_str()) {
                return Err(ExprError::security(format!("access to attribute '{}'", attr)));
            }
            check_safe(value)
        }
        Expr::Subscript { value, index } => {
            check_safe(value)?;
            match index.as_ref() {
                Index::Item(e) => check_safe(e),
                Index::Slice { lower, upper, step } => [lower, upper, step]
                    .into_iter()
                    .flatten()
                    .try_for_each(check_safe),
            }
        }
        Expr::Call { func, args, kwargs } => {
            check_safe(func)?;
            args.iter().try_for_each(check_safe)?;
            kwargs.iter().try_for_each(|(name, e)| {
                if is_dunder(name) {
                    return Err(ExprError::security(format!("keyword argument '{}'", name)));
                }
                check_safe(e)
            })
        }
        Expr::Lambda(def) => {
            def.bound_names().try_for_each(check_name)?;
            def.params
                .iter()
                .filter_map(|p| p.default.as_ref())
                .try_for_each(check_safe)?;
            check_safe(&def.body)
        }
        Expr::ListComp {
            element,
            generators,
        } => {
            check_generators(generators)?;
            check_safe(element)
        }
        Expr::DictComp {
            key,
            value,
            generators,
        } => {
            check_generators(generators)?;
            check_safe(key)?;
            check_safe(value)
        }
    }
}

fn check_generators(generators: &[Comprehension]) -> Result<(), ExprError> {
    for generator in generators {
        generator.target.names().into_iter().try_for_each(check_name)?;
        check_safe(&generator.iter)?;
        generator.conditions.iter().try_for_each(check_safe)?;
    }
    Ok(())
}

fn check_name(name: &str) -> Result<(), ExprError> {
    if is_dunder(name) || FORBIDDEN_NAMES.contains(&name) {
        return Err(ExprError::security(format!("use of name '{}'", name)));
    }
    Ok(())
}

fn is_dunder(name: &str) -> bool {
    name.starts_with("__") || name.ends_with("__")
}
