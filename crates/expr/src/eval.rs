//! Tree-walking evaluator for parsed expressions.
//!
//! Free variables resolve through a [`Scope`]; names bound by lambdas and
//! comprehensions live in a stack of local frames owned by the evaluator.

use crate::ast::{BoolOperator, Comprehension, Expr, Index, LambdaDef, Literal, Target};
use crate::builtins;
use crate::context::Scope;
use crate::error::ExprError;
use crate::operators;
use crate::value::{Closure, Map, Value, key_string};
use std::sync::Arc;

const MAX_CALL_DEPTH: usize = 100;

/// Evaluates `expr` against `scope`.
pub fn evaluate(expr: &Expr, scope: &dyn Scope) -> Result<Value, ExprError> {
    Evaluator::new(scope).eval(expr)
}

pub struct Evaluator<'s> {
    scope: &'s dyn Scope,
    frames: Vec<Map>,
    depth: usize,
}

impl<'s> Evaluator<'s> {
    pub fn new(scope: &'s dyn Scope) -> Self {
        Self {
            scope,
            frames: Vec::new(),
            depth: 0,
        }
    }

    pub fn eval(&mut self, expr: &Expr) -> Result<Value, ExprError> {
        match expr {
            Expr::Literal(lit) => Ok(literal(lit)),
            Expr::Name(name) => self.resolve(name),
            Expr::Lookup(name) => self.scope.lookup(name),
            Expr::List(items) | Expr::Tuple(items) => {
                let values = items
                    .iter()
                    .map(|e| self.eval(e))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::list(values))
            }
            Expr::Dict(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (k, v) in entries {
                    let key = key_string(&self.eval(k)?)?;
                    let value = self.eval(v)?;
                    map.insert(key, value);
                }
                Ok(Value::map(map))
            }
            Expr::Unary { op, operand } => {
                let v = self.eval(operand)?;
                operators::unary(*op, v)
            }
            Expr::Binary { left, op, right } => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                operators::binary(*op, l, r)
            }
            Expr::BoolOp { op, values } => self.eval_bool_op(*op, values),
            Expr::Compare { left, ops } => {
                let mut current = self.eval(left)?;
                for (op, right) in ops {
                    let next = self.eval(right)?;
                    if !operators::compare(*op, &current, &next)? {
                        return Ok(Value::Bool(false));
                    }
                    current = next;
                }
                Ok(Value::Bool(true))
            }
            Expr::Conditional { test, body, orelse } => {
                if self.eval(test)?.truthy() {
                    self.eval(body)
                } else {
                    self.eval(orelse)
                }
            }
            Expr::Attribute { value, attr } => self.eval(value)?.get_attr(attr),
            Expr::Subscript { value, index } => {
                let target = self.eval(value)?;
                match index.as_ref() {
                    Index::Item(key) => {
                        let key = self.eval(key)?;
                        target.get_item(&key)
                    }
                    Index::Slice { lower, upper, step } => {
                        let lower = self.eval_opt(lower.as_ref())?;
                        let upper = self.eval_opt(upper.as_ref())?;
                        let step = self.eval_opt(step.as_ref())?;
                        slice(&target, lower, upper, step)
                    }
                }
            }
            Expr::Call { func, args, kwargs } => self.eval_call(func, args, kwargs),
            Expr::Lambda(def) => self.make_closure(def),
            Expr::ListComp {
                element,
                generators,
            } => {
                let mut out = Vec::new();
                self.with_frame(|ev| {
                    ev.run_generators(generators, &mut |ev| {
                        out.push(ev.eval(element)?);
                        Ok(())
                    })
                })?;
                Ok(Value::list(out))
            }
            Expr::DictComp {
                key,
                value,
                generators,
            } => {
                let mut out = Map::new();
                self.with_frame(|ev| {
                    ev.run_generators(generators, &mut |ev| {
                        let k = key_string(&ev.eval(key)?)?;
                        let v = ev.eval(value)?;
                        out.insert(k, v);
                        Ok(())
                    })
                })?;
                Ok(Value::map(out))
            }
        }
    }

    /// Whether `name` is bound locally or in the scope.
    pub fn is_defined(&self, name: &str) -> bool {
        self.frames.iter().any(|f| f.contains_key(name)) || self.scope.defined(name)
    }

    /// Calls a builtin or lambda value with already evaluated arguments.
    pub fn call_value(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, ExprError> {
        match callee {
            Value::Builtin(b) => builtins::call(self, *b, args, kwargs),
            Value::Lambda(closure) => self.call_closure(closure, args, kwargs),
            other => Err(ExprError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    fn resolve(&self, name: &str) -> Result<Value, ExprError> {
        for frame in self.frames.iter().rev() {
            if let Some(v) = frame.get(name) {
                return Ok(v.clone());
            }
        }
        self.scope.lookup(name)
    }

    fn eval_opt(&mut self, expr: Option<&Expr>) -> Result<Option<Value>, ExprError> {
        expr.map(|e| self.eval(e)).transpose()
    }

    fn eval_bool_op(&mut self, op: BoolOperator, values: &[Expr]) -> Result<Value, ExprError> {
        let mut last = Value::None;
        for expr in values {
            last = self.eval(expr)?;
            let decided = match op {
                BoolOperator::And => !last.truthy(),
                BoolOperator::Or => last.truthy(),
            };
            if decided {
                break;
            }
        }
        Ok(last)
    }

    fn eval_call(
        &mut self,
        func: &Expr,
        args: &[Expr],
        kwargs: &[(String, Expr)],
    ) -> Result<Value, ExprError> {
        // Methods need the receiver, so `a.b(...)` is not evaluated as `(a.b)(...)`.
        if let Expr::Attribute { value, attr } = func {
            let receiver = self.eval(value)?;
            let (args, kwargs) = self.eval_args(args, kwargs)?;
            if let Some(result) =
                builtins::call_method(&receiver, attr, &args, &kwargs)?
            {
                return Ok(result);
            }
            let callee = receiver.get_attr(attr)?;
            return self.call_value(&callee, args, kwargs);
        }

        let callee = self.eval(func)?;
        let (args, kwargs) = self.eval_args(args, kwargs)?;
        self.call_value(&callee, args, kwargs)
    }

    fn eval_args(
        &mut self,
        args: &[Expr],
        kwargs: &[(String, Expr)],
    ) -> Result<(Vec<Value>, Vec<(String, Value)>), ExprError> {
        let args = args
            .iter()
            .map(|a| self.eval(a))
            .collect::<Result<Vec<_>, _>>()?;
        let kwargs = kwargs
            .iter()
            .map(|(k, e)| Ok((k.clone(), self.eval(e)?)))
            .collect::<Result<Vec<_>, ExprError>>()?;
        Ok((args, kwargs))
    }

    fn make_closure(&mut self, def: &Arc<LambdaDef>) -> Result<Value, ExprError> {
        let defaults = def
            .params
            .iter()
            .map(|p| self.eval_opt(p.default.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        let mut captured = Map::new();
        for frame in &self.frames {
            captured.extend(frame.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Ok(Value::Lambda(Arc::new(Closure {
            def: Arc::clone(def),
            defaults,
            captured,
        })))
    }

    fn call_closure(
        &mut self,
        closure: &Closure,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, ExprError> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(ExprError::call("<lambda>", "maximum recursion depth exceeded"));
        }
        let def = &closure.def;
        let mut locals = closure.captured.clone();
        let mut bound: Vec<Option<Value>> = vec![None; def.params.len()];

        let mut positional = args.into_iter();
        for slot in bound.iter_mut() {
            match positional.next() {
                Some(v) => *slot = Some(v),
                None => break,
            }
        }
        let extra: Vec<Value> = positional.collect();
        match &def.vararg {
            Some(name) => {
                locals.insert(name.clone(), Value::list(extra));
            }
            None if !extra.is_empty() => {
                return Err(ExprError::call(
                    "<lambda>",
                    format!(
                        "takes {} positional arguments but {} were given",
                        def.params.len(),
                        def.params.len() + extra.len()
                    ),
                ));
            }
            None => {}
        }

        let mut extra_kwargs = Map::new();
        for (name, value) in kwargs {
            match def.params.iter().position(|p| p.name == name) {
                Some(i) if bound[i].is_some() => {
                    return Err(ExprError::call(
                        "<lambda>",
                        format!("got multiple values for argument '{}'", name),
                    ));
                }
                Some(i) => bound[i] = Some(value),
                None if def.kwarg.is_some() => {
                    extra_kwargs.insert(name, value);
                }
                None => {
                    return Err(ExprError::call(
                        "<lambda>",
                        format!("got an unexpected keyword argument '{}'", name),
                    ));
                }
            }
        }
        if let Some(name) = &def.kwarg {
            locals.insert(name.clone(), Value::map(extra_kwargs));
        }

        for ((param, slot), default) in def.params.iter().zip(bound).zip(&closure.defaults) {
            let value = slot.or_else(|| default.clone()).ok_or_else(|| {
                ExprError::call(
                    "<lambda>",
                    format!("missing required argument '{}'", param.name),
                )
            })?;
            locals.insert(param.name.clone(), value);
        }

        let saved = std::mem::replace(&mut self.frames, vec![locals]);
        self.depth += 1;
        let result = self.eval(&def.body);
        self.depth -= 1;
        self.frames = saved;
        result
    }

    fn with_frame<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ExprError>,
    ) -> Result<T, ExprError> {
        self.frames.push(Map::new());
        let result = f(self);
        self.frames.pop();
        result
    }

    fn run_generators(
        &mut self,
        generators: &[Comprehension],
        emit: &mut dyn FnMut(&mut Self) -> Result<(), ExprError>,
    ) -> Result<(), ExprError> {
        let Some((first, rest)) = generators.split_first() else {
            return emit(self);
        };
        let items = self.eval(&first.iter)?.iterate()?;
        'items: for item in items {
            self.bind_target(&first.target, item)?;
            for condition in &first.conditions {
                if !self.eval(condition)?.truthy() {
                    continue 'items;
                }
            }
            self.run_generators(rest, emit)?;
        }
        Ok(())
    }

    fn bind_target(&mut self, target: &Target, item: Value) -> Result<(), ExprError> {
        let Some(frame) = self.frames.last_mut() else {
            return Err(ExprError::type_error("comprehension evaluated outside a frame"));
        };
        match target {
            Target::Name(name) => {
                frame.insert(name.clone(), item);
            }
            Target::Tuple(names) => {
                let parts = item.iterate()?;
                if parts.len() != names.len() {
                    return Err(ExprError::type_error(format!(
                        "cannot unpack {} values into {} names",
                        parts.len(),
                        names.len()
                    )));
                }
                for (name, part) in names.iter().zip(parts) {
                    frame.insert(name.clone(), part);
                }
            }
        }
        Ok(())
    }
}

fn literal(lit: &Literal) -> Value {
    match lit {
        Literal::None => Value::None,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(n) => Value::Int(*n),
        Literal::Float(f) => Value::Float(*f),
        Literal::Str(s) => Value::Str(s.clone()),
    }
}

fn slice(
    target: &Value,
    lower: Option<Value>,
    upper: Option<Value>,
    step: Option<Value>,
) -> Result<Value, ExprError> {
    let bound = |v: Option<Value>| -> Result<Option<i64>, ExprError> {
        match v {
            None | Some(Value::None) => Ok(None),
            Some(v) => v
                .as_int()
                .map(Some)
                .ok_or_else(|| ExprError::type_error("slice indices must be integers")),
        }
    };
    let (lower, upper, step) = (bound(lower)?, bound(upper)?, bound(step)?.unwrap_or(1));
    if step == 0 {
        return Err(ExprError::type_error("slice step cannot be zero"));
    }

    let pick = |len: usize| -> Vec<usize> {
        let len = len as i64;
        let clamp = |i: i64, lo: i64, hi: i64| if i < 0 { (i + len).max(lo) } else { i.min(hi) };
        let mut out = Vec::new();
        if step > 0 {
            let start = lower.map_or(0, |i| clamp(i, 0, len));
            let stop = upper.map_or(len, |i| clamp(i, 0, len));
            let mut i = start;
            while i < stop {
                out.push(i as usize);
                i += step;
            }
        } else {
            let start = lower.map_or(len - 1, |i| clamp(i, -1, len - 1));
            let stop = upper.map_or(-1, |i| clamp(i, -1, len - 1));
            let mut i = start;
            while i > stop {
                out.push(i as usize);
                i += step;
            }
        }
        out
    };

    match target {
        Value::List(items) => Ok(Value::list(
            pick(items.len()).into_iter().map(|i| items[i].clone()).collect(),
        )),
        Value::Str(s) | Value::Markup(s) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::Str(
                pick(chars.len()).into_iter().map(|i| chars[i]).collect(),
            ))
        }
        other => Err(ExprError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}
