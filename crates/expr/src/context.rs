//! The value model every template expression evaluates against.

use crate::error::ExprError;
use crate::value::{Builtin, Map, Value};

/// Name resolution seen by the evaluator for free variables.
pub trait Scope {
    fn lookup(&self, name: &str) -> Result<Value, ExprError>;

    fn defined(&self, name: &str) -> bool;
}

/// Render values: an ordered name -> value mapping seeded with builtins.
///
/// Slot `0` (also reachable as the name `"0"`) holds the body markup a
/// caller passes to the template it calls.
#[derive(Debug, Clone)]
pub struct Values {
    entries: Map,
    body: Option<Value>,
}

impl Default for Values {
    fn default() -> Self {
        Self::new()
    }
}

impl Values {
    pub fn new() -> Self {
        let entries = Builtin::ALL
            .iter()
            .map(|b| (b.name().to_string(), Value::Builtin(*b)))
            .collect();
        Self {
            entries,
            body: None,
        }
    }

    /// Builds values from a JSON object; non-object inputs yield just the builtins.
    pub fn from_json(json: serde_json::Value) -> Self {
        let mut values = Self::new();
        if let Value::Map(map) = Value::from(json) {
            values.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        values
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        if name == "0" {
            return self.body.as_ref();
        }
        self.entries.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        if name == "0" {
            self.body = Some(value.into());
        } else {
            self.entries.insert(name, value.into());
        }
    }

    pub fn extend<I, K>(&mut self, iter: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        for (k, v) in iter {
            self.set(k, v);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// A new scope with the same entries; later rebinding in either is not shared.
    pub fn copy(&self) -> Values {
        self.clone()
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn set_body(&mut self, body: Value) {
        self.body = Some(body);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Scope for Values {
    /// Lenient lookup: unknown names evaluate to `None`.
    fn lookup(&self, name: &str) -> Result<Value, ExprError> {
        Ok(self.get(name).cloned().unwrap_or(Value::None))
    }

    fn defined(&self, name: &str) -> bool {
        self.contains(name)
    }
}
