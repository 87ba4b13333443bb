//! Runtime values manipulated by template expressions.
//!
//! Semantics follow Python's data model closely enough for templates:
//! truthiness, equality across numeric types, `str()`/`repr()` rendering,
//! iteration, membership and indexing.

use crate::ast::LambdaDef;
use crate::error::ExprError;
use indexmap::IndexMap;
use itertools::Itertools;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

pub type Map = IndexMap<String, Value>;

/// A record supplied by the host data layer (an ORM row, a DTO, ...).
///
/// The template engine only reads from records; field types drive the
/// choice of field converter for `t-field`.
pub trait Record: Send + Sync + fmt::Debug {
    fn model(&self) -> &str;

    fn id(&self) -> Option<i64>;

    fn get(&self, field: &str) -> Option<Value>;

    /// Declared type of a field (`char`, `monetary`, `many2one`, ...).
    fn field_type(&self, field: &str) -> Option<String>;

    fn display_name(&self) -> String {
        match self.get("display_name").or_else(|| self.get("name")) {
            Some(Value::Str(name)) => name,
            _ => match self.id() {
                Some(id) => format!("{},{}", self.model(), id),
                None => self.model().to_string(),
            },
        }
    }
}

/// A simple in-memory [`Record`] backed by an ordered field map.
#[derive(Debug, Clone, Default)]
pub struct MapRecord {
    model: String,
    id: Option<i64>,
    fields: IndexMap<String, (String, Value)>,
}

impl MapRecord {
    pub fn new(model: impl Into<String>, id: Option<i64>) -> Self {
        Self {
            model: model.into(),
            id,
            fields: IndexMap::new(),
        }
    }

    pub fn with_field(
        mut self,
        name: impl Into<String>,
        field_type: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.fields
            .insert(name.into(), (field_type.into(), value.into()));
        self
    }

    pub fn into_value(self) -> Value {
        Value::Record(Arc::new(self))
    }
}

impl Record for MapRecord {
    fn model(&self) -> &str {
        &self.model
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn get(&self, field: &str) -> Option<Value> {
        match field {
            "id" => Some(self.id.map(Value::Int).unwrap_or(Value::Bool(false))),
            _ => self.fields.get(field).map(|(_, v)| v.clone()),
        }
    }

    fn field_type(&self, field: &str) -> Option<String> {
        match field {
            "id" => Some("integer".to_string()),
            _ => self.fields.get(field).map(|(t, _)| t.clone()),
        }
    }
}

/// Functions available to every expression without being passed in by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Len,
    Str,
    Int,
    Float,
    Bool,
    List,
    Tuple,
    Dict,
    Range,
    Min,
    Max,
    Sum,
    Abs,
    Round,
    Sorted,
    Reversed,
    Enumerate,
    Zip,
    Any,
    All,
    Repr,
    Defined,
}

impl Builtin {
    pub const ALL: &'static [Builtin] = &[
        Builtin::Len,
        Builtin::Str,
        Builtin::Int,
        Builtin::Float,
        Builtin::Bool,
        Builtin::List,
        Builtin::Tuple,
        Builtin::Dict,
        Builtin::Range,
        Builtin::Min,
        Builtin::Max,
        Builtin::Sum,
        Builtin::Abs,
        Builtin::Round,
        Builtin::Sorted,
        Builtin::Reversed,
        Builtin::Enumerate,
        Builtin::Zip,
        Builtin::Any,
        Builtin::All,
        Builtin::Repr,
        Builtin::Defined,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Len => "len",
            Builtin::Str => "str",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Bool => "bool",
            Builtin::List => "list",
            Builtin::Tuple => "tuple",
            Builtin::Dict => "dict",
            Builtin::Range => "range",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Sum => "sum",
            Builtin::Abs => "abs",
            Builtin::Round => "round",
            Builtin::Sorted => "sorted",
            Builtin::Reversed => "reversed",
            Builtin::Enumerate => "enumerate",
            Builtin::Zip => "zip",
            Builtin::Any => "any",
            Builtin::All => "all",
            Builtin::Repr => "repr",
            Builtin::Defined => "defined",
        }
    }
}

/// A lambda together with its evaluated defaults and captured locals.
#[derive(Debug)]
pub struct Closure {
    pub def: Arc<LambdaDef>,
    pub defaults: Vec<Option<Value>>,
    pub captured: Map,
}

#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Markup that is already safe to emit as HTML; never escaped again.
    Markup(String),
    List(Arc<Vec<Value>>),
    Map(Arc<Map>),
    Record(Arc<dyn Record>),
    Builtin(Builtin),
    Lambda(Arc<Closure>),
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }

    pub fn map(map: Map) -> Self {
        Value::Map(Arc::new(map))
    }

    pub fn markup(html: impl Into<String>) -> Self {
        Value::Markup(html.into())
    }

    pub fn str(text: impl Into<String>) -> Self {
        Value::Str(text.into())
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) | Value::Markup(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Record(r) => r.id().is_some(),
            Value::Builtin(_) | Value::Lambda(_) => true,
        }
    }

    /// `None` or `False`: the only values that trigger a directive's fallback body.
    pub fn is_none_or_false(&self) -> bool {
        matches!(self, Value::None | Value::Bool(false))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::Str(_) | Value::Markup(_))
    }

    pub fn type_name(&self) -> &str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Markup(_) => "Markup",
            Value::List(_) => "list",
            Value::Map(_) => "dict",
            Value::Record(r) => r.model(),
            Value::Builtin(_) => "builtin_function_or_method",
            Value::Lambda(_) => "function",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Markup(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            Value::Bool(b) => Some(*b as i64 as f64),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Text used when a value is interpolated into output: `None` and `False` are empty.
    pub fn to_text(&self) -> String {
        match self {
            Value::None | Value::Bool(false) => String::new(),
            Value::Str(s) | Value::Markup(s) => s.clone(),
            other => other.py_str(),
        }
    }

    /// Equivalent of Python's `str()`.
    pub fn py_str(&self) -> String {
        match self {
            Value::Str(s) | Value::Markup(s) => s.clone(),
            other => other.py_repr(),
        }
    }

    /// Equivalent of Python's `repr()`.
    pub fn py_repr(&self) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => quote(s),
            Value::Markup(s) => format!("Markup({})", quote(s)),
            Value::List(items) => format!("[{}]", items.iter().map(Value::py_repr).join(", ")),
            Value::Map(map) => format!(
                "{{{}}}",
                map.iter()
                    .map(|(k, v)| format!("{}: {}", quote(k), v.py_repr()))
                    .join(", ")
            ),
            Value::Record(r) => match r.id() {
                Some(id) => format!("{}({},)", r.model(), id),
                None => format!("{}()", r.model()),
            },
            Value::Builtin(b) => format!("<built-in function {}>", b.name()),
            Value::Lambda(_) => "<function <lambda>>".to_string(),
        }
    }

    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Str(s) | Value::Markup(s) => Some(s.chars().count()),
            Value::List(items) => Some(items.len()),
            Value::Map(map) => Some(map.len()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Python equality (`==`), including `1 == 1.0 == True`.
    pub fn py_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a) | Value::Markup(a), Value::Str(b) | Value::Markup(b)) => a == b,
            (Value::Float(_), _) | (_, Value::Float(_)) => {
                match (self.as_float(), other.as_float()) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            }
            (Value::Int(_) | Value::Bool(_), Value::Int(_) | Value::Bool(_)) => {
                self.as_int() == other.as_int()
            }
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.py_eq(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|other| v.py_eq(other)))
            }
            (Value::Record(a), Value::Record(b)) => a.model() == b.model() && a.id() == b.id(),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Lambda(a), Value::Lambda(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Python identity (`is`), approximated for value types.
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Arc::ptr_eq(a, b),
            (Value::Record(a), Value::Record(b)) => Arc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Lambda(a), Value::Lambda(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Python ordering (`<`, `<=`, ...). Mixed, unordered types are a type error.
    pub fn py_cmp(&self, other: &Value) -> Result<Ordering, ExprError> {
        match (self, other) {
            (Value::Str(a) | Value::Markup(a), Value::Str(b) | Value::Markup(b)) => Ok(a.cmp(b)),
            (Value::Int(_) | Value::Bool(_), Value::Int(_) | Value::Bool(_)) => {
                Ok(self.as_int().cmp(&other.as_int()))
            }
            (
                Value::Int(_) | Value::Bool(_) | Value::Float(_),
                Value::Int(_) | Value::Bool(_) | Value::Float(_),
            ) => {
                let (a, b) = (self.as_float(), other.as_float());
                a.partial_cmp(&b).ok_or_else(|| {
                    ExprError::type_error("cannot order NaN values")
                })
            }
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.py_cmp(y)? {
                        Ordering::Equal => continue,
                        non_eq => return Ok(non_eq),
                    }
                }
                Ok(a.len().cmp(&b.len()))
            }
            _ => Err(ExprError::type_error(format!(
                "'<' not supported between instances of '{}' and '{}'",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    /// Attribute access: record fields, or mapping keys for plain data.
    pub fn get_attr(&self, attr: &str) -> Result<Value, ExprError> {
        match self {
            Value::Record(r) => r
                .get(attr)
                .ok_or_else(|| ExprError::attribute(r.model(), attr)),
            Value::Map(map) => map
                .get(attr)
                .cloned()
                .ok_or_else(|| ExprError::attribute("dict", attr)),
            other => Err(ExprError::attribute(other.type_name(), attr)),
        }
    }

    /// Subscript access: `seq[i]` (negative indices allowed), `mapping[key]`, `record['field']`.
    pub fn get_item(&self, key: &Value) -> Result<Value, ExprError> {
        match self {
            Value::List(items) => {
                let idx = normalize_index(key, items.len())?;
                Ok(items[idx].clone())
            }
            Value::Str(s) | Value::Markup(s) => {
                let chars: Vec<char> = s.chars().collect();
                let idx = normalize_index(key, chars.len())?;
                Ok(Value::Str(chars[idx].to_string()))
            }
            Value::Map(map) => {
                let k = key_string(key)?;
                map.get(&k)
                    .cloned()
                    .ok_or_else(|| ExprError::Key(key.py_repr()))
            }
            Value::Record(r) => {
                let k = key_string(key)?;
                r.get(&k).ok_or_else(|| ExprError::Key(key.py_repr()))
            }
            other => Err(ExprError::type_error(format!(
                "'{}' object is not subscriptable",
                other.type_name()
            ))),
        }
    }

    /// Materializes an iterable: sequences yield items, strings characters, mappings keys.
    pub fn iterate(&self) -> Result<Vec<Value>, ExprError> {
        match self {
            Value::List(items) => Ok(items.as_ref().clone()),
            Value::Str(s) | Value::Markup(s) => {
                Ok(s.chars().map(|c| Value::Str(c.to_string())).collect())
            }
            Value::Map(map) => Ok(map.keys().map(|k| Value::Str(k.clone())).collect()),
            other => Err(ExprError::type_error(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    /// Membership test (`item in self`).
    pub fn contains(&self, item: &Value) -> Result<bool, ExprError> {
        match self {
            Value::Str(s) | Value::Markup(s) => match item.as_str() {
                Some(needle) => Ok(s.contains(needle)),
                None => Err(ExprError::type_error(format!(
                    "'in <string>' requires string as left operand, not {}",
                    item.type_name()
                ))),
            },
            Value::List(items) => Ok(items.iter().any(|v| v.py_eq(item))),
            Value::Map(map) => Ok(key_string(item).is_ok_and(|k| map.contains_key(&k))),
            other => Err(ExprError::type_error(format!(
                "argument of type '{}' is not iterable",
                other.type_name()
            ))),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.py_eq(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.py_str())
    }
}

/// Mapping keys are strings; scalar keys are converted the way JSON objects expect.
pub fn key_string(key: &Value) -> Result<String, ExprError> {
    match key {
        Value::Str(s) | Value::Markup(s) => Ok(s.clone()),
        Value::Int(_) | Value::Float(_) | Value::Bool(_) | Value::None => Ok(key.py_str()),
        other => Err(ExprError::type_error(format!(
            "unhashable type: '{}'",
            other.type_name()
        ))),
    }
}

fn normalize_index(key: &Value, len: usize) -> Result<usize, ExprError> {
    let idx = key.as_int().ok_or_else(|| {
        ExprError::type_error(format!(
            "indices must be integers, not {}",
            key.type_name()
        ))
    })?;
    let resolved = if idx < 0 { idx + len as i64 } else { idx };
    if resolved < 0 || resolved >= len as i64 {
        return Err(ExprError::Index(format!("index {} out of range", idx)));
    }
    Ok(resolved as usize)
}

pub(crate) fn format_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "inf" } else { "-inf" }.to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::list(items)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::map(map)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::None)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::list(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(obj) => {
                Value::map(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!Value::None.truthy());
        assert!(!Value::Int(0).truthy());
        assert!(!Value::Float(0.0).truthy());
        assert!(!Value::str("").truthy());
        assert!(!Value::list(vec![]).truthy());
        assert!(Value::Int(-1).truthy());
        assert!(Value::str("0").truthy());
    }

    #[test]
    fn test_numeric_equality_across_types() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_eq!(Value::Bool(true), Value::Int(1));
        assert_ne!(Value::Int(0), Value::None);
        assert_eq!(Value::str("a"), Value::markup("a"));
    }

    #[test]
    fn test_text_rendering() {
        assert_eq!(Value::None.to_text(), "");
        assert_eq!(Value::Bool(false).to_text(), "");
        assert_eq!(Value::Bool(true).to_text(), "True");
        assert_eq!(Value::Int(0).to_text(), "0");
        assert_eq!(Value::Float(2.0).to_text(), "2.0");
        assert_eq!(Value::Float(0.5).to_text(), "0.5");
        let list = Value::list(vec![Value::Int(1), Value::str("a")]);
        assert_eq!(list.to_text(), "[1, 'a']");
    }

    #[test]
    fn test_from_json() {
        let value = Value::from(json!({"a": [1, 2.5, null], "b": "x"}));
        let map = value.as_map().unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(
            map["a"],
            Value::list(vec![Value::Int(1), Value::Float(2.5), Value::None])
        );
    }

    #[test]
    fn test_indexing() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(list.get_item(&Value::Int(-1)).unwrap(), Value::Int(3));
        assert!(matches!(
            list.get_item(&Value::Int(3)),
            Err(ExprError::Index(_))
        ));
        let map = Value::from(json!({"k": 1}));
        assert!(matches!(
            map.get_item(&Value::str("missing")),
            Err(ExprError::Key(_))
        ));
    }

    #[test]
    fn test_record_access() {
        let partner = MapRecord::new("res.partner", Some(7))
            .with_field("name", "char", "Agrolait")
            .into_value();
        assert_eq!(partner.get_attr("name").unwrap(), Value::str("Agrolait"));
        assert_eq!(partner.get_attr("id").unwrap(), Value::Int(7));
        assert!(matches!(
            partner.get_attr("missing"),
            Err(ExprError::Attribute { .. })
        ));
        if let Value::Record(r) = &partner {
            assert_eq!(r.display_name(), "Agrolait");
        }
    }

    #[test]
    fn test_ordering_errors_on_mixed_types() {
        assert!(Value::Int(1).py_cmp(&Value::str("a")).is_err());
        assert_eq!(
            Value::Int(1).py_cmp(&Value::Float(1.5)).unwrap(),
            Ordering::Less
        );
    }
}
