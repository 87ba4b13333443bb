//! Field converters used by `t-field` and by `t-esc`/`t-raw` with `t-options`.
//!
//! A converter turns a value into HTML and, for record fields, contributes
//! attributes to the decorated element. Converters are looked up by name in a
//! [`ConverterRegistry`]; unknown names resolve to the `default` converter.

mod barcode;
mod basic;
mod monetary;
mod sanitize;
mod temporal;

pub use barcode::BarcodeConverter;
pub use basic::{
    BooleanConverter, CharConverter, DefaultConverter, FloatConverter, HtmlConverter,
    IntegerConverter, Many2OneConverter, TextConverter,
};
pub use monetary::MonetaryConverter;
pub use temporal::{DateConverter, DateTimeConverter};

use crate::config::LangFormat;
use log::warn;
use qweb_expr::{Map, Record, Value};
use quick_xml::escape::escape;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvertError {
    #[error("{converter} converter cannot render {value}: {message}")]
    InvalidValue {
        converter: String,
        value: String,
        message: String,
    },

    #[error("Invalid '{option}' option: {message}")]
    InvalidOption { option: String, message: String },
}

impl ConvertError {
    pub fn invalid_value(converter: &str, value: &Value, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            converter: converter.to_string(),
            value: value.py_repr(),
            message: message.into(),
        }
    }

    pub fn invalid_option(option: &str, message: impl Into<String>) -> Self {
        Self::InvalidOption {
            option: option.to_string(),
            message: message.into(),
        }
    }
}

/// Render state a converter may consult.
#[derive(Debug, Clone, Copy)]
pub struct FieldContext<'a> {
    pub lang: &'a LangFormat,
    pub inherit_branding: bool,
    pub translatable: bool,
    /// The `t-field` expression, e.g. `doc.partner_id`.
    pub expression: &'a str,
    /// Resolved converter name.
    pub field_type: &'a str,
}

pub trait FieldConverter: Send + Sync + Debug {
    /// Attributes merged into the element rendering `field` of `record`.
    fn attributes(
        &self,
        record: &dyn Record,
        field: &str,
        _options: &Map,
        ctx: &FieldContext,
    ) -> Map {
        let mut attrs = Map::new();
        if ctx.inherit_branding {
            attrs.insert("data-oe-model".into(), Value::str(record.model()));
            attrs.insert(
                "data-oe-id".into(),
                record.id().map(Value::Int).unwrap_or(Value::None),
            );
            attrs.insert("data-oe-field".into(), Value::str(field));
            attrs.insert("data-oe-type".into(), Value::str(ctx.field_type));
            attrs.insert("data-oe-expression".into(), Value::str(ctx.expression));
        }
        if ctx.translatable && matches!(ctx.field_type, "char" | "text") {
            attrs.insert("data-oe-translate".into(), Value::str("1"));
        }
        attrs
    }

    fn record_to_html(
        &self,
        record: &dyn Record,
        field: &str,
        options: &Map,
        ctx: &FieldContext,
    ) -> Result<Option<String>, ConvertError> {
        let value = record.get(field).unwrap_or(Value::None);
        self.value_to_html(&value, options, ctx)
    }

    /// HTML for `value`, or `None` when there is nothing to display.
    fn value_to_html(
        &self,
        value: &Value,
        options: &Map,
        ctx: &FieldContext,
    ) -> Result<Option<String>, ConvertError>;
}

/// Converters by name, with `default` as the fallback.
#[derive(Debug, Clone)]
pub struct ConverterRegistry {
    converters: HashMap<String, Arc<dyn FieldConverter>>,
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ConverterRegistry {
    pub fn empty() -> Self {
        let mut converters: HashMap<String, Arc<dyn FieldConverter>> = HashMap::new();
        converters.insert("default".into(), Arc::new(DefaultConverter));
        Self { converters }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("char", CharConverter);
        registry.register("selection", CharConverter);
        registry.register("text", TextConverter);
        registry.register("integer", IntegerConverter);
        registry.register("float", FloatConverter);
        registry.register("monetary", MonetaryConverter);
        registry.register("html", HtmlConverter);
        registry.register("boolean", BooleanConverter);
        registry.register("date", DateConverter);
        registry.register("datetime", DateTimeConverter);
        registry.register("many2one", Many2OneConverter);
        registry.register("barcode", BarcodeConverter);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, converter: impl FieldConverter + 'static) {
        self.converters.insert(name.into(), Arc::new(converter));
    }

    pub fn register_arc(&mut self, name: impl Into<String>, converter: Arc<dyn FieldConverter>) {
        self.converters.insert(name.into(), converter);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.converters.contains_key(name)
    }

    /// The converter registered as `name`, or the default one.
    pub fn get(&self, name: &str) -> Arc<dyn FieldConverter> {
        if let Some(converter) = self.converters.get(name) {
            return converter.clone();
        }
        warn!("No field converter named '{}', using the default", name);
        self.default_converter()
    }

    fn default_converter(&self) -> Arc<dyn FieldConverter> {
        self.converters
            .get("default")
            .cloned()
            .unwrap_or_else(|| Arc::new(DefaultConverter))
    }
}

/// Converter name for a field: the `widget` option, then the declared type,
/// then a guess from the value.
pub fn resolve_converter_name(options: &Map, declared: Option<String>, value: &Value) -> String {
    if let Some(Value::Str(widget)) = options.get("widget")
        && !widget.is_empty()
    {
        return widget.clone();
    }
    declared.unwrap_or_else(|| infer_type(value).to_string())
}

pub fn infer_type(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "boolean",
        Value::Int(_) => "integer",
        Value::Float(_) => "float",
        Value::Str(_) => "char",
        Value::Markup(_) => "html",
        Value::Record(_) => "many2one",
        _ => "default",
    }
}

/// Escaped text of a value; `Markup` is already safe.
pub fn escape_value(value: &Value) -> String {
    match value {
        Value::Markup(html) => html.clone(),
        other => escape(other.to_text().as_str()).into_owned(),
    }
}

pub(crate) fn nl2br(html: &str) -> String {
    html.replace("\r\n", "<br/>").replace('\n', "<br/>")
}

pub(crate) fn option_int(options: &Map, key: &str) -> Result<Option<i64>, ConvertError> {
    match options.get(key) {
        None | Some(Value::None) => Ok(None),
        Some(Value::Int(n)) => Ok(Some(*n)),
        Some(Value::Float(f)) if f.fract() == 0.0 => Ok(Some(*f as i64)),
        Some(Value::Str(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConvertError::invalid_option(key, format!("'{}' is not an integer", s))),
        Some(other) => Err(ConvertError::invalid_option(
            key,
            format!("expected an integer, got {}", other.type_name()),
        )),
    }
}

pub(crate) fn option_str<'a>(options: &'a Map, key: &str) -> Option<&'a str> {
    options.get(key).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qweb_expr::MapRecord;

    fn ctx<'a>(lang: &'a LangFormat, field_type: &'a str) -> FieldContext<'a> {
        FieldContext {
            lang,
            inherit_branding: true,
            translatable: true,
            expression: "doc.name",
            field_type,
        }
    }

    #[test]
    fn test_unknown_name_falls_back_to_default() {
        let registry = ConverterRegistry::with_defaults();
        let lang = LangFormat::default();
        let html = registry
            .get("no-such-widget")
            .value_to_html(&Value::str("<b>"), &Map::new(), &ctx(&lang, "x"))
            .unwrap();
        assert_eq!(html.as_deref(), Some("&lt;b&gt;"));
    }

    #[test]
    fn test_branding_attributes() {
        let lang = LangFormat::default();
        let record = MapRecord::new("res.partner", Some(7)).with_field("name", "char", "Bob");
        let attrs = CharConverter.attributes(&record, "name", &Map::new(), &ctx(&lang, "char"));
        assert_eq!(attrs.get("data-oe-model"), Some(&Value::str("res.partner")));
        assert_eq!(attrs.get("data-oe-id"), Some(&Value::Int(7)));
        assert_eq!(attrs.get("data-oe-translate"), Some(&Value::str("1")));
        assert_eq!(
            attrs.get("data-oe-expression"),
            Some(&Value::str("doc.name"))
        );
    }

    #[test]
    fn test_widget_option_wins() {
        let mut options = Map::new();
        options.insert("widget".into(), Value::str("monetary"));
        assert_eq!(
            resolve_converter_name(&options, Some("float".into()), &Value::Float(1.0)),
            "monetary"
        );
        assert_eq!(
            resolve_converter_name(&Map::new(), None, &Value::Float(1.0)),
            "float"
        );
    }
}
