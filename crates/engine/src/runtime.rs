//! Render-time helpers shared by the compiled executor and the interpreter:
//! loop iteration, attribute collection and emission, and field widgets.

use crate::engine::QWeb;
use crate::fields::{ConvertError, FieldContext, escape_value, resolve_converter_name};
use crate::ir::{AttrPart, Format, FormatPart};
use crate::options::RenderOptions;
use itertools::Itertools;
use qweb_expr::{Expr, ExprError, Map, Value, Values};
use quick_xml::escape::escape;

/// Materializes a `t-foreach` iterable into `(item, value)` pairs.
///
/// Sequences yield each element as both; mappings yield `(key, value)`; an
/// integer `n` iterates `0..n`; `None` and `False` iterate nothing.
pub(crate) fn foreach_items(iterable: &Value) -> Result<Vec<(Value, Value)>, ExprError> {
    match iterable {
        Value::None | Value::Bool(false) => Ok(Vec::new()),
        Value::Int(n) => Ok((0..(*n).max(0))
            .map(|i| (Value::Int(i), Value::Int(i)))
            .collect()),
        Value::Map(map) => Ok(map
            .iter()
            .map(|(k, v)| (Value::str(k.clone()), v.clone()))
            .collect()),
        Value::Record(_) => Ok(vec![(iterable.clone(), iterable.clone())]),
        Value::List(_) | Value::Str(_) | Value::Markup(_) => Ok(iterable
            .iterate()?
            .into_iter()
            .map(|item| (item.clone(), item))
            .collect()),
        other => Err(ExprError::type_error(format!(
            "t-foreach cannot iterate over '{}'",
            other.type_name()
        ))),
    }
}

/// Binds the loop variables of one iteration.
///
/// Without a name, mapping values are splatted into the scope instead.
pub(crate) fn bind_loop_vars(
    values: &mut Values,
    name: Option<&str>,
    index: usize,
    size: usize,
    item: Value,
    value: Value,
) {
    let Some(name) = name else {
        if let Value::Map(map) = &value {
            values.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        return;
    };
    values.set(name, item);
    values.set(format!("{}_value", name), value);
    values.set(format!("{}_index", name), index);
    values.set(format!("{}_first", name), index == 0);
    values.set(format!("{}_last", name), index + 1 == size);
    values.set(format!("{}_even", name), index % 2 == 0);
    values.set(format!("{}_odd", name), index % 2 == 1);
    values.set(
        format!("{}_parity", name),
        if index % 2 == 0 { "even" } else { "odd" },
    );
    if index == 0 {
        values.set(format!("{}_size", name), size);
    }
}

/// Copies back every key of `outer` that the loop scope may have rebound.
pub(crate) fn copy_back(outer: &mut Values, loop_scope: &Values) {
    let keys: Vec<String> = outer.iter().map(|(k, _)| k.clone()).collect();
    for key in keys {
        if let Some(value) = loop_scope.get(&key) {
            outer.set(key, value.clone());
        }
    }
}

pub(crate) fn render_format<E>(
    format: &Format,
    mut eval: impl FnMut(&Expr) -> Result<Value, E>,
) -> Result<String, E> {
    let mut out = String::new();
    for part in &format.0 {
        match part {
            FormatPart::Literal(text) => out.push_str(text),
            FormatPart::Expr(expr) => out.push_str(&eval(expr)?.to_text()),
        }
    }
    Ok(out)
}

/// Evaluates attribute parts in document order into one map.
pub(crate) fn collect_attributes(
    parts: &[AttrPart],
    mut eval: impl FnMut(&Expr) -> Result<Value, ExprError>,
    into: &mut Map,
) -> Result<(), ExprError> {
    for part in parts {
        match part {
            AttrPart::Static(name, value) => {
                into.insert(name.clone(), Value::str(value.clone()));
            }
            AttrPart::Expr(name, expr) => {
                let value = eval(expr)?;
                into.insert(name.clone(), value);
            }
            AttrPart::Format(name, format) => {
                let value = render_format(format, &mut eval)?;
                into.insert(name.clone(), Value::str(value));
            }
            AttrPart::Spread(expr) => {
                let value = eval(expr)?;
                merge_spread(into, &value)?;
            }
        }
    }
    Ok(())
}

/// Merges a `t-att` value: a mapping, a `[name, value]` pair or a list of pairs.
pub(crate) fn merge_spread(into: &mut Map, value: &Value) -> Result<(), ExprError> {
    match value {
        Value::None | Value::Bool(false) => Ok(()),
        Value::Map(map) => {
            into.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
            Ok(())
        }
        Value::List(items) if items.iter().all(is_pair) && !items.is_empty() => {
            for item in items.iter() {
                merge_pair(into, item)?;
            }
            Ok(())
        }
        Value::List(items) if items.len() == 2 => merge_pair(into, value),
        other => Err(ExprError::type_error(format!(
            "t-att expects a mapping or a (name, value) pair, got '{}'",
            other.type_name()
        ))),
    }
}

fn is_pair(value: &Value) -> bool {
    matches!(value, Value::List(items) if items.len() == 2)
}

fn merge_pair(into: &mut Map, pair: &Value) -> Result<(), ExprError> {
    let Value::List(items) = pair else {
        return Err(ExprError::type_error("t-att pair must be a list"));
    };
    let name = items[0]
        .as_str()
        .ok_or_else(|| ExprError::type_error("t-att attribute name must be a string"))?;
    into.insert(name.to_string(), items[1].clone());
    Ok(())
}

/// Writes ` name="value"` for every attribute worth emitting: truthy values
/// and strings, including the empty string. Lists are joined with spaces.
pub(crate) fn emit_attributes(attributes: &Map, out: &mut String) {
    for (name, value) in attributes {
        if !(value.truthy() || value.is_string()) {
            continue;
        }
        let text = match value {
            Value::List(items) => escape(items.iter().map(Value::to_text).join(" ").as_str())
                .into_owned(),
            other => escape_value(other),
        };
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&text);
        out.push('"');
    }
}

/// What a field converter produced for one `t-field`.
#[derive(Debug, Clone, Default)]
pub(crate) struct FieldOutput {
    pub attributes: Map,
    pub content: Option<String>,
    /// Render the element even when it has no content.
    pub force_display: bool,
}

fn field_context<'a>(
    engine: &'a QWeb,
    options: &RenderOptions,
    expression: &'a str,
    field_type: &'a str,
) -> FieldContext<'a> {
    FieldContext {
        lang: engine.lang_format(options.lang.as_deref()),
        inherit_branding: options.inherit_branding,
        translatable: options.translatable,
        expression,
        field_type,
    }
}

/// Runs the converter for `record.field`. The record may be a model record,
/// a plain mapping, or `None`/`False` for a missing relation.
pub(crate) fn render_field(
    engine: &QWeb,
    options: &RenderOptions,
    record: &Value,
    field: &str,
    expression: &str,
    field_options: &Map,
) -> Result<FieldOutput, ConvertError> {
    let mut output = FieldOutput {
        force_display: options.inherit_branding,
        ..FieldOutput::default()
    };
    match record {
        Value::Record(record) => {
            let value = record.get(field).unwrap_or(Value::None);
            let name = resolve_converter_name(field_options, record.field_type(field), &value);
            let converter = engine.converters().get(&name);
            let ctx = field_context(engine, options, expression, &name);
            output.attributes = converter.attributes(record.as_ref(), field, field_options, &ctx);
            output.content = converter.record_to_html(record.as_ref(), field, field_options, &ctx)?;
        }
        Value::Map(map) => {
            let value = map.get(field).cloned().unwrap_or(Value::None);
            let name = resolve_converter_name(field_options, None, &value);
            let converter = engine.converters().get(&name);
            let ctx = field_context(engine, options, expression, &name);
            output.content = converter.value_to_html(&value, field_options, &ctx)?;
        }
        Value::None | Value::Bool(false) => {}
        other => {
            return Err(ConvertError::invalid_value(
                "field",
                other,
                format!("cannot read '{}' from it", field),
            ));
        }
    }
    if output.content.is_none()
        && let Some(null_text) = field_options.get("null_text")
    {
        output.content = Some(escape_value(null_text));
    }
    Ok(output)
}

/// Renders a `t-esc`/`t-raw` value through the widget named in its options.
pub(crate) fn render_widget(
    engine: &QWeb,
    options: &RenderOptions,
    value: &Value,
    widget_options: &Map,
) -> Result<Option<String>, ConvertError> {
    let name = resolve_converter_name(widget_options, None, value);
    let converter = engine.converters().get(&name);
    let ctx = field_context(engine, options, "", &name);
    converter.value_to_html(value, widget_options, &ctx)
}

/// Combines a `t-options` base mapping with `t-options-<key>` overrides.
pub(crate) fn widget_options(base: Option<Value>, items: Vec<(String, Value)>) -> Result<Map, ExprError> {
    let mut options = match base {
        None | Some(Value::None) | Some(Value::Bool(false)) => Map::new(),
        Some(Value::Map(map)) => map.as_ref().clone(),
        Some(other) => {
            return Err(ExprError::type_error(format!(
                "t-options must be a mapping, got '{}'",
                other.type_name()
            )));
        }
    };
    options.extend(items);
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, Value)]) -> Map {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_integer_iterates_range() {
        let items = foreach_items(&Value::Int(3)).unwrap();
        assert_eq!(
            items.into_iter().map(|(item, _)| item).collect::<Vec<_>>(),
            vec![Value::Int(0), Value::Int(1), Value::Int(2)]
        );
        assert!(foreach_items(&Value::Bool(false)).unwrap().is_empty());
        assert!(foreach_items(&Value::Float(1.5)).is_err());
    }

    #[test]
    fn test_mapping_yields_key_and_value() {
        let mut map = Map::new();
        map.insert("a".into(), Value::Int(1));
        let items = foreach_items(&Value::map(map)).unwrap();
        assert_eq!(items, vec![(Value::str("a"), Value::Int(1))]);
    }

    #[test]
    fn test_loop_vars() {
        let mut values = Values::new();
        bind_loop_vars(&mut values, Some("x"), 0, 2, Value::str("a"), Value::str("a"));
        bind_loop_vars(&mut values, Some("x"), 1, 2, Value::str("b"), Value::str("b"));
        assert_eq!(values.get("x"), Some(&Value::str("b")));
        assert_eq!(values.get("x_index"), Some(&Value::Int(1)));
        assert_eq!(values.get("x_last"), Some(&Value::Bool(true)));
        assert_eq!(values.get("x_parity"), Some(&Value::str("odd")));
        assert_eq!(values.get("x_size"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_copy_back_only_touches_outer_keys() {
        let mut outer = Values::new();
        outer.set("total", 0);
        let mut inner = outer.copy();
        inner.set("total", 5);
        inner.set("tmp", 1);
        copy_back(&mut outer, &inner);
        assert_eq!(outer.get("total"), Some(&Value::Int(5)));
        assert!(!outer.contains("tmp"));
    }

    #[test]
    fn test_attribute_emission_rules() {
        let mut out = String::new();
        emit_attributes(
            &attrs(&[
                ("empty", Value::str("")),
                ("zero", Value::Int(0)),
                ("off", Value::Bool(false)),
                ("none", Value::None),
                ("class", Value::list(vec![Value::str("a"), Value::str("b")])),
                ("title", Value::str("x\"y")),
            ]),
            &mut out,
        );
        assert_eq!(out, r#" empty="" class="a b" title="x&quot;y""#);
    }

    #[test]
    fn test_spread_forms() {
        let mut map = Map::new();
        merge_spread(
            &mut map,
            &Value::list(vec![Value::str("id"), Value::str("main")]),
        )
        .unwrap();
        merge_spread(
            &mut map,
            &Value::list(vec![Value::list(vec![Value::str("a"), Value::Int(1)])]),
        )
        .unwrap();
        assert_eq!(map.get("id"), Some(&Value::str("main")));
        assert_eq!(map.get("a"), Some(&Value::Int(1)));
        assert!(merge_spread(&mut map, &Value::Int(3)).is_err());
    }
}
