use super::sanitize::sanitize_html;
use super::{ConvertError, FieldContext, FieldConverter, escape_value, nl2br, option_int};
use qweb_expr::{Map, Value};

/// Escaped text; `Markup` passes through.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConverter;

impl FieldConverter for DefaultConverter {
    fn value_to_html(
        &self,
        value: &Value,
        _options: &Map,
        _ctx: &FieldContext,
    ) -> Result<Option<String>, ConvertError> {
        if value.is_none_or_false() {
            return Ok(None);
        }
        Ok(Some(escape_value(value)))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CharConverter;

impl FieldConverter for CharConverter {
    fn value_to_html(
        &self,
        value: &Value,
        options: &Map,
        ctx: &FieldContext,
    ) -> Result<Option<String>, ConvertError> {
        DefaultConverter.value_to_html(value, options, ctx)
    }
}

/// Escaped text with line breaks turned into `<br/>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextConverter;

impl FieldConverter for TextConverter {
    fn value_to_html(
        &self,
        value: &Value,
        options: &Map,
        ctx: &FieldContext,
    ) -> Result<Option<String>, ConvertError> {
        Ok(DefaultConverter
            .value_to_html(value, options, ctx)?
            .map(|html| nl2br(&html)))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerConverter;

impl FieldConverter for IntegerConverter {
    fn value_to_html(
        &self,
        value: &Value,
        _options: &Map,
        ctx: &FieldContext,
    ) -> Result<Option<String>, ConvertError> {
        let n = match value {
            Value::None | Value::Bool(false) => return Ok(None),
            Value::Int(n) => *n,
            Value::Float(f) if f.fract() == 0.0 => *f as i64,
            other => return Err(ConvertError::invalid_value("integer", other, "not an integer")),
        };
        let grouped = ctx.lang.group_digits(&n.unsigned_abs().to_string());
        Ok(Some(if n < 0 {
            format!("-{}", grouped)
        } else {
            grouped
        }))
    }
}

/// Decimal number with the `precision` option (or `digits: [total, precision]`).
/// Without a precision, trailing zeros are trimmed.
#[derive(Debug, Clone, Copy, Default)]
pub struct FloatConverter;

impl FloatConverter {
    fn precision(options: &Map) -> Result<Option<usize>, ConvertError> {
        if let Some(precision) = option_int(options, "precision")? {
            return Ok(Some(precision.max(0) as usize));
        }
        if let Some(Value::List(digits)) = options.get("digits")
            && let Some(precision) = digits.get(1).and_then(Value::as_int)
        {
            return Ok(Some(precision.max(0) as usize));
        }
        Ok(None)
    }
}

impl FieldConverter for FloatConverter {
    fn value_to_html(
        &self,
        value: &Value,
        options: &Map,
        ctx: &FieldContext,
    ) -> Result<Option<String>, ConvertError> {
        let f = match value {
            Value::None | Value::Bool(false) => return Ok(None),
            Value::Int(_) | Value::Float(_) => value.as_float().unwrap_or_default(),
            other => return Err(ConvertError::invalid_value("float", other, "not a number")),
        };
        match Self::precision(options)? {
            Some(precision) => Ok(Some(ctx.lang.format_number(f, precision))),
            None => {
                let formatted = ctx.lang.format_number(f, 6);
                let Some((int_part, frac)) = formatted.rsplit_once(ctx.lang.decimal_point.as_str())
                else {
                    return Ok(Some(formatted));
                };
                let trimmed = frac.trim_end_matches('0');
                let frac = if trimmed.is_empty() { "0" } else { trimmed };
                Ok(Some(format!(
                    "{}{}{}",
                    int_part, ctx.lang.decimal_point, frac
                )))
            }
        }
    }
}

/// Markup reduced to an allow-list of elements and attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlConverter;

impl FieldConverter for HtmlConverter {
    fn value_to_html(
        &self,
        value: &Value,
        _options: &Map,
        _ctx: &FieldContext,
    ) -> Result<Option<String>, ConvertError> {
        if value.is_none_or_false() {
            return Ok(None);
        }
        Ok(Some(sanitize_html(&value.to_text())))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanConverter;

impl FieldConverter for BooleanConverter {
    fn value_to_html(
        &self,
        value: &Value,
        _options: &Map,
        _ctx: &FieldContext,
    ) -> Result<Option<String>, ConvertError> {
        match value {
            Value::None => Ok(None),
            other => Ok(Some(Value::Bool(other.truthy()).py_str())),
        }
    }
}

/// Display name of a related record.
#[derive(Debug, Clone, Copy, Default)]
pub struct Many2OneConverter;

impl FieldConverter for Many2OneConverter {
    fn value_to_html(
        &self,
        value: &Value,
        _options: &Map,
        _ctx: &FieldContext,
    ) -> Result<Option<String>, ConvertError> {
        let name = match value {
            Value::None | Value::Bool(false) => return Ok(None),
            Value::Record(record) if record.id().is_none() => return Ok(None),
            Value::Record(record) => Value::str(record.display_name()),
            Value::Map(map) => map
                .get("display_name")
                .or_else(|| map.get("name"))
                .cloned()
                .unwrap_or(Value::None),
            other => other.clone(),
        };
        if name.is_none_or_false() {
            return Ok(None);
        }
        Ok(Some(nl2br(&escape_value(&Value::str(name.to_text())))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LangFormat;
    use qweb_expr::MapRecord;

    fn render(converter: &dyn FieldConverter, value: Value, options: Map) -> Option<String> {
        let lang = LangFormat::default();
        let ctx = FieldContext {
            lang: &lang,
            inherit_branding: false,
            translatable: false,
            expression: "o.x",
            field_type: "x",
        };
        converter.value_to_html(&value, &options, &ctx).unwrap()
    }

    fn opts(key: &str, value: Value) -> Map {
        let mut map = Map::new();
        map.insert(key.into(), value);
        map
    }

    #[test]
    fn test_text_escapes_and_breaks_lines() {
        assert_eq!(
            render(&TextConverter, Value::str("a<b\nc"), Map::new()).as_deref(),
            Some("a&lt;b<br/>c")
        );
    }

    #[test]
    fn test_integer_grouping() {
        assert_eq!(
            render(&IntegerConverter, Value::Int(-1234567), Map::new()).as_deref(),
            Some("-1,234,567")
        );
        assert_eq!(render(&IntegerConverter, Value::None, Map::new()), None);
    }

    #[test]
    fn test_float_precision() {
        assert_eq!(
            render(&FloatConverter, Value::Float(1234.5), opts("precision", Value::Int(2)))
                .as_deref(),
            Some("1,234.50")
        );
        assert_eq!(
            render(&FloatConverter, Value::Float(2.5), Map::new()).as_deref(),
            Some("2.5")
        );
        assert_eq!(
            render(&FloatConverter, Value::Float(3.0), Map::new()).as_deref(),
            Some("3.0")
        );
        assert_eq!(
            render(
                &FloatConverter,
                Value::Float(0.14),
                opts("digits", Value::list(vec![Value::Int(16), Value::Int(1)]))
            )
            .as_deref(),
            Some("0.1")
        );
    }

    #[test]
    fn test_html_sanitizing() {
        let dirty = r#"<p onclick="evil()">hi<script>alert(1)</script><a href="javascript:x()">l</a></p>"#;
        assert_eq!(
            render(&HtmlConverter, Value::markup(dirty), Map::new()).as_deref(),
            Some(r#"<p>hi<a>l</a></p>"#)
        );
        assert_eq!(
            render(
                &HtmlConverter,
                Value::markup("<img/onerror=alert(1) src=x>"),
                Map::new()
            )
            .as_deref(),
            Some(r#"<img src="x"/>"#)
        );
    }

    #[test]
    fn test_boolean() {
        assert_eq!(
            render(&BooleanConverter, Value::Bool(false), Map::new()).as_deref(),
            Some("False")
        );
    }

    #[test]
    fn test_many2one_display_name() {
        let partner = MapRecord::new("res.partner", Some(3))
            .with_field("display_name", "char", "ACME\nHQ")
            .into_value();
        assert_eq!(
            render(&Many2OneConverter, partner, Map::new()).as_deref(),
            Some("ACME<br/>HQ")
        );
    }
}
