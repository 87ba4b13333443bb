use super::{ConvertError, FieldContext, FieldConverter, option_str};
use chrono::{NaiveDate, NaiveDateTime};
use qweb_expr::{Map, Value};
use std::fmt::Write;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    // Fractional seconds are dropped.
    let text = text.split_once('.').map_or(text, |(head, _)| head);
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
        .ok()
        .or_else(|| parse_datetime(text).map(|dt| dt.date()))
}

fn render(
    converter: &str,
    formatted: impl std::fmt::Display,
    pattern: &str,
) -> Result<String, ConvertError> {
    let mut out = String::new();
    write!(out, "{}", formatted).map_err(|_| {
        ConvertError::invalid_option("format", format!("'{}' is not a valid {} format", pattern, converter))
    })?;
    Ok(out)
}

/// Dates stored as `YYYY-MM-DD`, shown in the language's date format or
/// the `format` option.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateConverter;

impl FieldConverter for DateConverter {
    fn value_to_html(
        &self,
        value: &Value,
        options: &Map,
        ctx: &FieldContext,
    ) -> Result<Option<String>, ConvertError> {
        let text = match value {
            Value::None | Value::Bool(false) => return Ok(None),
            Value::Str(text) if text.is_empty() => return Ok(None),
            Value::Str(text) => text,
            other => return Err(ConvertError::invalid_value("date", other, "not a date string")),
        };
        let date = parse_date(text)
            .ok_or_else(|| ConvertError::invalid_value("date", value, "expected YYYY-MM-DD"))?;
        let pattern = option_str(options, "format").unwrap_or(&ctx.lang.date_format);
        render("date", date.format(pattern), pattern).map(Some)
    }
}

/// Datetimes stored as `YYYY-MM-DD HH:MM:SS`, shown in the language's date and
/// time formats or the `format` option. `time_only` and `hide_seconds` trim
/// the default pattern.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeConverter;

impl DateTimeConverter {
    fn pattern(options: &Map, ctx: &FieldContext) -> String {
        if let Some(pattern) = option_str(options, "format") {
            return pattern.to_string();
        }
        let flag = |key: &str| options.get(key).is_some_and(Value::truthy);
        let time = if flag("hide_seconds") {
            ctx.lang
                .time_format
                .replace(":%S", "")
                .replace("%S", "")
        } else {
            ctx.lang.time_format.clone()
        };
        if flag("time_only") {
            time
        } else if flag("date_only") {
            ctx.lang.date_format.clone()
        } else {
            format!("{} {}", ctx.lang.date_format, time)
        }
    }
}

impl FieldConverter for DateTimeConverter {
    fn value_to_html(
        &self,
        value: &Value,
        options: &Map,
        ctx: &FieldContext,
    ) -> Result<Option<String>, ConvertError> {
        let text = match value {
            Value::None | Value::Bool(false) => return Ok(None),
            Value::Str(text) if text.is_empty() => return Ok(None),
            Value::Str(text) => text,
            other => {
                return Err(ConvertError::invalid_value(
                    "datetime",
                    other,
                    "not a datetime string",
                ));
            }
        };
        let datetime = parse_datetime(text).ok_or_else(|| {
            ConvertError::invalid_value("datetime", value, "expected YYYY-MM-DD HH:MM:SS")
        })?;
        let pattern = Self::pattern(options, ctx);
        render("datetime", datetime.format(&pattern), &pattern).map(Some)
    }
}
