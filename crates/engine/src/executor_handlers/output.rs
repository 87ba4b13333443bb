use crate::error::QWebError;
use crate::executor::Executor;
use crate::fields::escape_value;
use crate::ir::{CompiledFunction, FieldStatement, OutputSource, WidgetOptions};
use crate::runtime::{self, emit_attributes, render_field, render_widget};
use qweb_expr::{Value, Values, evaluate};

pub(crate) fn handle_output(
    executor: &mut Executor,
    source: &OutputSource,
    escape: bool,
    widget: Option<&WidgetOptions>,
    default: Option<&CompiledFunction>,
    values: &mut Values,
    out: &mut String,
) -> Result<(), QWebError> {
    let value = match source {
        OutputSource::Body => match values.body() {
            Some(Value::Markup(html)) => Value::markup(html.clone()),
            Some(other) => Value::markup(other.to_text()),
            None => Value::None,
        },
        OutputSource::Expr(expr) => executor.eval(expr, values)?,
    };

    if let Some(widget) = widget {
        let widget_options = executor.widget_options(widget, values)?;
        let html = render_widget(executor.engine, executor.options, &value, &widget_options)
            .map_err(|err| executor.diagnostics.render_error(err.to_string()))?;
        return match html {
            Some(html) => {
                out.push_str(&html);
                Ok(())
            }
            None => render_default(executor, default, values, out),
        };
    }

    if value.is_none_or_false() {
        return render_default(executor, default, values, out);
    }
    if escape {
        out.push_str(&escape_value(&value));
    } else {
        out.push_str(&value.to_text());
    }
    Ok(())
}

fn render_default(
    executor: &mut Executor,
    default: Option<&CompiledFunction>,
    values: &mut Values,
    out: &mut String,
) -> Result<(), QWebError> {
    match default {
        Some(default) => default.invoke(
            executor.engine,
            out,
            values,
            executor.options,
            executor.diagnostics,
        ),
        None => Ok(()),
    }
}

/// Renders a `t-field` element: converter attributes first, then the
/// element's own attributes, around the converted value or the element body.
pub(crate) fn handle_field(
    executor: &mut Executor,
    field: &FieldStatement,
    values: &mut Values,
    out: &mut String,
) -> Result<(), QWebError> {
    let record = executor.eval(&field.record, values)?;
    let field_options = executor.widget_options(&field.options, values)?;
    let rendered = render_field(
        executor.engine,
        executor.options,
        &record,
        &field.field,
        &field.expression,
        &field_options,
    )
    .map_err(|err| executor.diagnostics.render_error(err.to_string()))?;

    let mut attributes = rendered.attributes;
    runtime::collect_attributes(
        &field.attributes,
        |expr| evaluate(expr, &*values),
        &mut attributes,
    )
    .map_err(|err| executor.expr_error(err))?;

    let content = match rendered.content {
        Some(content) => Some(content),
        None => {
            let mut buffer = String::new();
            render_default(executor, field.default.as_deref(), values, &mut buffer)?;
            if !buffer.is_empty() {
                Some(buffer)
            } else if rendered.force_display {
                Some(String::new())
            } else {
                None
            }
        }
    };
    let Some(content) = content else {
        return Ok(());
    };
    write_element(&field.tag, &attributes, &content, field.void, out);
    Ok(())
}

pub(crate) fn write_element(
    tag: &str,
    attributes: &qweb_expr::Map,
    content: &str,
    void: bool,
    out: &mut String,
) {
    out.push('<');
    out.push_str(tag);
    emit_attributes(attributes, out);
    if void {
        out.push_str("/>");
        return;
    }
    out.push('>');
    out.push_str(content);
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}
