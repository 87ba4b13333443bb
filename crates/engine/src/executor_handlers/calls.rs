use crate::assets::AssetFlags;
use crate::error::QWebError;
use crate::executor::Executor;
use crate::ir::{CompiledFunction, Format};
use log::debug;
use qweb_expr::{Expr, Value, Values};
use qweb_traits::TemplateRef;

/// Renders another template with a copy of `values`. The call body renders
/// first, with that copy, into slot `0`.
pub(crate) fn handle_call(
    executor: &mut Executor,
    template: &Format,
    body: Option<&CompiledFunction>,
    call_options: Option<&Expr>,
    values: &mut Values,
    out: &mut String,
) -> Result<(), QWebError> {
    let name = executor.render_format(template, values)?;
    let mut callee_values = values.copy();
    let mut slot = String::new();
    if let Some(body) = body {
        body.invoke(
            executor.engine,
            &mut slot,
            &mut callee_values,
            executor.options,
            executor.diagnostics,
        )?;
    }
    callee_values.set_body(Value::markup(slot));

    let mut options = executor.options.clone();
    if let Some(expr) = call_options {
        match executor.eval(expr, values)? {
            Value::Map(entries) => options.merge(&entries),
            Value::None | Value::Bool(false) => {}
            other => {
                return Err(executor.diagnostics.render_error(format!(
                    "t-call-options must be a mapping, got '{}'",
                    other.type_name()
                )));
            }
        }
    }

    let depth = executor.diagnostics.depth();
    let max_depth = executor.engine.config().max_call_depth;
    if depth >= max_depth {
        return Err(QWebError::RecursionLimit {
            template: name,
            depth: max_depth,
        });
    }

    let callee = executor.engine.compile(&TemplateRef::parse(&name), &options)?;
    debug!("t-call '{}' at depth {}", name, depth + 1);
    let frame = executor.diagnostics.enter(&callee);
    let result = callee.entry.invoke(
        executor.engine,
        out,
        &mut callee_values,
        &options,
        executor.diagnostics,
    );
    executor.diagnostics.leave(frame);
    result
}

pub(crate) fn handle_call_assets(
    executor: &mut Executor,
    xmlid: &Format,
    css: bool,
    js: bool,
    async_load: bool,
    values: &mut Values,
    out: &mut String,
) -> Result<(), QWebError> {
    let xmlid = executor.render_format(xmlid, values)?;
    let flags = AssetFlags {
        css,
        js,
        debug: values.get("debug").is_some_and(Value::truthy),
        async_load,
    };
    let html = executor
        .engine
        .bundler()
        .to_html(executor.engine, &xmlid, flags, values)?;
    out.push_str(&html);
    Ok(())
}
