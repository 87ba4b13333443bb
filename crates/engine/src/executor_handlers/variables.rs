use crate::error::QWebError;
use crate::executor::Executor;
use crate::ir::SetValue;
use qweb_expr::{Value, Values};

pub(crate) fn handle_set(
    executor: &mut Executor,
    name: &str,
    value: &SetValue,
    values: &mut Values,
) -> Result<(), QWebError> {
    let value = match value {
        SetValue::Expr(expr) => executor.eval(expr, values)?,
        SetValue::Format(format) => Value::str(executor.render_format(format, values)?),
        SetValue::Body(body) => {
            let mut buffer = String::new();
            body.invoke(
                executor.engine,
                &mut buffer,
                values,
                executor.options,
                executor.diagnostics,
            )?;
            Value::markup(buffer)
        }
        SetValue::Empty => Value::str(""),
    };
    values.set(name, value);
    Ok(())
}
