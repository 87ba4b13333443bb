use crate::error::QWebError;
use crate::executor::Executor;
use crate::ir::Statement;
use log::warn;
use qweb_expr::{Expr, Values};

pub(crate) fn handle_if(
    executor: &mut Executor,
    test: &Expr,
    then: &[Statement],
    otherwise: &[Statement],
    values: &mut Values,
    out: &mut String,
) -> Result<(), QWebError> {
    if executor.eval(test, values)?.truthy() {
        executor.run(then, values, out)
    } else {
        executor.run(otherwise, values, out)
    }
}

pub(crate) fn handle_groups(
    executor: &mut Executor,
    groups: &str,
    body: &[Statement],
    values: &mut Values,
    out: &mut String,
) -> Result<(), QWebError> {
    if executor.engine.user_has_groups(groups) {
        executor.run(body, values, out)?;
    }
    Ok(())
}

pub(crate) fn handle_debug(
    executor: &mut Executor,
    tool: &str,
    values: &Values,
) -> Result<(), QWebError> {
    if executor.options.dev_mode {
        executor.engine.run_debug_hook(tool, values);
    } else {
        warn!(
            "t-debug in template '{}' ignored: dev mode is off",
            executor.diagnostics.template()
        );
    }
    Ok(())
}
