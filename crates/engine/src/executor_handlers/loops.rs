use crate::error::QWebError;
use crate::executor::Executor;
use crate::ir::CompiledFunction;
use crate::runtime::{bind_loop_vars, copy_back, foreach_items};
use qweb_expr::{Expr, Values};

/// Runs `body` once per item in a single loop scope copied from `values`,
/// then copies rebound outer variables back.
pub(crate) fn handle_foreach(
    executor: &mut Executor,
    iterable: &Expr,
    name: Option<&str>,
    body: &CompiledFunction,
    values: &mut Values,
    out: &mut String,
) -> Result<(), QWebError> {
    let iterable = executor.eval(iterable, values)?;
    let items = foreach_items(&iterable).map_err(|err| executor.expr_error(err))?;
    let size = items.len();
    let mut scope = values.copy();
    for (index, (item, value)) in items.into_iter().enumerate() {
        bind_loop_vars(&mut scope, name, index, size, item, value);
        body.invoke(
            executor.engine,
            out,
            &mut scope,
            executor.options,
            executor.diagnostics,
        )?;
    }
    copy_back(values, &scope);
    Ok(())
}
