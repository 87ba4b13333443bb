//! Runs compiled template bodies.
//!
//! The executor walks a function's statements in order, appending output to a
//! caller-supplied buffer. Directive-specific work lives in
//! `executor_handlers`; this module owns the dispatch loop and expression
//! evaluation with error attribution.

use crate::diagnostics::Diagnostics;
use crate::engine::QWeb;
use crate::error::QWebError;
use crate::executor_handlers::{calls, control_flow, loops, output, variables};
use crate::ir::{Format, Statement, WidgetOptions};
use crate::options::RenderOptions;
use crate::runtime::{self, emit_attributes};
use qweb_expr::{Expr, ExprError, Map, Value, Values, evaluate};

pub struct Executor<'a> {
    pub(crate) engine: &'a QWeb,
    pub(crate) options: &'a RenderOptions,
    pub(crate) diagnostics: &'a mut Diagnostics,
}

impl<'a> Executor<'a> {
    pub fn new(
        engine: &'a QWeb,
        options: &'a RenderOptions,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        Self {
            engine,
            options,
            diagnostics,
        }
    }

    pub fn run(
        &mut self,
        body: &[Statement],
        values: &mut Values,
        out: &mut String,
    ) -> Result<(), QWebError> {
        for statement in body {
            self.execute(statement, values, out)?;
        }
        Ok(())
    }

    fn execute(
        &mut self,
        statement: &Statement,
        values: &mut Values,
        out: &mut String,
    ) -> Result<(), QWebError> {
        match statement {
            Statement::SetPath(path) => {
                self.diagnostics.set_path(path);
                Ok(())
            }
            Statement::Text(text) => {
                out.push_str(text);
                Ok(())
            }
            Statement::OpenTag {
                tag,
                attributes,
                self_close,
            } => {
                let mut collected = Map::new();
                runtime::collect_attributes(
                    attributes,
                    |expr| evaluate(expr, &*values),
                    &mut collected,
                )
                .map_err(|err| self.expr_error(err))?;
                out.push('<');
                out.push_str(tag);
                emit_attributes(&collected, out);
                out.push_str(if *self_close { "/>" } else { ">" });
                Ok(())
            }
            Statement::If {
                test,
                then,
                otherwise,
            } => control_flow::handle_if(self, test, then, otherwise, values, out),
            Statement::Groups { groups, body } => {
                control_flow::handle_groups(self, groups, body, values, out)
            }
            Statement::Debug { tool } => control_flow::handle_debug(self, tool, values),
            Statement::ForEach {
                iterable,
                name,
                body,
            } => loops::handle_foreach(self, iterable, name.as_deref(), body, values, out),
            Statement::Set { name, value } => variables::handle_set(self, name, value, values),
            Statement::Output {
                source,
                escape,
                widget,
                default,
            } => output::handle_output(
                self,
                source,
                *escape,
                widget.as_ref(),
                default.as_deref(),
                values,
                out,
            ),
            Statement::Field(field) => output::handle_field(self, field, values, out),
            Statement::Call {
                template,
                body,
                options,
            } => calls::handle_call(
                self,
                template,
                body.as_deref(),
                options.as_ref(),
                values,
                out,
            ),
            Statement::CallAssets {
                xmlid,
                css,
                js,
                async_load,
            } => calls::handle_call_assets(self, xmlid, *css, *js, *async_load, values, out),
            Statement::CallFunction(function) => function.invoke(
                self.engine,
                out,
                values,
                self.options,
                self.diagnostics,
            ),
        }
    }

    /// Evaluates `expr`, attributing failures to the current node.
    pub(crate) fn eval(&self, expr: &Expr, values: &Values) -> Result<Value, QWebError> {
        evaluate(expr, values).map_err(|err| self.expr_error(err))
    }

    pub(crate) fn render_format(
        &self,
        format: &Format,
        values: &Values,
    ) -> Result<String, QWebError> {
        runtime::render_format(format, |expr| self.eval(expr, values))
    }

    pub(crate) fn widget_options(
        &self,
        widget: &WidgetOptions,
        values: &Values,
    ) -> Result<Map, QWebError> {
        let base = widget
            .base
            .as_ref()
            .map(|expr| self.eval(expr, values))
            .transpose()?;
        let items = widget
            .items
            .iter()
            .map(|(key, expr)| Ok((key.clone(), self.eval(expr, values)?)))
            .collect::<Result<Vec<_>, QWebError>>()?;
        runtime::widget_options(base, items).map_err(|err| self.expr_error(err))
    }

    pub(crate) fn expr_error(&self, err: ExprError) -> QWebError {
        self.diagnostics.render_error(err.to_string())
    }
}
