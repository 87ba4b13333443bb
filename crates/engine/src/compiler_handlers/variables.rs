//! Handler for `t-set` with `t-value`, `t-valuef` or a captured body.

use crate::compiler::Compiler;
use crate::document::Element;
use crate::error::QWebError;
use crate::ir::{SetValue, Statement};

impl Compiler {
    pub(crate) fn compile_set(&mut self, el: &Element) -> Result<Vec<Statement>, QWebError> {
        let name = el.attr("t-set").unwrap_or_default().trim().to_string();
        if name.is_empty() {
            return Err(self.error(el, "t-set requires a variable name"));
        }
        let value = if let Some(expr) = el.attr("t-value") {
            let source = if expr.trim().is_empty() { "None" } else { expr };
            SetValue::Expr(self.compile_expr(source, el)?)
        } else if let Some(format) = el.attr("t-valuef") {
            SetValue::Format(self.compile_format(format, el)?)
        } else {
            let body = self.compile_content(el)?;
            if body.is_empty() {
                SetValue::Empty
            } else {
                let (function, _) = self.synthesizer.wrap(body, "set");
                SetValue::Body(function)
            }
        };
        Ok(vec![Statement::Set { name, value }])
    }
}
