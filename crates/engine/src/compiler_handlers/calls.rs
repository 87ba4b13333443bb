//! Handlers for `t-call` and `t-call-assets`.

use crate::compiler::{Compiler, parse_bool};
use crate::document::Element;
use crate::error::QWebError;
use crate::ir::Statement;

impl Compiler {
    pub(crate) fn compile_call(&mut self, el: &Element) -> Result<Vec<Statement>, QWebError> {
        let template = self.compile_format(el.attr("t-call").unwrap_or_default(), el)?;
        let options = el
            .attr("t-call-options")
            .map(|expr| self.compile_expr(expr, el))
            .transpose()?;
        let content = self.compile_content(el)?;
        let body = if content.is_empty() {
            None
        } else {
            Some(self.synthesizer.wrap(content, "body_call_content").0)
        };
        Ok(vec![Statement::Call {
            template,
            body,
            options,
        }])
    }

    pub(crate) fn compile_call_assets(&mut self, el: &Element) -> Result<Vec<Statement>, QWebError> {
        Ok(vec![Statement::CallAssets {
            xmlid: self.compile_format(el.attr("t-call-assets").unwrap_or_default(), el)?,
            css: parse_bool(el.attr("t-css"), true),
            js: parse_bool(el.attr("t-js"), true),
            async_load: parse_bool(el.attr("t-async"), false),
        }])
    }
}
