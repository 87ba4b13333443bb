//! Handler for `t-foreach` / `t-as`.

use crate::compiler::{Compiler, Directive};
use crate::document::Element;
use crate::error::QWebError;
use crate::ir::Statement;

impl Compiler {
    pub(crate) fn compile_foreach(
        &mut self,
        el: &Element,
        rest: &[Directive],
    ) -> Result<Vec<Statement>, QWebError> {
        let iterable = self.compile_expr(el.attr("t-foreach").unwrap_or_default(), el)?;
        let name = el
            .attr("t-as")
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| name.replace('.', "_"));
        let body = self.compile_directives(el, rest)?;
        let (function, _) = self.synthesizer.wrap(body, "foreach");
        Ok(vec![Statement::ForEach {
            iterable,
            name,
            body: function,
        }])
    }
}
