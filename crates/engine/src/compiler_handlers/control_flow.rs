//! Handlers for `t-debug`, `t-groups`, `t-if`, `t-elif` and `t-else`.

use crate::compiler::{Compiler, Directive};
use crate::document::Element;
use crate::error::QWebError;
use crate::ir::Statement;

impl Compiler {
    pub(crate) fn compile_debug(
        &mut self,
        el: &Element,
        rest: &[Directive],
    ) -> Result<Vec<Statement>, QWebError> {
        let tool = el.attr("t-debug").unwrap_or_default();
        let mut body = vec![Statement::Debug {
            tool: tool.chars().filter(char::is_ascii_alphabetic).collect(),
        }];
        body.extend(self.compile_directives(el, rest)?);
        Ok(body)
    }

    pub(crate) fn compile_groups(
        &mut self,
        el: &Element,
        rest: &[Directive],
    ) -> Result<Vec<Statement>, QWebError> {
        let groups = el
            .attr("t-groups")
            .or_else(|| el.attr("groups"))
            .unwrap_or_default()
            .to_string();
        Ok(vec![Statement::Groups {
            groups,
            body: self.compile_directives(el, rest)?,
        }])
    }

    pub(crate) fn compile_if(
        &mut self,
        el: &Element,
        rest: &[Directive],
    ) -> Result<Vec<Statement>, QWebError> {
        let otherwise = self.pending_otherwise.take().unwrap_or_default();
        let test = self.compile_expr(el.attr("t-if").unwrap_or_default(), el)?;
        let then = self.compile_directives(el, rest)?;
        Ok(vec![Statement::If {
            test,
            then,
            otherwise,
        }])
    }

    pub(crate) fn compile_elif(
        &mut self,
        el: &Element,
        rest: &[Directive],
    ) -> Result<Vec<Statement>, QWebError> {
        if !std::mem::take(&mut self.chained) {
            return Err(self.error(el, "t-elif without matching t-if"));
        }
        let otherwise = self.pending_otherwise.take().unwrap_or_default();
        let test = self.compile_expr(el.attr("t-elif").unwrap_or_default(), el)?;
        let then = self.compile_directives(el, rest)?;
        Ok(vec![Statement::If {
            test,
            then,
            otherwise,
        }])
    }

    pub(crate) fn compile_else(
        &mut self,
        el: &Element,
        rest: &[Directive],
    ) -> Result<Vec<Statement>, QWebError> {
        if !std::mem::take(&mut self.chained) {
            return Err(self.error(el, "t-else without matching t-if"));
        }
        self.compile_directives(el, rest)
    }
}

#[cfg(test)]
mod tests {
    use crate::compiler::Compiler;
    use crate::document::parse_template;
    use crate::error::QWebError;
    use qweb_traits::TemplateRef;

    fn compile_err(xml: &str) -> QWebError {
        let root = parse_template(xml, &TemplateRef::Id(1)).unwrap();
        Compiler::new("test", false).compile(&root).unwrap_err()
    }

    #[test]
    fn test_text_between_if_and_else_breaks_pairing() {
        let err = compile_err(r#"<t><a t-if="False">A</a>x<b t-else="1">B</b></t>"#);
        assert!(err.to_string().contains("t-else without matching t-if"));
    }

    #[test]
    fn test_lone_elif() {
        let err = compile_err(r#"<t><b t-elif="1">B</b></t>"#);
        assert!(err.to_string().contains("t-elif without matching t-if"));
    }
}
