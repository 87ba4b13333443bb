pub(super) mod calls;
pub(super) mod control_flow;
pub(super) mod loops;
pub(super) mod output;
pub(super) mod variables;

pub(crate) use output::check_field_element;

use crate::compiler::{Compiler, Directive, split_format};
use crate::document::Element;
use crate::error::QWebError;
use crate::ir::{AttrPart, Statement, extend_body, push_text};
use qweb_expr::Expr;

// Handlers shared by several directives: the element tag, its attributes and
// its content. They are implemented as methods on Compiler.

impl Compiler {
    pub(crate) fn compile_tag(
        &mut self,
        el: &Element,
        rest: &[Directive],
    ) -> Result<Vec<Statement>, QWebError> {
        let content = self.compile_directives(el, rest)?;
        if el.tag == "t" {
            return Ok(content);
        }
        let mut body = vec![Statement::OpenTag {
            tag: el.tag.clone(),
            attributes: self.compile_attributes(el)?,
            self_close: el.is_void(),
        }];
        extend_body(&mut body, content);
        if !el.is_void() {
            push_text(&mut body, &format!("</{}>", el.tag));
        }
        Ok(body)
    }

    /// Static, `t-att-*`, `t-attf-*` and `t-att` attributes in document order.
    pub(crate) fn compile_attributes(&self, el: &Element) -> Result<Vec<AttrPart>, QWebError> {
        attribute_parts(el, |expr| self.compile_expr(expr, el))
    }

    pub(crate) fn compile_content(&mut self, el: &Element) -> Result<Vec<Statement>, QWebError> {
        self.compile_children(el)
    }
}

/// Splits the attributes of `el` into parts, parsing expressions with `parse`.
pub(crate) fn attribute_parts<F>(el: &Element, mut parse: F) -> Result<Vec<AttrPart>, QWebError>
where
    F: FnMut(&str) -> Result<Expr, QWebError>,
{
    let mut parts = Vec::new();
    for (name, value) in &el.attributes {
        if let Some(attr) = name.strip_prefix("t-attf-") {
            parts.push(AttrPart::Format(
                attr.to_string(),
                split_format(value, &mut parse)?,
            ));
        } else if let Some(attr) = name.strip_prefix("t-att-") {
            parts.push(AttrPart::Expr(attr.to_string(), parse(value.as_str())?));
        } else if name == "t-att" {
            parts.push(AttrPart::Spread(parse(value.as_str())?));
        } else if !name.starts_with("t-") && name != "groups" {
            parts.push(AttrPart::Static(name.clone(), value.clone()));
        }
    }
    Ok(parts)
}
