//! Handlers for `t-esc`, `t-raw` and `t-field`.

use crate::compiler::Compiler;
use crate::document::Element;
use crate::error::QWebError;
use crate::ir::{CompiledFunction, FieldStatement, OutputSource, Statement, WidgetOptions};
use std::sync::Arc;

/// Tags a field widget cannot decorate.
const FIELD_FORBIDDEN_TAGS: &[&str] = &[
    "table", "thead", "tbody", "tfoot", "tr", "td", "li", "ul", "ol", "dl", "dt", "dd",
];

/// Directives that would also produce the content of a `t-field` element.
const FIELD_EXCLUSIVE: &[&str] = &["t-call", "t-call-assets", "t-set"];

/// Validates a `t-field` element and splits its expression into the record
/// expression and the field name.
pub(crate) fn check_field_element(el: &Element) -> Result<(&str, &str), String> {
    if FIELD_FORBIDDEN_TAGS.contains(&el.tag.as_str()) {
        return Err(format!("t-field cannot be used on <{}> elements", el.tag));
    }
    if el.tag == "t" {
        return Err("t-field cannot be used on a t element, provide an actual HTML node".into());
    }
    if let Some(other) = FIELD_EXCLUSIVE.iter().find(|attr| el.has(attr)) {
        return Err(format!("t-field cannot be combined with {}", other));
    }
    el.attr("t-field")
        .unwrap_or_default()
        .trim()
        .rsplit_once('.')
        .ok_or_else(|| "t-field must have at least a dot like 'record.field_name'".to_string())
}

impl Compiler {
    pub(crate) fn compile_output(
        &mut self,
        el: &Element,
        attr: &str,
        escape: bool,
    ) -> Result<Vec<Statement>, QWebError> {
        let expr = el.attr(attr).unwrap_or_default();
        let source = if expr.trim() == "0" {
            OutputSource::Body
        } else {
            OutputSource::Expr(self.compile_expr(expr, el)?)
        };
        let widget = self.compile_widget_options(el, "t-options")?;
        let default = self.compile_default_body(el)?;
        Ok(vec![Statement::Output {
            source,
            escape,
            widget,
            default,
        }])
    }

    /// Compiles something like `<span t-field="record.phone">+1 555 555 8069</span>`.
    pub(crate) fn compile_field(&mut self, el: &Element) -> Result<Vec<Statement>, QWebError> {
        let (record, field) = check_field_element(el).map_err(|msg| self.error(el, msg))?;
        let expression = el.attr("t-field").unwrap_or_default().trim().to_string();
        let record = self.compile_expr(record, el)?;
        let options = match self.compile_widget_options(el, "t-options")? {
            Some(options) => options,
            None => self
                .compile_widget_options(el, "t-field-options")?
                .unwrap_or_default(),
        };
        let field = FieldStatement {
            tag: el.tag.clone(),
            attributes: self.compile_attributes(el)?,
            record,
            field: field.to_string(),
            expression: expression.clone(),
            options,
            default: self.compile_default_body(el)?,
            void: el.is_void(),
        };
        Ok(vec![Statement::Field(Box::new(field))])
    }

    /// `base` (`t-options` or `t-field-options`) plus every `t-options-<key>`.
    fn compile_widget_options(
        &self,
        el: &Element,
        base: &str,
    ) -> Result<Option<WidgetOptions>, QWebError> {
        let base = el
            .attr(base)
            .filter(|expr| !expr.trim().is_empty())
            .map(|expr| self.compile_expr(expr, el))
            .transpose()?;
        let mut items = Vec::new();
        for (name, value) in &el.attributes {
            if let Some(key) = name.strip_prefix("t-options-") {
                items.push((key.to_string(), self.compile_expr(value, el)?));
            }
        }
        if base.is_none() && items.is_empty() {
            return Ok(None);
        }
        Ok(Some(WidgetOptions { base, items }))
    }

    /// The element's own body, used when the value is missing.
    fn compile_default_body(
        &mut self,
        el: &Element,
    ) -> Result<Option<Arc<CompiledFunction>>, QWebError> {
        let body = self.compile_content(el)?;
        if body.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.synthesizer.wrap(body, "default_content").0))
    }
}
