//! Interpretive renderer.
//!
//! Walks the element tree directly instead of compiling it, evaluating
//! expressions as written. Names resolve strictly: a name missing from the
//! render values is an [`QWebError::UndefinedVariable`] unless an undefined
//! handler supplies a value. Output matches the compiled renderer for
//! well-defined inputs, which makes it useful as a reference in tests and
//! for permissive previews.

use crate::assets::AssetFlags;
use crate::compiler::{
    DIRECTIVE_ORDER, Directive, check_directives, else_chain, parse_bool, split_format,
};
use crate::compiler_handlers::{attribute_parts, check_field_element};
use crate::document::{Element, Node};
use crate::engine::QWeb;
use crate::error::QWebError;
use crate::executor_handlers::output::write_element;
use crate::ir::Format;
use crate::options::RenderOptions;
use crate::runtime::{
    self, bind_loop_vars, copy_back, emit_attributes, foreach_items, render_field, render_widget,
};
use log::warn;
use qweb_expr::{
    Expr, ExprError, Map, Scope, Value, Values, evaluate, parse_expression,
};
use qweb_traits::TemplateRef;
use std::sync::Arc;

/// Supplies a value for a name missing from the render values.
pub type UndefinedHandler = Arc<dyn Fn(&str, &Values) -> Value + Send + Sync>;

/// Strict view of the render values.
struct StrictScope<'v> {
    values: &'v Values,
    undefined: Option<&'v UndefinedHandler>,
}

impl Scope for StrictScope<'_> {
    fn lookup(&self, name: &str) -> Result<Value, ExprError> {
        if let Some(value) = self.values.get(name) {
            return Ok(value.clone());
        }
        match self.undefined {
            Some(handler) => Ok(handler(name, self.values)),
            None => Err(ExprError::Name(name.to_string())),
        }
    }

    fn defined(&self, name: &str) -> bool {
        self.values.contains(name)
    }
}

/// The `t-elif`/`t-else` siblings still available to a conditional.
#[derive(Clone, Copy, Default)]
struct Branch<'e> {
    chained: bool,
    otherwise: &'e [&'e Element],
}

pub struct Interpreter<'a> {
    engine: &'a QWeb,
    options: RenderOptions,
    template: String,
    undefined: Option<UndefinedHandler>,
    depth: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        engine: &'a QWeb,
        template: impl Into<String>,
        options: RenderOptions,
        undefined: Option<UndefinedHandler>,
    ) -> Self {
        Self {
            engine,
            options,
            template: template.into(),
            undefined,
            depth: 0,
        }
    }

    /// Renders `root` with `values`.
    pub fn render(&self, root: &Element, values: &mut Values) -> Result<String, QWebError> {
        let mut out = String::new();
        self.render_node(root, values, &mut out, Branch::default())?;
        Ok(out)
    }

    fn render_node(
        &self,
        el: &Element,
        values: &mut Values,
        out: &mut String,
        branch: Branch<'_>,
    ) -> Result<(), QWebError> {
        if el.is_static() {
            return self.render_static(el, values, out);
        }
        check_directives(el).map_err(|message| QWebError::Compile {
            message,
            template: self.template.clone(),
            path: Some(el.path.clone()),
            node: Some(el.to_xml()),
        })?;
        self.render_directives(el, DIRECTIVE_ORDER, values, out, branch)
    }

    fn render_directives(
        &self,
        el: &Element,
        remaining: &[Directive],
        values: &mut Values,
        out: &mut String,
        branch: Branch<'_>,
    ) -> Result<(), QWebError> {
        let Some(index) = remaining.iter().position(|d| d.present_on(el)) else {
            return Ok(());
        };
        let rest = &remaining[index + 1..];
        match remaining[index] {
            Directive::Debug => {
                let tool: String = el
                    .attr("t-debug")
                    .unwrap_or_default()
                    .chars()
                    .filter(char::is_ascii_alphabetic)
                    .collect();
                if self.options.dev_mode {
                    self.engine.run_debug_hook(&tool, values);
                } else {
                    warn!("t-debug in template '{}' ignored: dev mode is off", self.template);
                }
                self.render_directives(el, rest, values, out, branch)
            }
            Directive::Groups => {
                let groups = el
                    .attr("t-groups")
                    .or_else(|| el.attr("groups"))
                    .unwrap_or_default();
                if self.engine.user_has_groups(groups) {
                    self.render_directives(el, rest, values, out, branch)?;
                }
                Ok(())
            }
            Directive::Foreach => self.render_foreach(el, rest, values, out, branch),
            Directive::If => self.render_conditional(el, "t-if", rest, values, out, branch),
            Directive::Elif => {
                if !branch.chained {
                    return Err(self.error(el, "t-elif without matching t-if"));
                }
                self.render_conditional(el, "t-elif", rest, values, out, branch)
            }
            Directive::Else => {
                if !branch.chained {
                    return Err(self.error(el, "t-else without matching t-if"));
                }
                self.render_directives(el, rest, values, out, Branch::default())
            }
            Directive::Field => self.render_field(el, values, out),
            Directive::Tag => {
                if el.tag == "t" {
                    return self.render_directives(el, rest, values, out, Branch::default());
                }
                let parts = attribute_parts(el, |expr| self.parse(expr, el))?;
                let mut attributes = Map::new();
                runtime::collect_attributes(&parts, |expr| self.eval(expr, &*values), &mut attributes)
                    .map_err(|err| self.expr_error(err, el))?;
                out.push('<');
                out.push_str(&el.tag);
                emit_attributes(&attributes, out);
                out.push_str(if el.is_void() { "/>" } else { ">" });
                self.render_directives(el, rest, values, out, Branch::default())?;
                if !el.is_void() {
                    out.push_str("</");
                    out.push_str(&el.tag);
                    out.push('>');
                }
                Ok(())
            }
            Directive::CallAssets => {
                let xmlid = self.render_format_attr(el, "t-call-assets", values)?;
                let flags = AssetFlags {
                    css: parse_bool(el.attr("t-css"), true),
                    js: parse_bool(el.attr("t-js"), true),
                    debug: values.get("debug").is_some_and(Value::truthy),
                    async_load: parse_bool(el.attr("t-async"), false),
                };
                let html = self.engine.bundler().to_html(self.engine, &xmlid, flags, values)?;
                out.push_str(&html);
                Ok(())
            }
            Directive::Call => self.render_call(el, values, out),
            Directive::Set => self.render_set(el, values),
            Directive::Esc => self.render_output(el, "t-esc", true, values, out),
            Directive::Raw => self.render_output(el, "t-raw", false, values, out),
            Directive::Content => self.render_children(el, values, out),
        }
    }

    fn render_conditional(
        &self,
        el: &Element,
        attr: &str,
        rest: &[Directive],
        values: &mut Values,
        out: &mut String,
        branch: Branch<'_>,
    ) -> Result<(), QWebError> {
        let test = self.parse(el.attr(attr).unwrap_or_default(), el)?;
        if self.eval(&test, values).map_err(|e| self.expr_error(e, el))?.truthy() {
            return self.render_directives(el, rest, values, out, Branch::default());
        }
        match branch.otherwise.split_first() {
            Some((next, tail)) => self.render_node(
                next,
                values,
                out,
                Branch {
                    chained: true,
                    otherwise: tail,
                },
            ),
            None => Ok(()),
        }
    }

    fn render_foreach(
        &self,
        el: &Element,
        rest: &[Directive],
        values: &mut Values,
        out: &mut String,
        branch: Branch<'_>,
    ) -> Result<(), QWebError> {
        let iterable = self.parse(el.attr("t-foreach").unwrap_or_default(), el)?;
        let iterable = self
            .eval(&iterable, values)
            .map_err(|e| self.expr_error(e, el))?;
        let items = foreach_items(&iterable).map_err(|e| self.expr_error(e, el))?;
        let name = el
            .attr("t-as")
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| name.replace('.', "_"));
        let size = items.len();
        let mut scope = values.copy();
        for (index, (item, value)) in items.into_iter().enumerate() {
            bind_loop_vars(&mut scope, name.as_deref(), index, size, item, value);
            self.render_directives(el, rest, &mut scope, out, branch)?;
        }
        copy_back(values, &scope);
        Ok(())
    }

    fn render_set(&self, el: &Element, values: &mut Values) -> Result<(), QWebError> {
        let name = el.attr("t-set").unwrap_or_default().trim();
        if name.is_empty() {
            return Err(self.error(el, "t-set requires a variable name"));
        }
        let value = if let Some(expr) = el.attr("t-value") {
            let source = if expr.trim().is_empty() { "None" } else { expr };
            let expr = self.parse(source, el)?;
            self.eval(&expr, values).map_err(|e| self.expr_error(e, el))?
        } else if el.has("t-valuef") {
            Value::str(self.render_format_attr(el, "t-valuef", values)?)
        } else if el.children.is_empty() {
            Value::str("")
        } else {
            let mut buffer = String::new();
            self.render_children(el, values, &mut buffer)?;
            Value::markup(buffer)
        };
        values.set(name, value);
        Ok(())
    }

    fn render_output(
        &self,
        el: &Element,
        attr: &str,
        escape: bool,
        values: &mut Values,
        out: &mut String,
    ) -> Result<(), QWebError> {
        let source = el.attr(attr).unwrap_or_default();
        let value = if source.trim() == "0" {
            let scope = StrictScope {
                values,
                undefined: self.undefined.as_ref(),
            };
            scope.lookup("0").map_err(|e| self.expr_error(e, el))?
        } else {
            let expr = self.parse(source, el)?;
            self.eval(&expr, values).map_err(|e| self.expr_error(e, el))?
        };

        if let Some(widget_options) = self.widget_options(el, "t-options", values)? {
            let html = render_widget(self.engine, &self.options, &value, &widget_options)
                .map_err(|err| self.error(el, err.to_string()))?;
            return match html {
                Some(html) => {
                    out.push_str(&html);
                    Ok(())
                }
                None => self.render_children(el, values, out),
            };
        }

        if value.is_none_or_false() {
            return self.render_children(el, values, out);
        }
        if escape {
            out.push_str(&crate::fields::escape_value(&value));
        } else {
            out.push_str(&value.to_text());
        }
        Ok(())
    }

    fn render_field(
        &self,
        el: &Element,
        values: &mut Values,
        out: &mut String,
    ) -> Result<(), QWebError> {
        let (record, field) = check_field_element(el).map_err(|msg| self.error(el, msg))?;
        let expression = el.attr("t-field").unwrap_or_default().trim();
        let record = self.parse(record, el)?;
        let record = self
            .eval(&record, values)
            .map_err(|e| self.expr_error(e, el))?;
        let field_options = match self.widget_options(el, "t-options", values)? {
            Some(options) => options,
            None => self
                .widget_options(el, "t-field-options", values)?
                .unwrap_or_default(),
        };
        let rendered = render_field(
            self.engine,
            &self.options,
            &record,
            field,
            expression,
            &field_options,
        )
        .map_err(|err| self.error(el, err.to_string()))?;

        let mut attributes = rendered.attributes;
        let parts = attribute_parts(el, |expr| self.parse(expr, el))?;
        runtime::collect_attributes(&parts, |expr| self.eval(expr, &*values), &mut attributes)
            .map_err(|err| self.expr_error(err, el))?;

        let content = match rendered.content {
            Some(content) => content,
            None => {
                let mut buffer = String::new();
                self.render_children(el, values, &mut buffer)?;
                if buffer.is_empty() && !rendered.force_display {
                    return Ok(());
                }
                buffer
            }
        };
        write_element(&el.tag, &attributes, &content, el.is_void(), out);
        Ok(())
    }

    fn render_call(
        &self,
        el: &Element,
        values: &mut Values,
        out: &mut String,
    ) -> Result<(), QWebError> {
        let name = self.render_format_attr(el, "t-call", values)?;
        let mut callee_values = values.copy();
        let mut slot = String::new();
        self.render_children(el, &mut callee_values, &mut slot)?;
        callee_values.set_body(Value::markup(slot));

        let mut options = self.options.clone();
        if let Some(source) = el.attr("t-call-options") {
            let expr = self.parse(source, el)?;
            match self.eval(&expr, values).map_err(|e| self.expr_error(e, el))? {
                Value::Map(entries) => options.merge(&entries),
                Value::None | Value::Bool(false) => {}
                other => {
                    return Err(self.error(
                        el,
                        format!("t-call-options must be a mapping, got '{}'", other.type_name()),
                    ));
                }
            }
        }

        let max_depth = self.engine.config().max_call_depth;
        if self.depth >= max_depth {
            return Err(QWebError::RecursionLimit {
                template: name,
                depth: max_depth,
            });
        }
        let reference = TemplateRef::parse(&name);
        let root = self.engine.get_template(&reference)?;
        let callee = Interpreter {
            engine: self.engine,
            options,
            template: reference.to_string(),
            undefined: self.undefined.clone(),
            depth: self.depth + 1,
        };
        callee.render_node(&root, &mut callee_values, out, Branch::default())
    }

    /// Renders children, pairing each `t-if` with its `t-elif`/`t-else` siblings.
    fn render_children(
        &self,
        el: &Element,
        values: &mut Values,
        out: &mut String,
    ) -> Result<(), QWebError> {
        let children = &el.children;
        let mut i = 0;
        while i < children.len() {
            match &children[i] {
                Node::Text(text) => {
                    out.push_str(&quick_xml::escape::partial_escape(text.as_str()));
                    i += 1;
                }
                Node::Element(child) if child.has("t-if") => {
                    let chain = else_chain(children, i);
                    let branches: Vec<&Element> = chain.iter().map(|(_, el)| *el).collect();
                    self.render_node(
                        child,
                        values,
                        out,
                        Branch {
                            chained: false,
                            otherwise: &branches,
                        },
                    )?;
                    i = chain.last().map_or(i + 1, |(index, _)| index + 1);
                }
                Node::Element(child) => {
                    self.render_node(child, values, out, Branch::default())?;
                    i += 1;
                }
            }
        }
        Ok(())
    }

    fn render_static(
        &self,
        el: &Element,
        values: &mut Values,
        out: &mut String,
    ) -> Result<(), QWebError> {
        if el.tag == "t" {
            return self.render_children(el, values, out);
        }
        out.push('<');
        out.push_str(&el.tag);
        for (name, value) in &el.attributes {
            out.push_str(&format!(
                " {}=\"{}\"",
                name,
                quick_xml::escape::escape(value.as_str())
            ));
        }
        if el.is_void() {
            out.push_str("/>");
            return self.render_children(el, values, out);
        }
        out.push('>');
        self.render_children(el, values, out)?;
        out.push_str("</");
        out.push_str(&el.tag);
        out.push('>');
        Ok(())
    }

    fn widget_options(
        &self,
        el: &Element,
        base: &str,
        values: &Values,
    ) -> Result<Option<Map>, QWebError> {
        let base = match el.attr(base).filter(|expr| !expr.trim().is_empty()) {
            Some(source) => {
                let expr = self.parse(source, el)?;
                Some(self.eval(&expr, values).map_err(|e| self.expr_error(e, el))?)
            }
            None => None,
        };
        let mut items = Vec::new();
        for (name, source) in &el.attributes {
            if let Some(key) = name.strip_prefix("t-options-") {
                let expr = self.parse(source, el)?;
                let value = self.eval(&expr, values).map_err(|e| self.expr_error(e, el))?;
                items.push((key.to_string(), value));
            }
        }
        if base.is_none() && items.is_empty() {
            return Ok(None);
        }
        runtime::widget_options(base, items)
            .map(Some)
            .map_err(|e| self.expr_error(e, el))
    }

    fn render_format_attr(
        &self,
        el: &Element,
        attr: &str,
        values: &Values,
    ) -> Result<String, QWebError> {
        let format: Format = split_format(el.attr(attr).unwrap_or_default(), |expr| {
            self.parse(expr, el)
        })?;
        runtime::render_format(&format, |expr| self.eval(expr, &*values))
            .map_err(|e| self.expr_error(e, el))
    }

    fn parse(&self, source: &str, el: &Element) -> Result<Expr, QWebError> {
        let source = source.trim();
        parse_expression(source).map_err(|err| {
            QWebError::from_expr_compile(
                &self.template,
                source,
                err,
                Some(&el.path),
                Some(el.to_xml()),
            )
        })
    }

    fn eval(&self, expr: &Expr, values: &Values) -> Result<Value, ExprError> {
        let scope = StrictScope {
            values,
            undefined: self.undefined.as_ref(),
        };
        evaluate(expr, &scope)
    }

    fn expr_error(&self, err: ExprError, el: &Element) -> QWebError {
        match err {
            ExprError::Name(name) => QWebError::UndefinedVariable {
                name,
                template: self.template.clone(),
            },
            other => self.error(el, other.to_string()),
        }
    }

    fn error(&self, el: &Element, message: impl Into<String>) -> QWebError {
        QWebError::Render {
            message: message.into(),
            template: self.template.clone(),
            path: Some(el.path.clone()),
            node: Some(el.to_xml()),
        }
    }
}
