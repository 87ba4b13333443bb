//! Directive compiler: turns a template element tree into IR.
//!
//! Each element is compiled by walking [`DIRECTIVE_ORDER`]. The first
//! directive present on the element handles it and compiles the remaining
//! directives as its body, so `<li t-foreach="xs" t-as="x" t-if="x">` behaves
//! like a `t-foreach` wrapping a `t-if` wrapping the `<li>`.

use crate::document::{Element, Node};
use crate::error::QWebError;
use crate::ir::{CompiledTemplate, Format, FormatPart, Statement, extend_body, push_text};
use crate::synthesizer::FunctionSynthesizer;
use log::debug;
use qweb_expr::{Expr, rewrite, rewrite_sandboxed};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// `#{expr}` (ruby style) or `{{expr}}` (jinja style).
static FORMAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:#\{(.+?)\})|(?:\{\{(.+?)\}\})").expect("BUG: invalid FORMAT_RE regex literal")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Directive {
    Debug,
    Groups,
    Foreach,
    If,
    Elif,
    Else,
    Field,
    Tag,
    CallAssets,
    Call,
    Set,
    Esc,
    Raw,
    Content,
}

pub(crate) const DIRECTIVE_ORDER: &[Directive] = &[
    Directive::Debug,
    Directive::Groups,
    Directive::Foreach,
    Directive::If,
    Directive::Elif,
    Directive::Else,
    Directive::Field,
    Directive::Tag,
    Directive::CallAssets,
    Directive::Call,
    Directive::Set,
    Directive::Esc,
    Directive::Raw,
    Directive::Content,
];

/// Attributes consumed by directives or by attribute emission.
const IGNORED_ATTRIBUTES: &[&str] = &[
    "t-name",
    "t-as",
    "t-value",
    "t-valuef",
    "t-ignore",
    "t-js",
    "t-css",
    "t-async",
    "t-placeholder",
    "t-field-options",
    "t-call-options",
    "t-options",
    "t-att",
];

const IGNORED_PREFIXES: &[&str] = &["t-options-", "t-att-", "t-attf-"];

impl Directive {
    pub(crate) fn attribute(self) -> Option<&'static str> {
        match self {
            Directive::Debug => Some("t-debug"),
            Directive::Groups => Some("t-groups"),
            Directive::Foreach => Some("t-foreach"),
            Directive::If => Some("t-if"),
            Directive::Elif => Some("t-elif"),
            Directive::Else => Some("t-else"),
            Directive::Field => Some("t-field"),
            Directive::CallAssets => Some("t-call-assets"),
            Directive::Call => Some("t-call"),
            Directive::Set => Some("t-set"),
            Directive::Esc => Some("t-esc"),
            Directive::Raw => Some("t-raw"),
            Directive::Tag | Directive::Content => None,
        }
    }

    pub(crate) fn present_on(self, el: &Element) -> bool {
        match self {
            Directive::Tag => true,
            Directive::Content => !(el.has("t-esc") || el.has("t-raw") || el.has("t-field")),
            Directive::Groups => el.has("t-groups") || el.has("groups"),
            other => other.attribute().is_some_and(|attr| el.has(attr)),
        }
    }
}

/// Rejects `t-*` attributes that are neither directives nor on the ignore-list,
/// and combinations of directives that each produce the element's content.
pub(crate) fn check_directives(el: &Element) -> Result<(), String> {
    for name in el.attributes.keys() {
        if !name.starts_with("t-") {
            continue;
        }
        let known = DIRECTIVE_ORDER
            .iter()
            .any(|d| d.attribute() == Some(name.as_str()))
            || IGNORED_ATTRIBUTES.contains(&name.as_str())
            || IGNORED_PREFIXES.iter().any(|p| name.starts_with(p));
        if !known {
            return Err(format!(
                "Unknown directive '{}' on {}",
                name,
                el.to_xml()
            ));
        }
    }
    let terminal: Vec<&str> = ["t-field", "t-esc", "t-raw"]
        .into_iter()
        .filter(|attr| el.has(attr))
        .collect();
    if terminal.len() > 1 {
        return Err(format!(
            "Conflicting directives {} on {}",
            terminal.join(", "),
            el.to_xml()
        ));
    }
    Ok(())
}

/// Parses a boolean flag attribute; `false`, `False`, `0` and `` are false.
pub(crate) fn parse_bool(value: Option<&str>, default: bool) -> bool {
    match value.map(str::trim) {
        None => default,
        Some("false" | "False" | "0" | "") => false,
        Some(_) => true,
    }
}

/// Splits a format string into literal and `#{}`/`{{}}` parts, parsing each
/// interpolation with `parse`.
pub(crate) fn split_format<F>(source: &str, mut parse: F) -> Result<Format, QWebError>
where
    F: FnMut(&str) -> Result<Expr, QWebError>,
{
    let mut parts = Vec::new();
    let mut last = 0;
    for caps in FORMAT_RE.captures_iter(source) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > last {
            parts.push(FormatPart::Literal(source[last..whole.start()].to_string()));
        }
        let expr = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        parts.push(FormatPart::Expr(parse(expr)?));
        last = whole.end();
    }
    if last < source.len() {
        parts.push(FormatPart::Literal(source[last..].to_string()));
    }
    Ok(Format(parts))
}

pub struct Compiler {
    pub(crate) template: String,
    pub(crate) sandboxed: bool,
    pub(crate) synthesizer: FunctionSynthesizer,
    /// Else-branch compiled for the `t-if`/`t-elif` element being compiled.
    pub(crate) pending_otherwise: Option<Vec<Statement>>,
    /// Set while compiling a `t-elif`/`t-else` that follows a conditional.
    pub(crate) chained: bool,
    /// Path of the last `SetPath` emitted.
    last_path: Option<String>,
}

impl Compiler {
    pub fn new(template: impl Into<String>, sandboxed: bool) -> Self {
        Self {
            template: template.into(),
            sandboxed,
            synthesizer: FunctionSynthesizer::new(),
            pending_otherwise: None,
            chained: false,
            last_path: None,
        }
    }

    /// Compiles `root` into a template whose entry point renders it.
    pub fn compile(mut self, root: &Element) -> Result<CompiledTemplate, QWebError> {
        let body = self.compile_node(root)?;
        let (entry, _) = self.synthesizer.wrap(body, "template");
        let mut nodes = HashMap::new();
        root.index_nodes(&mut nodes);
        debug!(
            "Compiled template '{}' into {} functions",
            self.template,
            self.synthesizer.functions().len()
        );
        Ok(CompiledTemplate {
            name: self.template,
            entry,
            functions: self.synthesizer.into_functions(),
            nodes: Arc::new(nodes),
        })
    }

    pub fn compile_node(&mut self, el: &Element) -> Result<Vec<Statement>, QWebError> {
        if el.is_static() {
            return self.compile_static(el);
        }
        check_directives(el).map_err(|message| self.error(el, message))?;
        let mut body = Vec::new();
        if self.last_path.as_deref() != Some(el.path.as_str()) {
            self.last_path = Some(el.path.clone());
            body.push(Statement::SetPath(el.path.clone()));
        }
        extend_body(&mut body, self.compile_directives(el, DIRECTIVE_ORDER)?);
        Ok(body)
    }

    /// Compiles the first directive of `remaining` present on `el`.
    pub(crate) fn compile_directives(
        &mut self,
        el: &Element,
        remaining: &[Directive],
    ) -> Result<Vec<Statement>, QWebError> {
        let Some(index) = remaining.iter().position(|d| d.present_on(el)) else {
            return Ok(Vec::new());
        };
        let rest = &remaining[index + 1..];
        match remaining[index] {
            Directive::Debug => self.compile_debug(el, rest),
            Directive::Groups => self.compile_groups(el, rest),
            Directive::Foreach => self.compile_foreach(el, rest),
            Directive::If => self.compile_if(el, rest),
            Directive::Elif => self.compile_elif(el, rest),
            Directive::Else => self.compile_else(el, rest),
            Directive::Field => self.compile_field(el),
            Directive::Tag => self.compile_tag(el, rest),
            Directive::CallAssets => self.compile_call_assets(el),
            Directive::Call => self.compile_call(el),
            Directive::Set => self.compile_set(el),
            Directive::Esc => self.compile_output(el, "t-esc", true),
            Directive::Raw => self.compile_output(el, "t-raw", false),
            Directive::Content => self.compile_content(el),
        }
    }

    /// Compiles an expression, sandboxed when the engine asks for it.
    pub(crate) fn compile_expr(&self, source: &str, el: &Element) -> Result<Expr, QWebError> {
        let source = source.trim();
        let compiled = if self.sandboxed {
            rewrite_sandboxed(source)
        } else {
            rewrite(source)
        };
        compiled.map_err(|err| {
            QWebError::from_expr_compile(
                &self.template,
                source,
                err,
                Some(&el.path),
                Some(el.to_xml()),
            )
        })
    }

    pub(crate) fn compile_format(&self, source: &str, el: &Element) -> Result<Format, QWebError> {
        split_format(source, |expr| self.compile_expr(expr, el))
    }

    pub(crate) fn error(&self, el: &Element, message: impl Into<String>) -> QWebError {
        QWebError::Compile {
            message: message.into(),
            template: self.template.clone(),
            path: Some(el.path.clone()),
            node: Some(el.to_xml()),
        }
    }

    /// Compiles the children of `el`, pairing `t-if` with the `t-elif`/`t-else`
    /// siblings that follow it across whitespace-only text.
    pub(crate) fn compile_children(&mut self, el: &Element) -> Result<Vec<Statement>, QWebError> {
        let mut body = Vec::new();
        let children = &el.children;
        let mut i = 0;
        while i < children.len() {
            match &children[i] {
                Node::Text(text) => {
                    push_text(&mut body, &quick_xml::escape::partial_escape(text.as_str()));
                    i += 1;
                }
                Node::Element(child) if child.has("t-if") => {
                    let chain = else_chain(children, i);
                    let compiled = self.compile_if_chain(child, &chain)?;
                    extend_body(&mut body, compiled);
                    i = chain.last().map_or(i + 1, |(index, _)| index + 1);
                }
                Node::Element(child) => {
                    extend_body(&mut body, self.compile_node(child)?);
                    i += 1;
                }
            }
        }
        Ok(body)
    }

    fn compile_if_chain(
        &mut self,
        head: &Element,
        chain: &[(usize, &Element)],
    ) -> Result<Vec<Statement>, QWebError> {
        let mut otherwise: Option<Vec<Statement>> = None;
        for (_, branch) in chain.iter().rev() {
            self.chained = true;
            self.pending_otherwise = otherwise.take();
            let compiled = self.compile_node(branch);
            self.chained = false;
            self.pending_otherwise = None;
            otherwise = Some(compiled?);
        }
        self.pending_otherwise = otherwise;
        let compiled = self.compile_node(head);
        self.pending_otherwise = None;
        compiled
    }

    fn compile_static(&mut self, el: &Element) -> Result<Vec<Statement>, QWebError> {
        let mut body = Vec::new();
        if el.tag == "t" {
            return self.compile_children(el);
        }
        let mut open = format!("<{}", el.tag);
        for (name, value) in &el.attributes {
            open.push_str(&format!(
                " {}=\"{}\"",
                name,
                quick_xml::escape::escape(value.as_str())
            ));
        }
        if el.is_void() {
            open.push_str("/>");
            push_text(&mut body, &open);
            extend_body(&mut body, self.compile_children(el)?);
        } else {
            open.push('>');
            push_text(&mut body, &open);
            extend_body(&mut body, self.compile_children(el)?);
            push_text(&mut body, &format!("</{}>", el.tag));
        }
        Ok(body)
    }
}

/// The `t-elif`/`t-else` siblings following `children[start]`, with only
/// whitespace text in between. A `t-else` ends the chain.
pub(crate) fn else_chain(children: &[Node], start: usize) -> Vec<(usize, &Element)> {
    let mut chain = Vec::new();
    let mut i = start + 1;
    while i < children.len() {
        match &children[i] {
            Node::Text(text) if text.trim().is_empty() => i += 1,
            Node::Element(el) if el.has("t-elif") && !el.has("t-if") => {
                chain.push((i, el));
                i += 1;
            }
            Node::Element(el) if el.has("t-else") && !el.has("t-if") => {
                chain.push((i, el));
                break;
            }
            _ => break,
        }
    }
    chain
}
