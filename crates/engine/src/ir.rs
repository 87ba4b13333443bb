//! Executable statements emitted by the directive compiler.

use crate::diagnostics::Diagnostics;
use crate::engine::QWeb;
use crate::error::QWebError;
use crate::executor::Executor;
use crate::options::RenderOptions;
use qweb_expr::{Expr, Values};
use std::collections::HashMap;
use std::sync::Arc;

/// A named, independently invocable unit of IR.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFunction {
    pub name: String,
    pub body: Vec<Statement>,
}

impl CompiledFunction {
    /// Runs the body, appending output to `append`. Every synthesized function
    /// shares this shape, so any of them can be called from any other.
    pub fn invoke(
        &self,
        engine: &QWeb,
        append: &mut String,
        values: &mut Values,
        options: &RenderOptions,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), QWebError> {
        Executor::new(engine, options, diagnostics).run(&self.body, values, append)
    }
}

/// One compiled template: its entry point plus every nested function.
#[derive(Debug)]
pub struct CompiledTemplate {
    pub name: String,
    pub entry: Arc<CompiledFunction>,
    pub functions: Vec<Arc<CompiledFunction>>,
    /// Serialized source of each directive-bearing element, by tree path.
    pub nodes: Arc<HashMap<String, String>>,
}

impl CompiledTemplate {
    pub fn function(&self, name: &str) -> Option<&Arc<CompiledFunction>> {
        self.functions.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Records the tree path of the element about to run, for error reports.
    SetPath(String),
    Text(String),
    /// `<tag` plus the merged attributes, closed with `>` or `/>`.
    OpenTag {
        tag: String,
        attributes: Vec<AttrPart>,
        self_close: bool,
    },
    If {
        test: Expr,
        then: Vec<Statement>,
        otherwise: Vec<Statement>,
    },
    Groups {
        groups: String,
        body: Vec<Statement>,
    },
    ForEach {
        iterable: Expr,
        name: Option<String>,
        body: Arc<CompiledFunction>,
    },
    Set {
        name: String,
        value: SetValue,
    },
    /// `t-esc` / `t-raw`.
    Output {
        source: OutputSource,
        escape: bool,
        widget: Option<WidgetOptions>,
        default: Option<Arc<CompiledFunction>>,
    },
    Field(Box<FieldStatement>),
    Call {
        template: Format,
        body: Option<Arc<CompiledFunction>>,
        options: Option<Expr>,
    },
    CallAssets {
        xmlid: Format,
        css: bool,
        js: bool,
        async_load: bool,
    },
    Debug {
        tool: String,
    },
    CallFunction(Arc<CompiledFunction>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldStatement {
    pub tag: String,
    pub attributes: Vec<AttrPart>,
    pub record: Expr,
    pub field: String,
    pub expression: String,
    pub options: WidgetOptions,
    pub default: Option<Arc<CompiledFunction>>,
    pub void: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetValue {
    Expr(Expr),
    Format(Format),
    Body(Arc<CompiledFunction>),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutputSource {
    /// The `"0"` sentinel: the body passed in by the caller.
    Body,
    Expr(Expr),
}

/// `t-options` plus any `t-options-<key>` overrides, evaluated at render time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WidgetOptions {
    pub base: Option<Expr>,
    pub items: Vec<(String, Expr)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttrPart {
    Static(String, String),
    Expr(String, Expr),
    Format(String, Format),
    /// `t-att`: a mapping, a `[name, value]` pair or a list of pairs.
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Format(pub Vec<FormatPart>);

#[derive(Debug, Clone, PartialEq)]
pub enum FormatPart {
    Literal(String),
    Expr(Expr),
}

impl Format {
    /// The literal text when the format has no interpolations.
    pub fn as_literal(&self) -> Option<String> {
        self.0
            .iter()
            .map(|part| match part {
                FormatPart::Literal(text) => Some(text.as_str()),
                FormatPart::Expr(_) => None,
            })
            .collect::<Option<Vec<_>>>()
            .map(|parts| parts.concat())
    }
}

/// Appends a text statement, merging it into a preceding one.
pub fn push_text(body: &mut Vec<Statement>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Statement::Text(prev)) = body.last_mut() {
        prev.push_str(text);
    } else {
        body.push(Statement::Text(text.to_string()));
    }
}

/// Appends `statements`, merging a leading text statement into a trailing one.
pub fn extend_body(body: &mut Vec<Statement>, statements: Vec<Statement>) {
    for statement in statements {
        match statement {
            Statement::Text(text) => push_text(body, &text),
            other => body.push(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjacent_text_is_merged() {
        let mut body = Vec::new();
        push_text(&mut body, "<p>");
        extend_body(
            &mut body,
            vec![
                Statement::Text("a".into()),
                Statement::SetPath("/p".into()),
                Statement::Text("b".into()),
            ],
        );
        push_text(&mut body, "</p>");
        assert_eq!(
            body,
            vec![
                Statement::Text("<p>a".into()),
                Statement::SetPath("/p".into()),
                Statement::Text("b</p>".into()),
            ]
        );
    }

    #[test]
    fn test_format_literal() {
        let format = Format(vec![
            FormatPart::Literal("a".into()),
            FormatPart::Literal("b".into()),
        ]);
        assert_eq!(format.as_literal().as_deref(), Some("ab"));
        let dynamic = Format(vec![FormatPart::Expr(Expr::Lookup("x".into()))]);
        assert_eq!(dynamic.as_literal(), None);
    }
}
