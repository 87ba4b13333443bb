//! Render-scoped error attribution.
//!
//! Compiled code records the tree path of each element before running it, so
//! an error raised deep inside an expression can name the template node it
//! came from without a path being threaded through every call.

use crate::error::QWebError;
use crate::ir::CompiledTemplate;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    template: String,
    last_path_node: Option<String>,
    nodes: Arc<HashMap<String, String>>,
    depth: usize,
}

/// Caller state saved by [`Diagnostics::enter`].
#[derive(Debug)]
pub struct Frame {
    template: String,
    last_path_node: Option<String>,
    nodes: Arc<HashMap<String, String>>,
}

impl Diagnostics {
    pub fn new(template: impl Into<String>, nodes: Arc<HashMap<String, String>>) -> Self {
        Self {
            template: template.into(),
            last_path_node: None,
            nodes,
            depth: 0,
        }
    }

    pub fn for_template(template: &CompiledTemplate) -> Self {
        Self::new(template.name.clone(), template.nodes.clone())
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn last_path_node(&self) -> Option<&str> {
        self.last_path_node.as_deref()
    }

    /// Current `t-call` nesting.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn set_path(&mut self, path: &str) {
        if self.last_path_node.as_deref() != Some(path) {
            self.last_path_node = Some(path.to_string());
        }
    }

    /// Switches attribution to a called template.
    pub fn enter(&mut self, callee: &CompiledTemplate) -> Frame {
        self.enter_parts(callee.name.clone(), callee.nodes.clone())
    }

    pub(crate) fn enter_parts(
        &mut self,
        template: String,
        nodes: Arc<HashMap<String, String>>,
    ) -> Frame {
        self.depth += 1;
        Frame {
            template: std::mem::replace(&mut self.template, template),
            last_path_node: self.last_path_node.take(),
            nodes: std::mem::replace(&mut self.nodes, nodes),
        }
    }

    pub fn leave(&mut self, frame: Frame) {
        self.depth = self.depth.saturating_sub(1);
        self.template = frame.template;
        self.last_path_node = frame.last_path_node;
        self.nodes = frame.nodes;
    }

    /// A render error attributed to the last recorded node. A path with no
    /// indexed node still yields the error, just without the serialized node.
    pub fn render_error(&self, message: impl Into<String>) -> QWebError {
        let node = self
            .last_path_node
            .as_ref()
            .and_then(|path| self.nodes.get(path))
            .cloned();
        QWebError::Render {
            message: message.into(),
            template: self.template.clone(),
            path: self.last_path_node.clone(),
            node,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_error_resolves_node() {
        let nodes = HashMap::from([("/t/p".to_string(), "<p t-esc=\"x\"/>".to_string())]);
        let mut diag = Diagnostics::new("page", Arc::new(nodes));
        diag.set_path("/t/p");
        match diag.render_error("boom") {
            QWebError::Render {
                template,
                path,
                node,
                ..
            } => {
                assert_eq!(template, "page");
                assert_eq!(path.as_deref(), Some("/t/p"));
                assert_eq!(node.as_deref(), Some("<p t-esc=\"x\"/>"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_unresolvable_path_keeps_error() {
        let mut diag = Diagnostics::new("page", Arc::default());
        diag.set_path("/t/gone");
        let err = diag.render_error("boom");
        assert_eq!(err.path(), Some("/t/gone"));
        assert!(matches!(err, QWebError::Render { node: None, .. }));
    }

    #[test]
    fn test_enter_and_leave_restore_caller() {
        let mut diag = Diagnostics::new("caller", Arc::default());
        diag.set_path("/t/div");
        let frame = diag.enter_parts("callee".into(), Arc::default());
        assert_eq!(diag.template(), "callee");
        assert_eq!(diag.depth(), 1);
        assert_eq!(diag.last_path_node(), None);
        diag.leave(frame);
        assert_eq!(diag.template(), "caller");
        assert_eq!(diag.last_path_node(), Some("/t/div"));
        assert_eq!(diag.depth(), 0);
    }
}
