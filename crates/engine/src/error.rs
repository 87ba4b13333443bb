use qweb_expr::ExprError;
use qweb_traits::LoadError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QWebError {
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Failed to load template: {0}")]
    Load(String),

    #[error("Error compiling template '{template}': {message}")]
    Compile {
        message: String,
        template: String,
        path: Option<String>,
        node: Option<String>,
    },

    #[error("Forbidden expression in template '{template}': {message}")]
    Security { message: String, template: String },

    #[error("Error rendering template '{template}': {message}")]
    Render {
        message: String,
        template: String,
        path: Option<String>,
        node: Option<String>,
    },

    #[error("Undefined variable '{name}' in template '{template}'")]
    UndefinedVariable { name: String, template: String },

    #[error("Maximum t-call depth ({depth}) exceeded when calling '{template}'")]
    RecursionLimit { template: String, depth: usize },

    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl QWebError {
    pub fn compile(template: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Compile {
            message: message.into(),
            template: template.into(),
            path: None,
            node: None,
        }
    }

    pub fn render(template: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Render {
            message: message.into(),
            template: template.into(),
            path: None,
            node: None,
        }
    }

    /// Maps an expression compile failure: sandbox rejections stay security errors.
    pub fn from_expr_compile(
        template: &str,
        source: &str,
        err: ExprError,
        path: Option<&str>,
        node: Option<String>,
    ) -> Self {
        match err {
            ExprError::Security(construct) => Self::Security {
                message: format!("{} in '{}'", construct, source),
                template: template.to_string(),
            },
            other => Self::Compile {
                message: other.to_string(),
                template: template.to_string(),
                path: path.map(str::to_string),
                node,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TemplateNotFound(_))
    }

    /// Tree path of the node being processed when the error happened, if known.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Compile { path, .. } | Self::Render { path, .. } => path.as_deref(),
            _ => None,
        }
    }
}

impl From<LoadError> for QWebError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::NotFound(name) => Self::TemplateNotFound(name),
            other => Self::Load(other.to_string()),
        }
    }
}
