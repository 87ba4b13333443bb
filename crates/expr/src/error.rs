use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("Expression parse error in '{0}': {1}")]
    Parse(String, String),

    #[error("Forbidden construct in sandboxed expression: {0}")]
    Security(String),

    #[error("Name '{0}' is not defined")]
    Name(String),

    #[error("Type error: {0}")]
    Type(String),

    #[error("'{type_name}' object has no attribute '{attr}'")]
    Attribute { type_name: String, attr: String },

    #[error("Index error: {0}")]
    Index(String),

    #[error("Key error: {0}")]
    Key(String),

    #[error("Division by zero")]
    ZeroDivision,

    #[error("Function '{function}' error: {message}")]
    Call { function: String, message: String },
}

impl ExprError {
    pub fn parse(expr: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Parse(expr.into(), msg.into())
    }

    pub fn security(construct: impl Into<String>) -> Self {
        Self::Security(construct.into())
    }

    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::Type(msg.into())
    }

    pub fn attribute(type_name: impl Into<String>, attr: impl Into<String>) -> Self {
        Self::Attribute {
            type_name: type_name.into(),
            attr: attr.into(),
        }
    }

    pub fn call(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Call {
            function: function.into(),
            message: message.into(),
        }
    }
}
