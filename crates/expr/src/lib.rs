pub mod ast;
pub mod builtins;
pub mod context;
pub mod error;
pub mod eval;
pub mod operators;
pub mod parser;
pub mod rewrite;
pub mod value;

pub use ast::Expr;
pub use context::{Scope, Values};
pub use error::ExprError;
pub use eval::{Evaluator, evaluate};
pub use parser::parse_expression;
pub use rewrite::{rewrite, rewrite_sandboxed};
pub use value::{Map, MapRecord, Record, Value};
