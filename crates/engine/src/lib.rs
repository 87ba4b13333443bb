//! QWeb template engine.
//!
//! Templates are XML documents decorated with `t-*` directives. The engine
//! parses a template, compiles its directives into a tree of statements,
//! caches the result per option set and executes it against render values.
//! An interpretive renderer over the same directives is available for
//! previews and comparison.

pub mod assets;
pub mod compiler;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod engine;
pub mod error;
pub mod executor;
pub mod fields;
pub mod interpreter;
pub mod ir;
pub mod options;
pub mod synthesizer;

mod compiler_handlers;
mod executor_handlers;
mod runtime;


pub use assets::{AssetBundle, AssetBundler, AssetFlags, TemplateAssetBundler};
pub use config::{EngineConfig, LangFormat};
pub use engine::{DebugHook, QWeb, QWebBuilder};
pub use error::QWebError;
pub use fields::{ConvertError, ConverterRegistry, FieldContext, FieldConverter};
pub use interpreter::UndefinedHandler;
pub use ir::CompiledTemplate;
pub use options::RenderOptions;
