//! QWeb: an XML template engine compiling `t-*` directives into cached,
//! reusable render functions.
//!
//! This crate re-exports the member crates and hosts the `qweb` command line
//! tool:
//!
//! - [`expr`]: the expression language templates are written in.
//! - [`traits`]: template loaders and group membership checks.
//! - [`engine`]: compiler, executor, field converters and asset bundles.

pub mod cli;

pub use qweb_engine as engine;
pub use qweb_expr as expr;
pub use qweb_traits as traits;

pub use qweb_engine::{
    AssetBundle, AssetBundler, AssetFlags, CompiledTemplate, ConvertError, ConverterRegistry,
    DebugHook, EngineConfig, FieldContext, FieldConverter, LangFormat, QWeb, QWebBuilder,
    QWebError, RenderOptions, TemplateAssetBundler, UndefinedHandler,
};
pub use qweb_expr::{ExprError, Map, MapRecord, Record, Value, Values};
pub use qweb_traits::{
    FilesystemTemplateStore, GroupChecker, InMemoryTemplateStore, LoadError, StaticGroups,
    TemplateLoader, TemplateRef,
};
