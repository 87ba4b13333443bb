//! The QWeb engine: loading, compiling, caching and rendering templates.

use crate::assets::{AssetBundler, TemplateAssetBundler};
use crate::compiler::Compiler;
use crate::config::{EngineConfig, LangFormat};
use crate::diagnostics::Diagnostics;
use crate::document::{Element, parse_template};
use crate::error::QWebError;
use crate::fields::{ConverterRegistry, FieldConverter};
use crate::interpreter::{Interpreter, UndefinedHandler};
use crate::ir::CompiledTemplate;
use crate::options::{CacheKey, RenderOptions};
use log::{debug, info};
use qweb_expr::{Map, Value, Values};
use qweb_traits::{GroupChecker, StaticGroups, TemplateLoader, TemplateRef};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Called for `t-debug` when dev mode is on, with the tool name and values.
pub type DebugHook = Arc<dyn Fn(&str, &Values) + Send + Sync>;

type CacheMap = HashMap<(TemplateRef, CacheKey), Arc<CompiledTemplate>>;

pub struct QWeb {
    loader: Arc<dyn TemplateLoader>,
    config: EngineConfig,
    converters: ConverterRegistry,
    groups: Arc<dyn GroupChecker>,
    bundler: Arc<dyn AssetBundler>,
    debug_hook: Option<DebugHook>,
    default_lang: LangFormat,
    languages: HashMap<String, LangFormat>,
    default_values: Map,
    cache: RwLock<CacheMap>,
    cache_epoch: AtomicU64,
}

impl fmt::Debug for QWeb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QWeb")
            .field("loader", &self.loader.name())
            .field("config", &self.config)
            .field("languages", &self.languages.keys().collect::<Vec<_>>())
            .field("cache_size", &self.cache_size())
            .finish()
    }
}

impl QWeb {
    /// An engine over `loader` with the default configuration.
    pub fn new(loader: Arc<dyn TemplateLoader>) -> Self {
        QWebBuilder::new(loader).build()
    }

    pub fn builder(loader: Arc<dyn TemplateLoader>) -> QWebBuilder {
        QWebBuilder::new(loader)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    pub fn bundler(&self) -> &dyn AssetBundler {
        self.bundler.as_ref()
    }

    pub fn register_converter(
        &mut self,
        name: impl Into<String>,
        converter: impl FieldConverter + 'static,
    ) {
        self.converters.register(name, converter);
    }

    pub fn register_lang(&mut self, lang: LangFormat) {
        self.languages.insert(lang.code.clone(), lang);
    }

    /// Formats of `code`, falling back to `en_US`.
    pub fn lang_format(&self, code: Option<&str>) -> &LangFormat {
        code.and_then(|code| self.languages.get(code))
            .unwrap_or(&self.default_lang)
    }

    pub fn user_has_groups(&self, groups: &str) -> bool {
        self.groups.user_has_groups(groups)
    }

    pub(crate) fn run_debug_hook(&self, tool: &str, values: &Values) {
        match &self.debug_hook {
            Some(hook) => hook(tool, values),
            None => info!("t-debug '{}' reached with no debug hook installed", tool),
        }
    }

    /// Fresh values seeded with builtins, the engine defaults and `values`.
    pub fn prepare_values(&self, values: Values) -> Values {
        if self.default_values.is_empty() {
            return values;
        }
        let mut prepared = Values::new();
        prepared.extend(
            self.default_values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        prepared.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
        if let Some(body) = values.body() {
            prepared.set_body(body.clone());
        }
        prepared
    }

    /// Renders `template` with the compiled renderer.
    pub fn render(
        &self,
        template: &TemplateRef,
        values: Values,
        options: &RenderOptions,
    ) -> Result<String, QWebError> {
        let compiled = self.compile(template, options)?;
        let mut values = self.prepare_values(values);
        let mut diagnostics = Diagnostics::for_template(&compiled);
        let mut out = String::new();
        compiled
            .entry
            .invoke(self, &mut out, &mut values, options, &mut diagnostics)?;
        Ok(out)
    }

    /// Renders `template` with the interpretive renderer. Names missing from
    /// the values fail unless `undefined` supplies them.
    pub fn render_interpreted(
        &self,
        template: &TemplateRef,
        values: Values,
        options: &RenderOptions,
        undefined: Option<UndefinedHandler>,
    ) -> Result<String, QWebError> {
        let root = self.get_template(template)?;
        let mut values = self.prepare_values(values);
        Interpreter::new(self, template.to_string(), options.clone(), undefined)
            .render(&root, &mut values)
    }

    /// Loads and parses the element tree of `template`.
    pub fn get_template(&self, template: &TemplateRef) -> Result<Element, QWebError> {
        let source = self.loader.load(template)?;
        parse_template(&source, template)
    }

    /// The compiled form of `template` for `options`, from the cache when
    /// possible. Only successful compiles are cached.
    pub fn compile(
        &self,
        template: &TemplateRef,
        options: &RenderOptions,
    ) -> Result<Arc<CompiledTemplate>, QWebError> {
        let epoch = self.sync_epoch()?;
        let key = (template.clone(), options.cache_key());
        if let Some(compiled) = self.cache_read()?.get(&key) {
            return Ok(compiled.clone());
        }

        let root = self.get_template(template)?;
        let compiled =
            Arc::new(Compiler::new(template.to_string(), self.config.sandboxed).compile(&root)?);
        // Checked under the write lock: a write during the compile must not
        // leave this result behind a concurrent clear.
        let mut cache = self.cache_write()?;
        if self.loader.epoch() == epoch && self.cache_epoch.load(Ordering::Acquire) == epoch {
            debug!("Caching compiled template '{}'", template);
            cache.insert(key, compiled.clone());
        } else {
            debug!("Template source changed while compiling '{}', not caching", template);
        }
        Ok(compiled)
    }

    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }

    pub fn cache_size(&self) -> usize {
        self.cache.read().map(|cache| cache.len()).unwrap_or(0)
    }

    /// Drops compiled templates when the loader's content has changed and
    /// returns the epoch the caller's compile is based on.
    fn sync_epoch(&self) -> Result<u64, QWebError> {
        let epoch = self.loader.epoch();
        if self.cache_epoch.swap(epoch, Ordering::AcqRel) != epoch {
            debug!("Template source changed (epoch {}), clearing cache", epoch);
            self.cache_write()?.clear();
        }
        Ok(epoch)
    }

    fn cache_read(&self) -> Result<std::sync::RwLockReadGuard<'_, CacheMap>, QWebError> {
        self.cache
            .read()
            .map_err(|_| QWebError::Load("template cache lock poisoned".into()))
    }

    fn cache_write(&self) -> Result<std::sync::RwLockWriteGuard<'_, CacheMap>, QWebError> {
        self.cache
            .write()
            .map_err(|_| QWebError::Load("template cache lock poisoned".into()))
    }
}

/// Builder for [`QWeb`].
pub struct QWebBuilder {
    loader: Arc<dyn TemplateLoader>,
    config: EngineConfig,
    converters: ConverterRegistry,
    groups: Arc<dyn GroupChecker>,
    bundler: Arc<dyn AssetBundler>,
    debug_hook: Option<DebugHook>,
    languages: Vec<LangFormat>,
}

impl QWebBuilder {
    pub fn new(loader: Arc<dyn TemplateLoader>) -> Self {
        Self {
            loader,
            config: EngineConfig::default(),
            converters: ConverterRegistry::with_defaults(),
            groups: Arc::new(StaticGroups::default()),
            bundler: Arc::new(TemplateAssetBundler),
            debug_hook: None,
            languages: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Compiles every expression through the sandbox check.
    pub fn with_sandbox(mut self, sandboxed: bool) -> Self {
        self.config.sandboxed = sandboxed;
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.config.max_call_depth = depth;
        self
    }

    pub fn with_converters(mut self, converters: ConverterRegistry) -> Self {
        self.converters = converters;
        self
    }

    pub fn with_converter(
        mut self,
        name: impl Into<String>,
        converter: impl FieldConverter + 'static,
    ) -> Self {
        self.converters.register(name, converter);
        self
    }

    pub fn with_groups(mut self, groups: Arc<dyn GroupChecker>) -> Self {
        self.groups = groups;
        self
    }

    pub fn with_bundler(mut self, bundler: Arc<dyn AssetBundler>) -> Self {
        self.bundler = bundler;
        self
    }

    pub fn with_debug_hook(mut self, hook: DebugHook) -> Self {
        self.debug_hook = Some(hook);
        self
    }

    pub fn with_lang(mut self, lang: LangFormat) -> Self {
        self.languages.push(lang);
        self
    }

    /// A value available to every render unless the caller overrides it.
    pub fn with_default_value(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.config.default_values.insert(name.into(), value);
        self
    }

    pub fn build(self) -> QWeb {
        let default_values = match Value::from(serde_json::Value::Object(
            self.config.default_values.clone(),
        )) {
            Value::Map(map) => map.as_ref().clone(),
            _ => Map::new(),
        };
        let languages = self
            .config
            .languages
            .iter()
            .chain(self.languages.iter())
            .map(|lang| (lang.code.clone(), lang.clone()))
            .collect();
        QWeb {
            loader: self.loader,
            config: self.config,
            converters: self.converters,
            groups: self.groups,
            bundler: self.bundler,
            debug_hook: self.debug_hook,
            default_lang: LangFormat::default(),
            languages,
            default_values,
            cache: RwLock::new(HashMap::new()),
            cache_epoch: AtomicU64::new(0),
        }
    }
}
