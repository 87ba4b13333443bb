#![allow(dead_code)]

use qweb::{
    InMemoryTemplateStore, LoadError, QWeb, QWebError, RenderOptions, TemplateLoader,
    TemplateRef, Values,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A store holding `templates`, keyed by name.
pub fn store_with(templates: &[(&str, &str)]) -> Arc<InMemoryTemplateStore> {
    let store = Arc::new(InMemoryTemplateStore::new());
    for (name, xml) in templates {
        store
            .add(*name, *xml)
            .unwrap_or_else(|e| panic!("failed to add template '{}': {}", name, e));
    }
    store
}

pub fn engine_with(templates: &[(&str, &str)]) -> QWeb {
    QWeb::new(store_with(templates))
}

/// Renders a single anonymous template compiled with default options.
pub fn render_one(xml: &str, values: Values) -> Result<String, QWebError> {
    engine_with(&[("t", xml)]).render(&TemplateRef::from("t"), values, &RenderOptions::default())
}

/// Renders a single anonymous template with the interpretive renderer.
pub fn interpret_one(xml: &str, values: Values) -> Result<String, QWebError> {
    engine_with(&[("t", xml)]).render_interpreted(
        &TemplateRef::from("t"),
        values,
        &RenderOptions::default(),
        None,
    )
}

pub fn values(json: serde_json::Value) -> Values {
    Values::from_json(json)
}

/// Wraps a store and counts how often templates are loaded.
#[derive(Debug)]
pub struct CountingLoader {
    pub inner: Arc<InMemoryTemplateStore>,
    loads: AtomicUsize,
}

impl CountingLoader {
    pub fn new(inner: Arc<InMemoryTemplateStore>) -> Self {
        Self {
            inner,
            loads: AtomicUsize::new(0),
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl TemplateLoader for CountingLoader {
    fn load(&self, template: &TemplateRef) -> Result<String, LoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load(template)
    }

    fn epoch(&self) -> u64 {
        self.inner.epoch()
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}
