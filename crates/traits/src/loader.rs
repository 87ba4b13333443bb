//! TemplateLoader trait for abstracting where template sources come from.
//!
//! The engine only ever asks a loader for the XML source of one template;
//! whether that lives in memory, on disk or in a database is the host's
//! business.

use log::debug;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Identifies a template either by its registered name or by a numeric id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TemplateRef {
    Name(String),
    Id(i64),
}

impl TemplateRef {
    /// Interprets an all-digit string as an id, anything else as a name.
    pub fn parse(reference: &str) -> Self {
        let trimmed = reference.trim();
        match trimmed.parse::<i64>() {
            Ok(id) if trimmed.bytes().all(|b| b.is_ascii_digit()) => TemplateRef::Id(id),
            _ => TemplateRef::Name(trimmed.to_string()),
        }
    }
}

impl fmt::Display for TemplateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateRef::Name(name) => f.write_str(name),
            TemplateRef::Id(id) => write!(f, "{}", id),
        }
    }
}

impl From<&str> for TemplateRef {
    fn from(name: &str) -> Self {
        TemplateRef::Name(name.to_string())
    }
}

impl From<String> for TemplateRef {
    fn from(name: String) -> Self {
        TemplateRef::Name(name)
    }
}

impl From<i64> for TemplateRef {
    fn from(id: i64) -> Self {
        TemplateRef::Id(id)
    }
}

/// Error type for template loading operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Failed to load template '{template}': {message}")]
    LoadFailed { template: String, message: String },

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for LoadError {
    fn from(err: std::io::Error) -> Self {
        LoadError::Io(err.to_string())
    }
}

/// A source of template XML.
///
/// `epoch` is a version counter: whenever a loader's content changes it must
/// return a larger value, which tells the engine to drop compiled templates.
pub trait TemplateLoader: Send + Sync + Debug {
    /// Returns the XML source of the template, rooted at its own element.
    fn load(&self, template: &TemplateRef) -> Result<String, LoadError>;

    fn epoch(&self) -> u64 {
        0
    }

    /// Returns a human-readable name for this loader (for logging/debugging).
    fn name(&self) -> &'static str;
}

/// An in-memory template store, keyed by name and optionally by id.
#[derive(Debug, Default)]
pub struct InMemoryTemplateStore {
    templates: RwLock<HashMap<TemplateRef, String>>,
    epoch: AtomicU64,
}

impl InMemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a template under `name`.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::LoadFailed` if the internal lock is poisoned.
    pub fn add(&self, name: impl Into<String>, xml: impl Into<String>) -> Result<(), LoadError> {
        self.insert(TemplateRef::Name(name.into()), xml.into())
    }

    /// Adds or replaces a template under a numeric id.
    pub fn add_id(&self, id: i64, xml: impl Into<String>) -> Result<(), LoadError> {
        self.insert(TemplateRef::Id(id), xml.into())
    }

    /// Registers every element carrying a `t-name` attribute found at the top
    /// level of `document` (or the root itself when it is named).
    ///
    /// Returns the registered names in document order.
    pub fn add_document(&self, document: &str) -> Result<Vec<String>, LoadError> {
        let doc = roxmltree::Document::parse(document).map_err(|e| LoadError::LoadFailed {
            template: "<document>".to_string(),
            message: e.to_string(),
        })?;
        let root = doc.root_element();
        let candidates: Vec<roxmltree::Node> = if root.has_attribute("t-name") {
            vec![root]
        } else {
            root.children().filter(|n| n.is_element()).collect()
        };

        let mut names = Vec::new();
        for node in candidates {
            let Some(name) = node.attribute("t-name") else {
                continue;
            };
            self.add(name, &document[node.range()])?;
            names.push(name.to_string());
        }
        debug!("Registered {} templates from document", names.len());
        Ok(names)
    }

    /// Removes a template. Returns `None` if the lock is poisoned or it doesn't exist.
    pub fn remove(&self, template: &TemplateRef) -> Option<String> {
        let removed = self.templates.write().ok()?.remove(template);
        if removed.is_some() {
            self.bump();
        }
        removed
    }

    /// Clears all templates. Does nothing if the lock is poisoned.
    pub fn clear(&self) {
        if let Ok(mut templates) = self.templates.write() {
            templates.clear();
            self.bump();
        }
    }

    /// Returns 0 if the lock is poisoned.
    pub fn len(&self) -> usize {
        self.templates.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.templates.read().map(|t| t.is_empty()).unwrap_or(true)
    }

    fn insert(&self, key: TemplateRef, xml: String) -> Result<(), LoadError> {
        let mut templates = self.templates.write().map_err(|_| LoadError::LoadFailed {
            template: key.to_string(),
            message: "template store lock poisoned".to_string(),
        })?;
        templates.insert(key, xml);
        self.bump();
        Ok(())
    }

    fn bump(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }
}

impl TemplateLoader for InMemoryTemplateStore {
    fn load(&self, template: &TemplateRef) -> Result<String, LoadError> {
        let templates = self.templates.read().map_err(|_| LoadError::LoadFailed {
            template: template.to_string(),
            message: "template store lock poisoned".to_string(),
        })?;
        templates
            .get(template)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(template.to_string()))
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn name(&self) -> &'static str {
        "InMemoryTemplateStore"
    }
}
