//! Filesystem-based template loader.
//!
//! Template `name` is read from `<base>/<name>.xml`. Resolved paths must stay
//! inside the base directory, so names such as `../../etc/passwd` are refused.

use crate::loader::{LoadError, TemplateLoader, TemplateRef};
use log::debug;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
pub struct FilesystemTemplateStore {
    base_path: PathBuf,
    /// Canonicalized base path for security checks
    canonical_base: Option<PathBuf>,
    epoch: AtomicU64,
}

impl FilesystemTemplateStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        let base = base_path.as_ref().to_path_buf();
        let canonical = base.canonicalize().ok();
        Self {
            base_path: base,
            canonical_base: canonical,
            epoch: AtomicU64::new(0),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base_path
    }

    /// Signals that files changed on disk; compiled templates are dropped on next use.
    pub fn invalidate(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    fn resolve_path_safe(&self, name: &str) -> Option<PathBuf> {
        let relative = format!("{}.xml", name);
        if name.is_empty() || Path::new(&relative).is_absolute() {
            return None;
        }
        if Path::new(&relative)
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return None;
        }

        let full_path = self.base_path.join(&relative);
        if let Ok(canonical) = full_path.canonicalize()
            && let Some(base) = &self.canonical_base
        {
            return canonical.starts_with(base).then_some(canonical);
        }
        Some(full_path)
    }
}

impl TemplateLoader for FilesystemTemplateStore {
    fn load(&self, template: &TemplateRef) -> Result<String, LoadError> {
        let TemplateRef::Name(name) = template else {
            return Err(LoadError::NotFound(template.to_string()));
        };
        let path = self.resolve_path_safe(name).ok_or_else(|| {
            LoadError::NotFound(format!("{} (path traversal blocked)", name))
        })?;
        debug!("Loading template '{}' from {}", name, path.display());

        std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LoadError::NotFound(name.clone())
            } else {
                LoadError::LoadFailed {
                    template: name.clone(),
                    message: e.to_string(),
                }
            }
        })
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn name(&self) -> &'static str {
        "FilesystemTemplateStore"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_existing_template() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("web.layout.xml"), "<t t-name=\"web.layout\"/>").unwrap();

        let store = FilesystemTemplateStore::new(dir.path());
        let xml = store.load(&"web.layout".into()).unwrap();
        assert_eq!(xml, "<t t-name=\"web.layout\"/>");
    }

    #[test]
    fn test_nested_names_resolve_to_subdirectories() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("mail")).unwrap();
        fs::write(dir.path().join("mail").join("digest.xml"), "<t/>").unwrap();

        let store = FilesystemTemplateStore::new(dir.path());
        assert!(store.load(&"mail/digest".into()).is_ok());
    }

    #[test]
    fn test_missing_template() {
        let dir = tempdir().unwrap();
        let store = FilesystemTemplateStore::new(dir.path());
        let result = store.load(&"nope".into());
        assert!(matches!(result, Err(LoadError::NotFound(_))));
    }

    #[test]
    fn test_ids_are_not_served_from_disk() {
        let dir = tempdir().unwrap();
        let store = FilesystemTemplateStore::new(dir.path());
        assert!(matches!(
            store.load(&TemplateRef::Id(1)),
            Err(LoadError::NotFound(_))
        ));
    }

    #[test]
    fn test_blocks_path_traversal() {
        let dir = tempdir().unwrap();
        let store = FilesystemTemplateStore::new(dir.path());

        for name in ["../../../etc/passwd", "/etc/passwd", "foo/../../bar", ""] {
            assert!(store.load(&name.into()).is_err(), "'{}' was not blocked", name);
        }
    }

    #[test]
    fn test_invalidate_bumps_epoch() {
        let dir = tempdir().unwrap();
        let store = FilesystemTemplateStore::new(dir.path());
        let before = store.epoch();
        store.invalidate();
        assert!(store.epoch() > before);
    }
}
