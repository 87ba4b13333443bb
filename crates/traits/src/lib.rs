pub mod filesystem;
pub mod groups;
pub mod loader;

pub use filesystem::FilesystemTemplateStore;
pub use groups::{GroupChecker, StaticGroups};
pub use loader::{InMemoryTemplateStore, LoadError, TemplateLoader, TemplateRef};
