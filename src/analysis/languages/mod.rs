//! Language-specific indexer implementations.

mod java;
mod python;

pub use java::JavaIndexer;
pub use python::PythonIndexer;

use super::LanguageIndexer;
use once_cell::sync::OnceCell;

/// Static storage for Java indexer.
static JAVA_INDEXER: OnceCell<JavaIndexer> = OnceCell::new();

/// Static storage for Python indexer.
static PYTHON_INDEXER: OnceCell<PythonIndexer> = OnceCell::new();

/// Register all available language indexers.
///
/// This is idempotent - calling it multiple times is safe.
pub fn register_indexers() {
    JAVA_INDEXER.get_or_init(JavaIndexer::new);
    PYTHON_INDEXER.get_or_init(PythonIndexer::new);
}

/// Get an indexer for the given file extension (without dot).
///
/// Returns None if no indexer handles the extension.
pub fn get_indexer(ext: &str) -> Option<&'static dyn LanguageIndexer> {
    register_indexers();

    match ext {
        "java" => JAVA_INDEXER.get().map(|a| a as &'static dyn LanguageIndexer),
        "py" | "pyi" => PYTHON_INDEXER.get().map(|a| a as &'static dyn LanguageIndexer),
        _ => None,
    }
}

/// Get an indexer for a repository-relative path.
pub fn get_indexer_for_path(path: &str) -> Option<&'static dyn LanguageIndexer> {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = file_name.rsplit_once('.')?;
    get_indexer(ext)
}

/// Get an indexer by language ID.
pub fn get_indexer_by_id(lang_id: &str) -> Option<&'static dyn LanguageIndexer> {
    register_indexers();

    match lang_id {
        "java" => JAVA_INDEXER.get().map(|a| a as &'static dyn LanguageIndexer),
        "python" => PYTHON_INDEXER.get().map(|a| a as &'static dyn LanguageIndexer),
        _ => None,
    }
}

/// Get all registered language IDs.
pub fn registered_languages() -> Vec<String> {
    vec!["java".to_string(), "python".to_string()]
}
