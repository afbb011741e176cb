//! AST-backed code indexing.
//!
//! This module turns source text into [`Construct`]s using tree-sitter.
//! Each construct carries two fingerprints (interface and body) that the
//! detector compares across revisions.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────┐     ┌───────────────┐
//! │ Source at a     │────▶│ Indexers     │────▶│ FileIndex     │
//! │ revision        │     │ (Python,Java)│     │ (Constructs,  │
//! └─────────────────┘     └──────────────┘     │  Imports)     │
//!                                              └───────────────┘
//!                                                      │
//!                                                      ▼
//!                         ┌──────────────┐     ┌───────────────┐
//!                         │ Detector     │◀────│ ScanCache     │
//!                         └──────────────┘     └───────────────┘
//! ```
//!
//! # Adding a New Language
//!
//! 1. Create a new module in `src/analysis/languages/`
//! 2. Implement the `LanguageIndexer` trait
//! 3. Register the indexer in `languages/mod.rs`
//!
//! See `languages/python.rs` for a reference implementation.

mod cache;
mod construct;
pub mod fingerprint;
mod languages;
mod members;
mod traits;

pub use cache::{CacheKey, CacheStats, ScanCache};
pub use construct::{Construct, ConstructKind};
pub use languages::{
    get_indexer, get_indexer_by_id, get_indexer_for_path, register_indexers,
    registered_languages, JavaIndexer, PythonIndexer,
};
pub use members::{direct_members, is_direct, lookup, relative_id, Lookup};
pub use traits::{
    FileIndex, ImportBinding, ImportMap, LanguageIndexer, ParsedFile, SyntaxErrorInfo,
    TypeLocation,
};
