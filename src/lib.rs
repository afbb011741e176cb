//! codesub - code subscriptions.
//!
//! A subscription watches one construct (a function, method, class, field)
//! or a plain line range in a repository. Scanning two revisions tells you
//! which subscriptions changed, which ones moved and where to, and which
//! ones are gone.
//!
//! # Architecture
//!
//! - `analysis`: tree-sitter indexers that turn a file into fingerprinted
//!   constructs, plus the per-scan index cache
//! - `repo`: the repository collaborator (in-memory and snapshot directories)
//! - `detect`: subscriptions, the locate-and-classify detector, container
//!   diffs, inheritance propagation and the parallel scan runner
//! - `config`: YAML subscriptions file and scan policy
//! - `report`: output formatting (pretty, JSON)
//!
//! # Adding a New Language
//!
//! See `src/analysis/languages/` for examples. Implement the
//! `LanguageIndexer` trait and register it in `languages/mod.rs`.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod detect;
pub mod errors;
pub mod logging;
pub mod repo;
pub mod report;

pub use analysis::{
    register_indexers, Construct, ConstructKind, FileIndex, JavaIndexer, LanguageIndexer,
    PythonIndexer, ScanCache,
};
pub use config::{ScanPolicy, SubscriptionsFile};
pub use detect::{
    apply_proposal, create_line_subscription, create_semantic_subscription, ChangeType,
    Confidence, ContainerOptions, Outcome, Proposal, ScanResult, Scanner, Subscription, Trigger,
};
pub use errors::{IndexError, RepoError, ScanError};
pub use repo::{Hunk, MemoryRepository, Repository, SnapshotRepository};

/// Initialize all subsystems.
///
/// Call this once at startup.
pub fn init() {
    register_indexers();
}
