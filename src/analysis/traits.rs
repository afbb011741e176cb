//! Core traits for language indexing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::fingerprint::normalize_whitespace;
use super::members::{direct_members, lookup, Lookup};
use super::{Construct, ConstructKind};

/// Holds a parsed tree-sitter tree and associated metadata.
///
/// Kept separate from [`FileIndex`] so one parse can feed several
/// extraction passes (constructs, imports, syntax errors).
pub struct ParsedFile {
    /// The tree-sitter parse tree.
    pub tree: tree_sitter::Tree,
    /// The original source code (kept for node text extraction).
    pub source: Vec<u8>,
    /// Repository-relative file path.
    pub path: String,
}

impl ParsedFile {
    /// Get the source code as a string slice.
    pub fn source_str(&self) -> &str {
        std::str::from_utf8(&self.source).unwrap_or("")
    }

    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: tree_sitter::Node) -> &str {
        node.utf8_text(&self.source).unwrap_or("")
    }

    /// First syntax error in the tree, if any.
    pub fn syntax_error(&self) -> Option<SyntaxErrorInfo> {
        let root = self.tree.root_node();
        if !root.has_error() {
            return None;
        }
        let node = first_error_node(root).unwrap_or(root);
        let message = if node.is_missing() {
            format!("missing `{}`", node.kind())
        } else {
            let snippet = self.node_text(node).lines().next().unwrap_or("");
            format!("unexpected `{}`", normalize_whitespace(snippet))
        };
        Some(SyntaxErrorInfo {
            line: node.start_position().row + 1,
            message,
        })
    }
}

fn first_error_node(node: tree_sitter::Node) -> Option<tree_sitter::Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() {
            if let Some(found) = first_error_node(child) {
                return Some(found);
            }
        }
    }
    None
}

/// Location and description of the first syntax error in a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxErrorInfo {
    pub line: usize,
    pub message: String,
}

/// What a local import name refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportBinding {
    /// Module or package as written (Python relative imports keep their dots).
    pub module: String,
    /// Imported member name; `None` when the local name binds the module itself.
    pub name: Option<String>,
}

impl ImportBinding {
    pub fn module(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: None,
        }
    }

    pub fn member(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: Some(name.into()),
        }
    }
}

/// Local name -> import binding. Wildcard imports contribute nothing.
pub type ImportMap = BTreeMap<String, ImportBinding>;

/// Everything an indexer extracts from one file at one revision.
#[derive(Debug, Clone)]
pub struct FileIndex {
    pub path: String,
    pub language: String,
    /// Constructs in source order, nested containers included.
    pub constructs: Vec<Construct>,
    pub imports: ImportMap,
    pub syntax_error: Option<SyntaxErrorInfo>,
}

impl FileIndex {
    /// Resolve a qualname (optionally restricted to a kind).
    pub fn lookup(&self, qualname: &str, kind: Option<ConstructKind>) -> Lookup {
        lookup(&self.constructs, qualname, kind)
    }

    /// Resolve a qualname among type constructs only.
    pub fn lookup_type(&self, qualname: &str) -> Lookup {
        let matches: Vec<_> = self
            .constructs
            .iter()
            .filter(|c| c.qualname == qualname && c.kind.is_type())
            .cloned()
            .collect();
        Lookup::from_matches(matches)
    }

    pub fn has_parse_error(&self) -> bool {
        self.syntax_error.is_some()
    }
}

/// A candidate `(path, qualname)` location for an unresolved base name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeLocation {
    pub path: String,
    pub qualname: String,
}

impl TypeLocation {
    pub fn new(path: impl Into<String>, qualname: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            qualname: qualname.into(),
        }
    }
}

/// Language-specific indexer.
///
/// Each analyzed language implements this trait; the registry in
/// `languages/mod.rs` maps file extensions to implementations. Nothing
/// downstream (detector, resolver, container differ) matches on a
/// concrete language.
///
/// # Thread Safety
///
/// tree_sitter::Parser is not Sync, so implementations create parsers
/// per call.
pub trait LanguageIndexer: Send + Sync {
    /// Returns the language identifier (e.g., "python", "java").
    fn language_id(&self) -> &'static str;

    /// Returns file extensions this indexer handles (without dot).
    fn file_extensions(&self) -> &'static [&'static str];

    /// Kinds eligible for container (all-members) tracking.
    fn container_kinds(&self) -> &'static [ConstructKind];

    /// Parse and extract constructs, imports and the first syntax error.
    fn analyze(&self, source: &str, path: &str) -> anyhow::Result<FileIndex>;

    /// Whether a name is private by naming convention. Languages without
    /// such a convention keep the default.
    fn is_private_name(&self, _name: &str) -> bool {
        false
    }

    /// Identity used to decide whether a subclass member overrides an
    /// inherited one. `None` means the member is never inherited.
    fn override_key(&self, relative_id: &str, _member: &Construct) -> Option<String> {
        Some(relative_id.to_string())
    }

    /// Candidate definitions for a name bound by an import.
    ///
    /// `rest` holds the dotted segments written after the imported name
    /// (`models.User` imported as `models` gives rest `["User"]`).
    fn import_targets(
        &self,
        binding: &ImportBinding,
        rest: &[&str],
        from_path: &str,
        files: &[String],
    ) -> Vec<TypeLocation>;

    /// Candidate definitions for a base name no import covers
    /// (same-package types, fully qualified references).
    fn unimported_targets(
        &self,
        _name: &str,
        _from_path: &str,
        _files: &[String],
    ) -> Vec<TypeLocation> {
        Vec::new()
    }

    /// Ordered construct extraction.
    fn index_file(&self, source: &str, path: &str) -> anyhow::Result<Vec<Construct>> {
        Ok(self.analyze(source, path)?.constructs)
    }

    /// Find a construct by qualname. Returns `None` on zero or multiple matches.
    fn find_construct(
        &self,
        source: &str,
        path: &str,
        qualname: &str,
        kind: Option<ConstructKind>,
    ) -> anyhow::Result<Option<Construct>> {
        let index = self.analyze(source, path)?;
        Ok(index.lookup(qualname, kind).into_unique())
    }

    /// Direct members of a container (nested containers' members excluded).
    fn get_container_members(
        &self,
        source: &str,
        path: &str,
        container_qualname: &str,
        include_private: bool,
    ) -> anyhow::Result<Vec<Construct>> {
        let index = self.analyze(source, path)?;
        Ok(self.members_of(&index.constructs, container_qualname, include_private))
    }

    /// Map of local import names to their bindings.
    fn extract_imports(&self, source: &str) -> anyhow::Result<ImportMap> {
        Ok(self.analyze(source, "")?.imports)
    }

    /// Direct members from an already indexed construct list.
    ///
    /// `include_private = false` only drops names private by naming
    /// convention; access modifiers never hide a member here.
    fn members_of(
        &self,
        constructs: &[Construct],
        container_qualname: &str,
        include_private: bool,
    ) -> Vec<Construct> {
        direct_members(constructs, container_qualname)
            .into_iter()
            .filter(|m| include_private || !self.is_private_name(m.simple_name()))
            .collect()
    }

    /// Check if this indexer handles the given file extension.
    fn handles_extension(&self, ext: &str) -> bool {
        self.file_extensions().contains(&ext)
    }

    /// Check if a kind is container-eligible for this language.
    fn is_container_kind(&self, kind: ConstructKind) -> bool {
        self.container_kinds().contains(&kind)
    }
}
