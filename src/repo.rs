//! Version-control collaborator: file contents per revision and raw line diffs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use similar::{DiffTag, TextDiff};
use walkdir::WalkDir;

use crate::errors::RepoError;

/// One changed region of a line diff, without context lines.
///
/// Lines are 1-based. For a pure insertion (`old_count == 0`) `old_start`
/// is the old line the new text is inserted before; likewise `new_start`
/// for a pure deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
}

impl Hunk {
    /// Last old line touched (inclusive); `None` for pure insertions.
    pub fn old_end(&self) -> Option<usize> {
        (self.old_count > 0).then(|| self.old_start + self.old_count - 1)
    }

    /// Net line delta this hunk applies to everything below it.
    pub fn delta(&self) -> isize {
        self.new_count as isize - self.old_count as isize
    }
}

/// Read access to source snapshots.
pub trait Repository: Send + Sync {
    /// Map a user-supplied reference to a canonical revision id.
    fn resolve_revision(&self, reference: &str) -> Result<String, RepoError>;

    /// File contents as ordered lines. `RepoError::NotFound` if absent.
    fn show_file(&self, revision: &str, path: &str) -> Result<Vec<String>, RepoError>;

    /// All repository-relative paths (`/`-separated) at a revision, sorted.
    fn list_files(&self, revision: &str) -> Result<Vec<String>, RepoError>;

    /// Line hunks between two revisions of one file. A file missing on
    /// either side diffs against empty content.
    fn diff_hunks(&self, base: &str, target: &str, path: &str) -> Result<Vec<Hunk>, RepoError> {
        let old = lines_or_empty(self.show_file(base, path))?;
        let new = lines_or_empty(self.show_file(target, path))?;
        Ok(diff_lines(&old, &new))
    }
}

fn lines_or_empty(result: Result<Vec<String>, RepoError>) -> Result<Vec<String>, RepoError> {
    match result {
        Err(e) if e.is_not_found() => Ok(Vec::new()),
        other => other,
    }
}

/// Zero-context hunks between two line lists.
pub fn diff_lines(old: &[String], new: &[String]) -> Vec<Hunk> {
    let old: Vec<&str> = old.iter().map(String::as_str).collect();
    let new: Vec<&str> = new.iter().map(String::as_str).collect();
    let diff = TextDiff::from_slices(&old, &new);

    let mut hunks: Vec<Hunk> = Vec::new();
    for op in diff.ops() {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        if tag == DiffTag::Equal {
            continue;
        }
        let hunk = Hunk {
            old_start: old_range.start + 1,
            old_count: old_range.len(),
            new_start: new_range.start + 1,
            new_count: new_range.len(),
        };
        // Adjacent ops (delete followed by insert) form one hunk.
        match hunks.last_mut() {
            Some(last)
                if last.old_start + last.old_count == hunk.old_start
                    && last.new_start + last.new_count == hunk.new_start =>
            {
                last.old_count += hunk.old_count;
                last.new_count += hunk.new_count;
            }
            _ => hunks.push(hunk),
        }
    }
    hunks
}

fn split_lines(content: &str) -> Vec<String> {
    content.lines().map(str::to_string).collect()
}

/// Files of one revision: path -> content.
pub type RevisionFiles = BTreeMap<String, String>;

/// Revisions held in memory. Used by tests and embedders.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    revisions: BTreeMap<String, RevisionFiles>,
    aliases: BTreeMap<String, String>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_revision<I, P, C>(&mut self, revision: impl Into<String>, files: I)
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        let files = files
            .into_iter()
            .map(|(p, c)| (p.into(), c.into()))
            .collect();
        self.revisions.insert(revision.into(), files);
    }

    /// Copy revision `from` to `to` and return the copy for editing.
    pub fn fork(&mut self, from: &str, to: impl Into<String>) -> Result<&mut RevisionFiles, RepoError> {
        let files = self
            .revisions
            .get(from)
            .cloned()
            .ok_or_else(|| RepoError::invalid_revision(from))?;
        let to = to.into();
        self.revisions.insert(to.clone(), files);
        self.revisions
            .get_mut(&to)
            .ok_or_else(|| RepoError::invalid_revision(to))
    }

    /// Make `name` resolve to `revision` (e.g. `HEAD`).
    pub fn set_alias(&mut self, name: impl Into<String>, revision: impl Into<String>) {
        self.aliases.insert(name.into(), revision.into());
    }

    fn files(&self, revision: &str) -> Result<&RevisionFiles, RepoError> {
        self.revisions
            .get(revision)
            .ok_or_else(|| RepoError::invalid_revision(revision))
    }
}

impl Repository for MemoryRepository {
    fn resolve_revision(&self, reference: &str) -> Result<String, RepoError> {
        let revision = self
            .aliases
            .get(reference)
            .map(String::as_str)
            .unwrap_or(reference);
        if self.revisions.contains_key(revision) {
            Ok(revision.to_string())
        } else {
            Err(RepoError::invalid_revision(reference))
        }
    }

    fn show_file(&self, revision: &str, path: &str) -> Result<Vec<String>, RepoError> {
        self.files(revision)?
            .get(path)
            .map(|content| split_lines(content))
            .ok_or_else(|| RepoError::not_found(revision, path))
    }

    fn list_files(&self, revision: &str) -> Result<Vec<String>, RepoError> {
        Ok(self.files(revision)?.keys().cloned().collect())
    }
}

/// Each revision is a directory directly under `root` (`root/v1/...`).
#[derive(Debug, Clone)]
pub struct SnapshotRepository {
    root: PathBuf,
}

impl SnapshotRepository {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn revision_dir(&self, revision: &str) -> Result<PathBuf, RepoError> {
        let mut components = Path::new(revision).components();
        let valid = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        let dir = self.root.join(revision);
        if valid && dir.is_dir() {
            Ok(dir)
        } else {
            Err(RepoError::invalid_revision(revision))
        }
    }
}

impl Repository for SnapshotRepository {
    fn resolve_revision(&self, reference: &str) -> Result<String, RepoError> {
        self.revision_dir(reference)?;
        Ok(reference.to_string())
    }

    fn show_file(&self, revision: &str, path: &str) -> Result<Vec<String>, RepoError> {
        let dir = self.revision_dir(revision)?;
        if Path::new(path)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(RepoError::not_found(revision, path));
        }
        match fs::read_to_string(dir.join(path)) {
            Ok(content) => Ok(split_lines(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RepoError::not_found(revision, path))
            }
            Err(e) => Err(RepoError::io(revision, path, e.to_string())),
        }
    }

    fn list_files(&self, revision: &str) -> Result<Vec<String>, RepoError> {
        let dir = self.revision_dir(revision)?;
        let mut files = Vec::new();

        for entry in WalkDir::new(&dir)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| {
                // Skip hidden directories below the snapshot root
                !(e.depth() > 0
                    && e.file_type().is_dir()
                    && e.file_name().to_string_lossy().starts_with('.'))
            })
        {
            let entry = entry.map_err(|e| RepoError::io(revision, ".", e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(&dir) {
                let rel: Vec<_> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().to_string())
                    .collect();
                files.push(rel.join("/"));
            }
        }

        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn lines(text: &str) -> Vec<String> {
        split_lines(text)
    }

    #[test]
    fn test_diff_lines_replace_and_insert() {
        let old = lines("a\nb\nc\nd\n");
        let new = lines("a\nB\nc\nx\ny\nd\n");
        assert_eq!(
            diff_lines(&old, &new),
            vec![
                Hunk {
                    old_start: 2,
                    old_count: 1,
                    new_start: 2,
                    new_count: 1
                },
                Hunk {
                    old_start: 4,
                    old_count: 0,
                    new_start: 4,
                    new_count: 2
                },
            ]
        );
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let text = lines("a\nb\n");
        assert!(diff_lines(&text, &text).is_empty());
    }

    #[test]
    fn test_hunk_helpers() {
        let insert = Hunk {
            old_start: 3,
            old_count: 0,
            new_start: 3,
            new_count: 2,
        };
        assert_eq!(insert.old_end(), None);
        assert_eq!(insert.delta(), 2);
    }

    #[test]
    fn test_memory_repository() {
        let mut repo = MemoryRepository::new();
        repo.insert_revision("v1", [("a.py", "x = 1\n")]);
        repo.fork("v1", "v2")
            .unwrap()
            .insert("b.py".to_string(), "y = 2\n".to_string());
        repo.set_alias("HEAD", "v2");

        assert_eq!(repo.resolve_revision("HEAD").unwrap(), "v2");
        assert!(matches!(
            repo.resolve_revision("v9"),
            Err(RepoError::InvalidRevision { .. })
        ));
        assert_eq!(repo.list_files("v2").unwrap(), vec!["a.py", "b.py"]);
        assert!(repo.show_file("v1", "b.py").unwrap_err().is_not_found());

        let hunks = repo.diff_hunks("v1", "v2", "b.py").unwrap();
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].new_count, 1);
    }

    #[test]
    fn test_snapshot_repository() {
        let temp = TempDir::new().unwrap();
        let v1 = temp.path().join("v1");
        fs::create_dir_all(v1.join("pkg")).unwrap();
        fs::create_dir_all(v1.join(".git")).unwrap();
        fs::write(v1.join("pkg/models.py"), "class User:\n    pass\n").unwrap();
        fs::write(v1.join(".git/HEAD"), "ref").unwrap();

        let repo = SnapshotRepository::new(temp.path());
        assert_eq!(repo.resolve_revision("v1").unwrap(), "v1");
        assert!(repo.resolve_revision("../v1").is_err());
        assert!(repo.resolve_revision("missing").is_err());
        assert_eq!(repo.list_files("v1").unwrap(), vec!["pkg/models.py"]);
        assert_eq!(
            repo.show_file("v1", "pkg/models.py").unwrap(),
            vec!["class User:", "    pass"]
        );
        assert!(repo.show_file("v1", "nope.py").unwrap_err().is_not_found());
        assert!(repo.show_file("v1", "../v1/pkg/models.py").unwrap_err().is_not_found());
    }
}
