//! Typed errors at the repository and scan boundaries.

use thiserror::Error;

/// Failures reported by a [`crate::repo::Repository`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepoError {
    #[error("invalid revision: {revision}")]
    InvalidRevision { revision: String },

    #[error("{path} not found at revision {revision}")]
    NotFound { revision: String, path: String },

    #[error("failed to read {path} at revision {revision}: {message}")]
    Io {
        revision: String,
        path: String,
        message: String,
    },
}

impl RepoError {
    pub fn invalid_revision(revision: impl Into<String>) -> Self {
        Self::InvalidRevision {
            revision: revision.into(),
        }
    }

    pub fn not_found(revision: impl Into<String>, path: impl Into<String>) -> Self {
        Self::NotFound {
            revision: revision.into(),
            path: path.into(),
        }
    }

    pub fn io(
        revision: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Io {
            revision: revision.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Scan-fatal failures. Everything else is reported per subscription.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("cannot resolve {which} reference '{reference}': {source}")]
    Revision {
        which: &'static str,
        reference: String,
        source: RepoError,
    },
}

/// Failure to produce a file index at one revision.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error("failed to index {path}: {message}")]
    Analyze { path: String, message: String },
}

impl IndexError {
    pub fn analyze(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Analyze {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Repo(e) if e.is_not_found())
    }
}
