//! Repository access.
//!
//! `RepositoryHandle` is the seam between the extractor and version control;
//! `GitRepository` implements it on top of `git2`.

pub mod git;

#[cfg(test)]
pub(crate) mod fixtures;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use crate::errors::ExtractError;

pub use git::GitRepository;

/// Immutable reference to a resolved commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitRef {
    sha: String,
}

impl CommitRef {
    pub fn new(sha: impl Into<String>) -> Self {
        Self { sha: sha.into() }
    }

    /// Full hex digest.
    pub fn sha(&self) -> &str {
        &self.sha
    }

    /// Abbreviated digest for display.
    pub fn short(&self) -> &str {
        let end = self
            .sha
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.sha.len());
        &self.sha[..end]
    }
}

impl fmt::Display for CommitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sha)
    }
}

/// Operations the extractor needs from a version-control repository.
///
/// A handle is acquired once per run and cloned into the run's working area
/// before any commit lookup; every other method operates on that clone.
pub trait RepositoryHandle {
    /// Human-readable location of the source repository.
    fn location(&self) -> &str;

    /// Clone the source repository into `destination`.
    fn clone_into(&mut self, destination: &Path) -> Result<(), ExtractError>;

    /// Resolve a commit identifier in the clone.
    fn commit(&self, reference: &str) -> Result<CommitRef, ExtractError>;

    /// Paths whose content differs between `commit` and its first parent.
    fn changed_paths(&self, commit: &CommitRef) -> Result<BTreeSet<String>, ExtractError>;

    /// Whether `path` exists in the file tree of `commit`.
    fn tree_contains(&self, commit: &CommitRef, path: &str) -> Result<bool, ExtractError>;

    /// Exact bytes of `path` at `commit`, or `None` when the path is absent there.
    fn show_blob(&self, commit: &CommitRef, path: &str) -> Result<Option<Vec<u8>>, ExtractError>;

    /// Most recent merge commit reachable from HEAD.
    fn last_merge(&self) -> Result<Option<CommitRef>, ExtractError>;

    /// First parent of `commit`, `None` for a root commit.
    fn first_parent(&self, commit: &CommitRef) -> Result<Option<CommitRef>, ExtractError>;
}
