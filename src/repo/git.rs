use std::collections::BTreeSet;
use std::path::Path;

use git2::{Commit, ErrorCode, ObjectType, Oid, Repository, Sort, Tree};
use tracing::{debug, info};

use super::{CommitRef, RepositoryHandle};
use crate::errors::ExtractError;

/// `git2`-backed repository handle.
///
/// Holds the source location until `clone_into` succeeds, then all lookups go
/// through the cloned repository.
pub struct GitRepository {
    url: String,
    repo: Option<Repository>,
}

impl GitRepository {
    /// Handle for the repository at `url` (a remote URL or a local path).
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            repo: None,
        }
    }

    /// The cloned repository, if `clone_into` has run.
    pub fn cloned(&self) -> Option<&Repository> {
        self.repo.as_ref()
    }

    fn repo(&self) -> Result<&Repository, ExtractError> {
        self.repo.as_ref().ok_or_else(|| ExtractError::Clone {
            url: self.url.clone(),
            destination: Default::default(),
            source: "repository has not been cloned yet".into(),
        })
    }

    fn find_commit(&self, commit: &CommitRef) -> Result<Commit<'_>, ExtractError> {
        let repo = self.repo()?;
        Oid::from_str(commit.sha())
            .and_then(|oid| repo.find_commit(oid))
            .map_err(|source| ExtractError::UnresolvableReference {
                reference: commit.sha().to_string(),
                source,
            })
    }

    fn tree_of(&self, commit: &CommitRef) -> Result<Tree<'_>, ExtractError> {
        self.find_commit(commit)?
            .tree()
            .map_err(|source| change_set_error(commit, source))
    }
}

fn change_set_error(commit: &CommitRef, source: git2::Error) -> ExtractError {
    ExtractError::ChangeSet {
        commit: commit.sha().to_string(),
        source,
    }
}

impl RepositoryHandle for GitRepository {
    fn location(&self) -> &str {
        &self.url
    }

    fn clone_into(&mut self, destination: &Path) -> Result<(), ExtractError> {
        info!("Cloning {} into {}", self.url, destination.display());
        let repo =
            Repository::clone(&self.url, destination).map_err(|source| ExtractError::Clone {
                url: self.url.clone(),
                destination: destination.to_path_buf(),
                source: source.into(),
            })?;
        self.repo = Some(repo);
        Ok(())
    }

    fn commit(&self, reference: &str) -> Result<CommitRef, ExtractError> {
        let repo = self.repo()?;
        let commit = repo
            .revparse_single(reference)
            .and_then(|object| object.peel_to_commit())
            .map_err(|source| ExtractError::UnresolvableReference {
                reference: reference.to_string(),
                source,
            })?;
        Ok(CommitRef::new(commit.id().to_string()))
    }

    fn changed_paths(&self, commit: &CommitRef) -> Result<BTreeSet<String>, ExtractError> {
        let repo = self.repo()?;
        let head = self.find_commit(commit)?;
        let tree = head.tree().map_err(|e| change_set_error(commit, e))?;

        // Root commits are compared against the empty tree.
        let parent_tree = if head.parent_count() == 0 {
            None
        } else {
            let parent = head.parent(0).map_err(|e| change_set_error(commit, e))?;
            Some(parent.tree().map_err(|e| change_set_error(commit, e))?)
        };

        let diff = repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)
            .map_err(|e| change_set_error(commit, e))?;

        let mut paths = BTreeSet::new();
        for delta in diff.deltas() {
            for file in [delta.old_file(), delta.new_file()] {
                if let Some(path) = file.path() {
                    paths.insert(path.to_string_lossy().replace('\\', "/"));
                }
            }
        }

        debug!(commit = commit.short(), count = paths.len(), "computed changed paths");
        Ok(paths)
    }

    fn tree_contains(&self, commit: &CommitRef, path: &str) -> Result<bool, ExtractError> {
        let tree = self.tree_of(commit)?;
        match tree.get_path(Path::new(path)) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(false),
            Err(e) => Err(change_set_error(commit, e)),
        }
    }

    fn show_blob(&self, commit: &CommitRef, path: &str) -> Result<Option<Vec<u8>>, ExtractError> {
        let repo = self.repo()?;
        let tree = self.tree_of(commit)?;

        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(ExtractError::extraction(path, commit.sha(), e)),
        };

        if entry.kind() != Some(ObjectType::Blob) {
            debug!(path, commit = commit.short(), "tree entry is not a blob");
            return Ok(None);
        }

        let blob = entry
            .to_object(repo)
            .and_then(|object| object.peel_to_blob())
            .map_err(|e| ExtractError::extraction(path, commit.sha(), e))?;

        Ok(Some(blob.content().to_vec()))
    }

    fn last_merge(&self) -> Result<Option<CommitRef>, ExtractError> {
        let repo = self.repo()?;
        let walk_error = |source: git2::Error| ExtractError::UnresolvableReference {
            reference: "HEAD".to_string(),
            source,
        };

        let mut walk = repo.revwalk().map_err(walk_error)?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME).map_err(walk_error)?;
        if let Err(e) = walk.push_head() {
            // Unborn HEAD has no history to search.
            if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound {
                return Ok(None);
            }
            return Err(walk_error(e));
        }

        for oid in walk {
            let oid = oid.map_err(walk_error)?;
            let commit = repo.find_commit(oid).map_err(walk_error)?;
            if commit.parent_count() > 1 {
                return Ok(Some(CommitRef::new(oid.to_string())));
            }
        }
        Ok(None)
    }

    fn first_parent(&self, commit: &CommitRef) -> Result<Option<CommitRef>, ExtractError> {
        let commit = self.find_commit(commit)?;
        Ok(commit
            .parent_id(0)
            .ok()
            .map(|oid| CommitRef::new(oid.to_string())))
    }
}
