//! Repository change extraction.
//!
//! Given a repository handle and two commit references, the extractor clones
//! the repository into `<root>/repo`, computes the change set, and writes the
//! historical content of every selected path into `<root>/a` (target) and
//! `<root>/b` (baseline):
//!
//! ```text
//! <root>/
//!   repo/   clone of the source repository
//!   a/      target-commit content of changed(target)
//!   b/      baseline-commit content of the baseline selection
//! ```

pub mod change_set;
pub mod materialize;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::ExtractError;
use crate::repo::{CommitRef, RepositoryHandle};

pub use change_set::{BaselineSelection, ChangeSet};
pub use materialize::{MaterializedTrees, list_tree};

/// Which pair of commits a run compares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revisions {
    /// Both references given.
    Explicit { target: String, baseline: String },
    /// Target given; the baseline is its first parent.
    Target(String),
    /// The most recent merge reachable from HEAD, against its first parent.
    LastMerge,
}

impl Revisions {
    /// Build from optional command-line references. A baseline without a
    /// target compares `HEAD` against it.
    pub fn from_refs(target: Option<String>, baseline: Option<String>) -> Self {
        match (target, baseline) {
            (Some(target), Some(baseline)) => Revisions::Explicit { target, baseline },
            (Some(target), None) => Revisions::Target(target),
            (None, Some(baseline)) => Revisions::Explicit {
                target: "HEAD".to_string(),
                baseline,
            },
            (None, None) => Revisions::LastMerge,
        }
    }

    fn resolve<H>(&self, handle: &H) -> Result<(CommitRef, CommitRef), ExtractError>
    where
        H: RepositoryHandle + ?Sized,
    {
        let target = match self {
            Revisions::Explicit { target, .. } | Revisions::Target(target) => {
                handle.commit(target)?
            }
            Revisions::LastMerge => handle.last_merge()?.ok_or_else(|| {
                ExtractError::unresolvable("last merge", "no merge commit reachable from HEAD")
            })?,
        };
        let baseline = match self {
            Revisions::Explicit { baseline, .. } => handle.commit(baseline)?,
            Revisions::Target(_) | Revisions::LastMerge => {
                handle.first_parent(&target)?.ok_or_else(|| {
                    ExtractError::unresolvable(
                        format!("{}^1", target.short()),
                        "commit has no parent",
                    )
                })?
            }
        };
        Ok((target, baseline))
    }
}

impl fmt::Display for Revisions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Revisions::Explicit { target, baseline } => write!(f, "{} against {}", target, baseline),
            Revisions::Target(target) => write!(f, "{} against its first parent", target),
            Revisions::LastMerge => write!(f, "last merge against its first parent"),
        }
    }
}

/// On-disk layout of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn clone_path(&self) -> PathBuf {
        self.root.join("repo")
    }

    pub fn target_tree(&self) -> PathBuf {
        self.root.join("a")
    }

    pub fn baseline_tree(&self) -> PathBuf {
        self.root.join("b")
    }
}

/// Result of a completed extraction.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub target: CommitRef,
    pub baseline: CommitRef,
    pub change_set: ChangeSet,
    pub trees: MaterializedTrees,
}

pub struct ChangeExtractor {
    layout: RunLayout,
    selection: BaselineSelection,
}

impl ChangeExtractor {
    pub fn new(destination_root: impl Into<PathBuf>, selection: BaselineSelection) -> Self {
        Self {
            layout: RunLayout::new(destination_root),
            selection,
        }
    }

    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    pub fn selection(&self) -> BaselineSelection {
        self.selection
    }

    /// Clone the repository and resolve both references in the clone.
    pub fn prepare<H>(
        &self,
        handle: &mut H,
        target_ref: &str,
        baseline_ref: &str,
    ) -> Result<(CommitRef, CommitRef), ExtractError>
    where
        H: RepositoryHandle + ?Sized,
    {
        let revisions = Revisions::Explicit {
            target: target_ref.to_string(),
            baseline: baseline_ref.to_string(),
        };
        self.prepare_revisions(handle, &revisions)
    }

    /// Clone the repository and resolve `revisions` in the clone.
    ///
    /// The destination must not already hold a `repo/`, `a/` or `b/`; such a
    /// destination is refused before anything is written. If the clone fails
    /// or either commit does not resolve, the clone and a freshly created
    /// destination root are removed again.
    pub fn prepare_revisions<H>(
        &self,
        handle: &mut H,
        revisions: &Revisions,
    ) -> Result<(CommitRef, CommitRef), ExtractError>
    where
        H: RepositoryHandle + ?Sized,
    {
        let clone_path = self.layout.clone_path();
        for dir in [
            &clone_path,
            &self.layout.target_tree(),
            &self.layout.baseline_tree(),
        ] {
            if dir.exists() {
                return Err(ExtractError::Clone {
                    url: handle.location().to_string(),
                    destination: dir.clone(),
                    source: "destination already holds the output of another run".into(),
                });
            }
        }
        let created_root = !self.layout.root().exists();
        fs::create_dir_all(self.layout.root()).map_err(|e| ExtractError::Clone {
            url: handle.location().to_string(),
            destination: clone_path.clone(),
            source: e.into(),
        })?;

        let resolved = handle
            .clone_into(&clone_path)
            .and_then(|()| revisions.resolve(handle));

        match resolved {
            Ok((target, baseline)) => {
                info!(
                    "Resolved target {} and baseline {} ({})",
                    target.short(),
                    baseline.short(),
                    revisions
                );
                Ok((target, baseline))
            }
            Err(e) => {
                self.discard(&clone_path, created_root);
                Err(e)
            }
        }
    }

    /// Remove what a failed `prepare` left behind: the clone, which did not
    /// exist before this run, and the run root if this run created it.
    fn discard(&self, clone_path: &Path, created_root: bool) {
        if clone_path.exists()
            && let Err(e) = fs::remove_dir_all(clone_path)
        {
            debug!(error = %e, "failed to remove clone after failed prepare");
        }
        if created_root && let Err(e) = fs::remove_dir(self.layout.root()) {
            debug!(error = %e, "failed to remove run root after failed prepare");
        }
    }

    pub fn change_set<H>(
        &self,
        handle: &H,
        target: &CommitRef,
        baseline: &CommitRef,
    ) -> Result<ChangeSet, ExtractError>
    where
        H: RepositoryHandle + ?Sized,
    {
        let change_set = ChangeSet::compute(handle, target, baseline, self.selection)?;
        info!(
            "Change set: {} target file(s), {} baseline file(s) ({} selection)",
            change_set.target.len(),
            change_set.baseline.len(),
            self.selection
        );
        Ok(change_set)
    }

    /// Write both trees. `on_file` is called for every file before it is written.
    ///
    /// Both `a/` and `b/` exist afterwards even when their sets are empty.
    pub fn materialize<H, F>(
        &self,
        handle: &H,
        target: &CommitRef,
        baseline: &CommitRef,
        change_set: &ChangeSet,
        mut on_file: F,
    ) -> Result<MaterializedTrees, ExtractError>
    where
        H: RepositoryHandle + ?Sized,
        F: FnMut(&str, &CommitRef),
    {
        let a_path = self.layout.target_tree();
        let b_path = self.layout.baseline_tree();
        for (dir, commit) in [(&a_path, target), (&b_path, baseline)] {
            fs::create_dir_all(dir)
                .map_err(|e| ExtractError::extraction(dir.display().to_string(), commit.sha(), e))?;
        }

        let target_files =
            materialize::pull_files(handle, target, &change_set.target, &a_path, &mut on_file)?;
        let baseline_files =
            materialize::pull_files(handle, baseline, &change_set.baseline, &b_path, &mut on_file)?;

        Ok(MaterializedTrees::new(
            a_path,
            b_path,
            target_files,
            baseline_files,
        ))
    }

    /// Clone, resolve, compute the change set and materialize both trees.
    pub fn extract<H>(
        &self,
        handle: &mut H,
        target_ref: &str,
        baseline_ref: &str,
    ) -> Result<Extraction, ExtractError>
    where
        H: RepositoryHandle + ?Sized,
    {
        let (target, baseline) = self.prepare(handle, target_ref, baseline_ref)?;
        let change_set = self.change_set(handle, &target, &baseline)?;
        let trees = self.materialize(handle, &target, &baseline, &change_set, |_, _| {})?;
        Ok(Extraction {
            target,
            baseline,
            change_set,
            trees,
        })
    }
}
