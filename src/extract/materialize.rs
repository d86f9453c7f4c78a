use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::errors::ExtractError;
use crate::repo::{CommitRef, RepositoryHandle};

/// The `a/` and `b/` trees of a run whose extraction completed.
///
/// Only the extractor can build this, and only after every file was written,
/// so holding one means both trees are complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedTrees {
    target_root: PathBuf,
    baseline_root: PathBuf,
    target_files: Vec<String>,
    baseline_files: Vec<String>,
}

impl MaterializedTrees {
    pub(crate) fn new(
        target_root: PathBuf,
        baseline_root: PathBuf,
        target_files: Vec<String>,
        baseline_files: Vec<String>,
    ) -> Self {
        Self {
            target_root,
            baseline_root,
            target_files,
            baseline_files,
        }
    }

    /// Directory holding target-commit content (`a/`).
    pub fn target_root(&self) -> &Path {
        &self.target_root
    }

    /// Directory holding baseline-commit content (`b/`).
    pub fn baseline_root(&self) -> &Path {
        &self.baseline_root
    }

    pub fn target_files(&self) -> &[String] {
        &self.target_files
    }

    pub fn baseline_files(&self) -> &[String] {
        &self.baseline_files
    }
}

/// Write `paths` as they exist at `commit` under `dest`, in set order.
///
/// `on_file` runs before each file is written. A path absent from the commit's
/// tree is written as an empty file. Any read or write failure aborts.
pub(crate) fn pull_files<H, F>(
    handle: &H,
    commit: &CommitRef,
    paths: &BTreeSet<String>,
    dest: &Path,
    on_file: &mut F,
) -> Result<Vec<String>, ExtractError>
where
    H: RepositoryHandle + ?Sized,
    F: FnMut(&str, &CommitRef),
{
    let mut written = Vec::with_capacity(paths.len());

    for path in paths {
        let relative = safe_relative(path)
            .ok_or_else(|| ExtractError::extraction(path, commit.sha(), "path escapes the tree"))?;

        let contents = match handle.show_blob(commit, path)? {
            Some(bytes) => bytes,
            None => {
                debug!(path, commit = commit.short(), "path absent at commit, writing empty file");
                Vec::new()
            }
        };

        on_file(path, commit);

        let file = dest.join(&relative);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ExtractError::extraction(path, commit.sha(), e))?;
        }
        fs::write(&file, &contents).map_err(|e| ExtractError::extraction(path, commit.sha(), e))?;

        written.push(path.clone());
    }

    Ok(written)
}

/// Repository-relative path as a filesystem path, refusing anything that could
/// land outside the destination tree.
fn safe_relative(path: &str) -> Option<PathBuf> {
    let candidate = Path::new(path);
    let mut out = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Files under `root` as sorted `/`-separated relative paths.
pub fn list_tree(root: &Path) -> std::io::Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root) {
            let parts: Vec<_> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            files.push(parts.join("/"));
        }
    }
    files.sort();
    Ok(files)
}
