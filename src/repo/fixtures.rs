//! Throwaway git repositories for unit tests.

use git2::{IndexAddOption, Repository, Signature};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub(crate) struct TestRepo {
    dir: TempDir,
    repo: Repository,
}

impl TestRepo {
    pub(crate) fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "test").unwrap();
        config.set_str("user.email", "test@test.com").unwrap();
        drop(config);
        Self { dir, repo }
    }

    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn url(&self) -> String {
        self.path().display().to_string()
    }

    /// Apply text changes (`None` deletes) and commit them on HEAD.
    pub(crate) fn commit(&self, changes: &[(&str, Option<&str>)], msg: &str) -> String {
        let changes: Vec<(&str, Option<&[u8]>)> = changes
            .iter()
            .map(|(path, content)| (*path, content.map(str::as_bytes)))
            .collect();
        self.commit_bytes(&changes, msg)
    }

    pub(crate) fn commit_bytes(&self, changes: &[(&str, Option<&[u8]>)], msg: &str) -> String {
        let mut index = self.repo.index().unwrap();
        for (path, content) in changes {
            let full = self.path().join(path);
            match content {
                Some(bytes) => {
                    if let Some(parent) = full.parent() {
                        fs::create_dir_all(parent).unwrap();
                    }
                    fs::write(&full, bytes).unwrap();
                }
                None => {
                    fs::remove_file(&full).unwrap();
                    index.remove_path(Path::new(path)).unwrap();
                }
            }
        }
        index
            .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        self.commit_tree(tree_id, msg, None)
    }

    /// Commit top-level files on top of `base` without moving HEAD.
    pub(crate) fn side_commit(&self, base: &str, changes: &[(&str, Option<&str>)], msg: &str) -> String {
        let base_commit = self
            .repo
            .find_commit(git2::Oid::from_str(base).unwrap())
            .unwrap();
        let base_tree = base_commit.tree().unwrap();
        let mut builder = self.repo.treebuilder(Some(&base_tree)).unwrap();
        for (name, content) in changes {
            match content {
                Some(text) => {
                    let blob = self.repo.blob(text.as_bytes()).unwrap();
                    builder.insert(*name, blob, 0o100644).unwrap();
                }
                None => builder.remove(*name).unwrap(),
            }
        }
        let tree = self.repo.find_tree(builder.write().unwrap()).unwrap();
        let sig = Signature::now("test", "test@test.com").unwrap();
        self.repo
            .commit(None, &sig, &sig, msg, &tree, &[&base_commit])
            .unwrap()
            .to_string()
    }

    /// Merge commit on HEAD with `other` as second parent, keeping HEAD's tree.
    pub(crate) fn merge(&self, other: &str, msg: &str) -> String {
        let head_tree = self.repo.head().unwrap().peel_to_tree().unwrap().id();
        self.commit_tree(head_tree, msg, Some(other))
    }

    fn commit_tree(&self, tree_id: git2::Oid, msg: &str, second_parent: Option<&str>) -> String {
        let tree = self.repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("test", "test@test.com").unwrap();
        let mut parents = Vec::new();
        if let Ok(head) = self.repo.head() {
            parents.push(head.peel_to_commit().unwrap());
        }
        if let Some(other) = second_parent {
            parents.push(
                self.repo
                    .find_commit(git2::Oid::from_str(other).unwrap())
                    .unwrap(),
            );
        }
        let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();
        self.repo
            .commit(Some("HEAD"), &sig, &sig, msg, &tree, &parent_refs)
            .unwrap()
            .to_string()
    }
}
