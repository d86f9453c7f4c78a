//! Source repositories for integration tests.

#![allow(dead_code)]

use git2::{Repository, Signature};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub struct SourceRepo {
    dir: TempDir,
    repo: Repository,
}

impl SourceRepo {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn url(&self) -> String {
        self.path().display().to_string()
    }

    /// Write (`Some`) or delete (`None`) files and commit on HEAD.
    pub fn commit(&self, changes: &[(&str, Option<&str>)], msg: &str) -> String {
        let mut index = self.repo.index().unwrap();
        for (path, content) in changes {
            let full = self.path().join(path);
            match content {
                Some(text) => {
                    if let Some(parent) = full.parent() {
                        fs::create_dir_all(parent).unwrap();
                    }
                    fs::write(&full, text).unwrap();
                    index.add_path(Path::new(path)).unwrap();
                }
                None => {
                    fs::remove_file(&full).unwrap();
                    index.remove_path(Path::new(path)).unwrap();
                }
            }
        }
        index.write().unwrap();
        let tree = self.repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("test", "test@test.com").unwrap();
        let parent = self.repo.head().ok().map(|h| h.peel_to_commit().unwrap());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        self.repo
            .commit(Some("HEAD"), &sig, &sig, msg, &tree, &parents)
            .unwrap()
            .to_string()
    }
}

/// Baseline has `x.py`; the target modifies it and adds `y.py`.
pub fn scenario() -> (SourceRepo, String, String) {
    let source = SourceRepo::new();
    let baseline = source.commit(&[("x.py", Some("x = 1\n"))], "baseline");
    let target = source.commit(
        &[
            ("x.py", Some("x = 2\n")),
            ("y.py", Some("import os  # TODO drop\n")),
        ],
        "target",
    );
    (source, target, baseline)
}
