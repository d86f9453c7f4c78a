//! Lint engine seam and report model.
//!
//! The pipeline hands the materialized trees to a `LintEngine`, which reports
//! each file it lints through a `LintSession` and returns a `LintReport`.

pub mod command;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::ObserverNotificationError;
use crate::extract::MaterializedTrees;
use crate::process::ProcessTracker;

pub use command::CommandLinter;

/// One finding at a position in a file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Finding {
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl Finding {
    pub fn new(line: u32, column: u32, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

/// Findings per linted file, keyed by repository-relative path.
///
/// A file that was linted without findings is present with an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintReport {
    pub errors: BTreeMap<String, Vec<Finding>>,
}

impl LintReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `path` as linted, with no findings yet.
    pub fn record_file(&mut self, path: &str) {
        self.errors.entry(path.to_string()).or_default();
    }

    pub fn add(&mut self, path: &str, finding: Finding) {
        self.errors.entry(path.to_string()).or_default().push(finding);
    }

    pub fn file_count(&self) -> usize {
        self.errors.len()
    }

    pub fn files_with_findings(&self) -> impl Iterator<Item = (&str, &[Finding])> {
        self.errors
            .iter()
            .filter(|(_, findings)| !findings.is_empty())
            .map(|(path, findings)| (path.as_str(), findings.as_slice()))
    }

    pub fn total_findings(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.total_findings() == 0
    }
}

/// The lint stage's view of the tracker: it may only report linted files.
pub struct LintSession<'a> {
    tracker: &'a mut ProcessTracker,
    notification_errors: &'a mut Vec<ObserverNotificationError>,
}

impl<'a> LintSession<'a> {
    pub(crate) fn new(
        tracker: &'a mut ProcessTracker,
        notification_errors: &'a mut Vec<ObserverNotificationError>,
    ) -> Self {
        Self {
            tracker,
            notification_errors,
        }
    }

    /// Announce that `linter` is linting `path`.
    pub fn lint_file(&mut self, linter: &str, path: &str) {
        if let Err(e) = self.tracker.lint_file(linter, path) {
            self.notification_errors.push(e);
        }
    }
}

/// Consumes the materialized trees and produces a report.
pub trait LintEngine {
    fn name(&self) -> &str;

    fn lint(
        &mut self,
        trees: &MaterializedTrees,
        session: &mut LintSession<'_>,
    ) -> Result<LintReport>;
}
