use anyhow::Result;
use std::path::Path;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::observer::ProcessObserver;
use super::state::ProcessState;
use crate::lint::LintReport;
use crate::repo::CommitRef;

/// Writes every lifecycle event to the `tracing` subscriber.
#[derive(Debug, Default, Clone)]
pub struct LogObserver {
    location: Option<String>,
}

impl LogObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Include the source repository location in the clone message.
    pub fn with_location(location: impl Into<String>) -> Self {
        Self {
            location: Some(location.into()),
        }
    }
}

impl ProcessObserver for LogObserver {
    fn name(&self) -> &str {
        "log"
    }

    fn started(&mut self, run_id: Uuid) -> Result<()> {
        info!(%run_id, "Starting linting process with id: {}", run_id);
        Ok(())
    }

    fn clone_repo(&mut self, run_id: Uuid, clone_path: &Path) -> Result<()> {
        match &self.location {
            Some(location) => info!(
                %run_id,
                "Cloning repo {} into {}",
                location,
                clone_path.display()
            ),
            None => info!(%run_id, "Cloning repo into {}", clone_path.display()),
        }
        Ok(())
    }

    fn retrieve_changed_file_set(
        &mut self,
        run_id: Uuid,
        target: &CommitRef,
        baseline: &CommitRef,
    ) -> Result<()> {
        info!(
            %run_id,
            "Retrieving files from {} and {}",
            target.short(),
            baseline.short()
        );
        Ok(())
    }

    fn retrieve_file_from_commit(&mut self, run_id: Uuid, path: &str, commit: &CommitRef) -> Result<()> {
        debug!(%run_id, "Retrieving {} from {}", path, commit.short());
        Ok(())
    }

    fn lint_file(&mut self, run_id: Uuid, linter: &str, path: &str) -> Result<()> {
        info!(%run_id, "Linting {} with linter {}", path, linter);
        Ok(())
    }

    fn report(&mut self, run_id: Uuid, report: &LintReport) -> Result<()> {
        info!(
            %run_id,
            "Total number of files processed: {}\t Files with errors: {}",
            report.file_count(),
            report.files_with_findings().count()
        );
        for (file, findings) in &report.errors {
            if findings.is_empty() {
                info!(%run_id, "{} contained no errors.", file);
                continue;
            }
            info!(%run_id, "File {} contains {} errors.", file, findings.len());
            for finding in findings {
                info!(
                    %run_id,
                    "[{}, {}] - {}",
                    finding.line,
                    finding.column,
                    finding.message
                );
            }
        }
        Ok(())
    }

    fn finish(&mut self, run_id: Uuid) -> Result<()> {
        info!(%run_id, "Linting process finished");
        Ok(())
    }

    fn failed(&mut self, run_id: Uuid, state: ProcessState, message: &str) -> Result<()> {
        warn!(%run_id, %state, "Linting process failed: {}", message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lint::Finding;

    #[test]
    fn log_observer_never_fails() {
        let mut observer = LogObserver::with_location("https://example.com/repo.git");
        let id = Uuid::new_v4();
        let commit = CommitRef::new("0123456789abcdef0123456789abcdef01234567");
        let mut report = LintReport::new();
        report.record_file("ok.py");
        report.add("bad.py", Finding::new(1, 2, "W291 trailing whitespace"));

        observer.started(id).unwrap();
        observer.clone_repo(id, Path::new("/tmp/repo")).unwrap();
        observer
            .retrieve_changed_file_set(id, &commit, &commit)
            .unwrap();
        observer.retrieve_file_from_commit(id, "bad.py", &commit).unwrap();
        observer.lint_file(id, "flake8", "bad.py").unwrap();
        observer.report(id, &report).unwrap();
        observer.finish(id).unwrap();
        observer.failed(id, ProcessState::Report, "late failure").unwrap();
        assert_eq!(observer.name(), "log");
    }
}
