use super::{AuditRun, CommitPair, FileRetrieval, LintEvent, RunOutcome};
use crate::lint::LintReport;
use crate::process::{ProcessObserver, ProcessState};
use crate::repo::CommitRef;
use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Persists each run as JSON.
///
/// While a run is active its record is rewritten to `current-run.json` after
/// every event. On `finish` or `failed` the record moves to
/// `runs/<timestamp>_<id8>.json`.
pub struct AuditLogger {
    audit_dir: PathBuf,
    repository: Option<String>,
    current_run: Option<AuditRun>,
    current_run_file: PathBuf,
    last_run_file: Option<PathBuf>,
}

impl AuditLogger {
    pub fn new(audit_dir: &Path) -> Self {
        let current_run_file = audit_dir.join("current-run.json");
        Self {
            audit_dir: audit_dir.to_path_buf(),
            repository: None,
            current_run: None,
            current_run_file,
            last_run_file: None,
        }
    }

    /// Record the source repository location in every run.
    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(self.audit_dir.join("runs"))
            .context("Failed to create audit runs directory")
    }

    pub fn start_run(&mut self, run_id: Uuid) -> Result<()> {
        self.ensure_directories()?;
        self.current_run = Some(AuditRun::new(run_id, self.repository.clone()));
        self.save_current()
    }

    /// Apply a mutation to the current run and persist it.
    fn update<F>(&mut self, run_id: Uuid, f: F) -> Result<()>
    where
        F: FnOnce(&mut AuditRun),
    {
        let run = self
            .current_run
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("audit event for run {} with no active run", run_id))?;
        anyhow::ensure!(
            run.run_id == run_id,
            "audit event for run {} while run {} is active",
            run_id,
            run.run_id
        );
        f(run);
        self.save_current()
    }

    pub fn finish_run(&mut self, outcome: RunOutcome) -> Result<PathBuf> {
        let run = self
            .current_run
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("No current run to finish"))?;

        run.finish(outcome);

        let filename = format!(
            "{}_{}.json",
            run.started_at.format("%Y-%m-%dT%H-%M-%S"),
            &run.run_id.to_string()[..8]
        );
        let run_file = self.audit_dir.join("runs").join(&filename);

        let json = serde_json::to_string_pretty(&run).context("Failed to serialize audit run")?;
        fs::write(&run_file, json).context("Failed to write audit run file")?;

        if self.current_run_file.exists() {
            fs::remove_file(&self.current_run_file)
                .context("Failed to remove current-run.json after finishing run")?;
        }

        self.current_run = None;
        self.last_run_file = Some(run_file.clone());
        Ok(run_file)
    }

    pub fn save_current(&self) -> Result<()> {
        if let Some(ref run) = self.current_run {
            let json =
                serde_json::to_string_pretty(&run).context("Failed to serialize current run")?;
            fs::write(&self.current_run_file, json).context("Failed to write current run file")?;
        }
        Ok(())
    }

    pub fn current_run(&self) -> Option<&AuditRun> {
        self.current_run.as_ref()
    }

    /// File written by the most recent `finish_run`.
    pub fn last_run_file(&self) -> Option<&Path> {
        self.last_run_file.as_deref()
    }

    pub fn list_runs(&self) -> Result<Vec<PathBuf>> {
        let runs_dir = self.audit_dir.join("runs");
        if !runs_dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs: Vec<PathBuf> = fs::read_dir(&runs_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|e| e == "json").unwrap_or(false))
            .collect();

        runs.sort();
        runs.reverse(); // Most recent first
        Ok(runs)
    }

    pub fn load_run(&self, path: &Path) -> Result<AuditRun> {
        let content = fs::read_to_string(path).context("Failed to read audit run file")?;
        let run: AuditRun =
            serde_json::from_str(&content).context("Failed to parse audit run file")?;
        Ok(run)
    }
}

impl ProcessObserver for AuditLogger {
    fn name(&self) -> &str {
        "audit"
    }

    fn started(&mut self, run_id: Uuid) -> Result<()> {
        self.start_run(run_id)
    }

    fn clone_repo(&mut self, run_id: Uuid, clone_path: &Path) -> Result<()> {
        self.update(run_id, |run| {
            run.state = ProcessState::CloneRepo;
            run.clone_path = Some(clone_path.to_path_buf());
        })
    }

    fn retrieve_changed_file_set(
        &mut self,
        run_id: Uuid,
        target: &CommitRef,
        baseline: &CommitRef,
    ) -> Result<()> {
        self.update(run_id, |run| {
            run.state = ProcessState::RetrieveFiles;
            run.commits = Some(CommitPair {
                target: target.clone(),
                baseline: baseline.clone(),
            });
        })
    }

    fn retrieve_file_from_commit(&mut self, run_id: Uuid, path: &str, commit: &CommitRef) -> Result<()> {
        self.update(run_id, |run| {
            run.retrieved_files.push(FileRetrieval {
                path: path.to_string(),
                commit: commit.clone(),
            });
        })
    }

    fn lint_file(&mut self, run_id: Uuid, linter: &str, path: &str) -> Result<()> {
        self.update(run_id, |run| {
            run.state = ProcessState::LintFiles;
            run.lint_events.push(LintEvent {
                linter: linter.to_string(),
                path: path.to_string(),
                at: Utc::now(),
            });
        })
    }

    fn report(&mut self, run_id: Uuid, report: &LintReport) -> Result<()> {
        self.update(run_id, |run| {
            run.state = ProcessState::Report;
            run.report = Some(report.clone());
        })
    }

    fn finish(&mut self, run_id: Uuid) -> Result<()> {
        self.update(run_id, |run| run.state = ProcessState::Finished)?;
        self.finish_run(RunOutcome::Finished)?;
        Ok(())
    }

    fn failed(&mut self, run_id: Uuid, state: ProcessState, message: &str) -> Result<()> {
        self.update(run_id, |run| run.state = state)?;
        self.finish_run(RunOutcome::Failed {
            state,
            message: message.to_string(),
        })?;
        Ok(())
    }
}
