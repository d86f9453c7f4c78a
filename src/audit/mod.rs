//! Run audit records: the persistence side of the observer set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::lint::LintReport;
use crate::process::ProcessState;
use crate::repo::CommitRef;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub state: ProcessState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commits: Option<CommitPair>,
    pub retrieved_files: Vec<FileRetrieval>,
    pub lint_events: Vec<LintEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<LintReport>,
    pub outcome: RunOutcome,
}

impl AuditRun {
    pub fn new(run_id: Uuid, repository: Option<String>) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            ended_at: None,
            state: ProcessState::Started,
            repository,
            clone_path: None,
            commits: None,
            retrieved_files: Vec::new(),
            lint_events: Vec::new(),
            report: None,
            outcome: RunOutcome::InProgress,
        }
    }

    pub fn finish(&mut self, outcome: RunOutcome) {
        self.ended_at = Some(Utc::now());
        self.outcome = outcome;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitPair {
    pub target: CommitRef,
    pub baseline: CommitRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRetrieval {
    pub path: String,
    pub commit: CommitRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LintEvent {
    pub linter: String,
    pub path: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum RunOutcome {
    InProgress,
    Finished,
    Failed { state: ProcessState, message: String },
}

pub mod logger;
pub use logger::AuditLogger;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_run_new() {
        let run = AuditRun::new(Uuid::new_v4(), Some("repo.git".into()));
        assert!(run.ended_at.is_none());
        assert!(run.retrieved_files.is_empty());
        assert_eq!(run.outcome, RunOutcome::InProgress);
        assert_eq!(run.state, ProcessState::Started);
    }

    #[test]
    fn test_audit_run_finish_sets_end_time() {
        let mut run = AuditRun::new(Uuid::new_v4(), None);
        run.finish(RunOutcome::Failed {
            state: ProcessState::CloneRepo,
            message: "unreachable".into(),
        });
        assert!(run.ended_at.is_some());
        assert!(matches!(run.outcome, RunOutcome::Failed { .. }));
    }

    #[test]
    fn test_optional_fields_are_omitted_from_json() {
        let run = AuditRun::new(Uuid::new_v4(), None);
        let value = serde_json::to_value(&run).unwrap();
        assert!(value.get("repository").is_none());
        assert!(value.get("report").is_none());
        assert_eq!(value["state"], "STARTED");
    }
}
