use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase of a lint run.
///
/// Variants are declared in visiting order, so the derived `Ord` is the
/// lifecycle order: `Started < CloneRepo < ... < Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessState {
    #[default]
    Started,
    CloneRepo,
    RetrieveFiles,
    LintFiles,
    Report,
    Finished,
}

impl ProcessState {
    pub const ALL: [ProcessState; 6] = [
        ProcessState::Started,
        ProcessState::CloneRepo,
        ProcessState::RetrieveFiles,
        ProcessState::LintFiles,
        ProcessState::Report,
        ProcessState::Finished,
    ];

    pub fn is_terminal(self) -> bool {
        self == ProcessState::Finished
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessState::Started => "STARTED",
            ProcessState::CloneRepo => "CLONE_REPO",
            ProcessState::RetrieveFiles => "RETRIEVE_FILES",
            ProcessState::LintFiles => "LINT_FILES",
            ProcessState::Report => "REPORT",
            ProcessState::Finished => "FINISHED",
        };
        f.write_str(name)
    }
}

/// The notification kinds an observer can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessEvent {
    Started,
    CloneRepo,
    RetrieveChangedFileSet,
    RetrieveFileFromCommit,
    LintFile,
    Report,
    Finish,
    Failed,
}

impl ProcessEvent {
    /// The state a tracker moves to when emitting this event, if any.
    pub fn target_state(self) -> Option<ProcessState> {
        match self {
            ProcessEvent::Started => Some(ProcessState::Started),
            ProcessEvent::CloneRepo => Some(ProcessState::CloneRepo),
            ProcessEvent::RetrieveChangedFileSet => Some(ProcessState::RetrieveFiles),
            ProcessEvent::RetrieveFileFromCommit => None,
            ProcessEvent::LintFile => Some(ProcessState::LintFiles),
            ProcessEvent::Report => Some(ProcessState::Report),
            ProcessEvent::Finish => Some(ProcessState::Finished),
            ProcessEvent::Failed => None,
        }
    }
}

impl fmt::Display for ProcessEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessEvent::Started => "started",
            ProcessEvent::CloneRepo => "clone_repo",
            ProcessEvent::RetrieveChangedFileSet => "retrieve_changed_file_set",
            ProcessEvent::RetrieveFileFromCommit => "retrieve_file_from_commit",
            ProcessEvent::LintFile => "lint_file",
            ProcessEvent::Report => "report",
            ProcessEvent::Finish => "finish",
            ProcessEvent::Failed => "failed",
        };
        f.write_str(name)
    }
}
