//! Lifecycle observer interface.
//!
//! Every method has a pass-through default, so a concrete observer only
//! overrides the notifications it cares about. `NoopObserver` is the explicit
//! do-nothing variant.

use anyhow::Result;
use std::path::Path;
use uuid::Uuid;

use super::state::ProcessState;
use crate::lint::LintReport;
use crate::repo::CommitRef;

/// A listener notified of every lifecycle transition of a lint run.
///
/// Errors returned from a notification are collected by the tracker and never
/// stop other observers from receiving the same notification.
pub trait ProcessObserver {
    /// Name used when reporting this observer's failures.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn started(&mut self, _run_id: Uuid) -> Result<()> {
        Ok(())
    }

    fn clone_repo(&mut self, _run_id: Uuid, _clone_path: &Path) -> Result<()> {
        Ok(())
    }

    fn retrieve_changed_file_set(
        &mut self,
        _run_id: Uuid,
        _target: &CommitRef,
        _baseline: &CommitRef,
    ) -> Result<()> {
        Ok(())
    }

    fn retrieve_file_from_commit(
        &mut self,
        _run_id: Uuid,
        _path: &str,
        _commit: &CommitRef,
    ) -> Result<()> {
        Ok(())
    }

    fn lint_file(&mut self, _run_id: Uuid, _linter: &str, _path: &str) -> Result<()> {
        Ok(())
    }

    fn report(&mut self, _run_id: Uuid, _report: &LintReport) -> Result<()> {
        Ok(())
    }

    fn finish(&mut self, _run_id: Uuid) -> Result<()> {
        Ok(())
    }

    /// A fatal stage aborted the run while the tracker was in `state`.
    fn failed(&mut self, _run_id: Uuid, _state: ProcessState, _message: &str) -> Result<()> {
        Ok(())
    }
}

/// Observer that accepts every notification and does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProcessObserver for NoopObserver {
    fn name(&self) -> &str {
        "noop"
    }
}
