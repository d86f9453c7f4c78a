//! Process state tracker.
//!
//! The tracker owns the lifecycle state of one run and fans every transition
//! out to the registered observers in registration order. A failing observer
//! (error or panic) is recorded and the remaining observers are still called.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use super::observer::ProcessObserver;
use super::state::{ProcessEvent, ProcessState};
use crate::errors::{ObserverFailure, ObserverNotificationError};
use crate::lint::LintReport;
use crate::repo::CommitRef;

/// Outcome of one fan-out.
pub type NotifyResult = Result<(), ObserverNotificationError>;

pub struct ProcessTracker {
    run_id: Uuid,
    state: ProcessState,
    observers: Vec<Box<dyn ProcessObserver>>,
    clone_path: Option<PathBuf>,
    target: Option<CommitRef>,
    baseline: Option<CommitRef>,
    processed_files: Vec<String>,
    linted_files: usize,
    report: Option<LintReport>,
}

impl ProcessTracker {
    /// Create a tracker in the `Started` state. The observer set is fixed for the run.
    pub fn new(run_id: Uuid, observers: Vec<Box<dyn ProcessObserver>>) -> Self {
        Self {
            run_id,
            state: ProcessState::Started,
            observers,
            clone_path: None,
            target: None,
            baseline: None,
            processed_files: Vec::new(),
            linted_files: 0,
            report: None,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn clone_path(&self) -> Option<&Path> {
        self.clone_path.as_deref()
    }

    /// Commit references recorded by `retrieve_changed_file_set`, as `(target, baseline)`.
    pub fn commits(&self) -> Option<(&CommitRef, &CommitRef)> {
        self.target.as_ref().zip(self.baseline.as_ref())
    }

    /// Every path pulled so far, in pull order.
    pub fn processed_files(&self) -> &[String] {
        &self.processed_files
    }

    pub fn linted_files(&self) -> usize {
        self.linted_files
    }

    pub fn report(&self) -> Option<&LintReport> {
        self.report.as_ref()
    }

    pub fn started(&mut self) -> NotifyResult {
        self.advance(ProcessEvent::Started);
        fan_out(
            &mut self.observers,
            self.run_id,
            ProcessEvent::Started,
            |o, id| o.started(id),
        )
    }

    pub fn clone_repo(&mut self, clone_path: &Path) -> NotifyResult {
        self.advance(ProcessEvent::CloneRepo);
        let clone_path: &Path = self.clone_path.insert(clone_path.to_path_buf());
        fan_out(
            &mut self.observers,
            self.run_id,
            ProcessEvent::CloneRepo,
            |o, id| o.clone_repo(id, clone_path),
        )
    }

    pub fn retrieve_changed_file_set(
        &mut self,
        target: &CommitRef,
        baseline: &CommitRef,
    ) -> NotifyResult {
        self.advance(ProcessEvent::RetrieveChangedFileSet);
        let target: &CommitRef = self.target.insert(target.clone());
        let baseline: &CommitRef = self.baseline.insert(baseline.clone());
        fan_out(
            &mut self.observers,
            self.run_id,
            ProcessEvent::RetrieveChangedFileSet,
            |o, id| o.retrieve_changed_file_set(id, target, baseline),
        )
    }

    pub fn retrieve_file_from_commit(&mut self, path: &str, commit: &CommitRef) -> NotifyResult {
        self.processed_files.push(path.to_string());
        fan_out(
            &mut self.observers,
            self.run_id,
            ProcessEvent::RetrieveFileFromCommit,
            |o, id| o.retrieve_file_from_commit(id, path, commit),
        )
    }

    pub fn lint_file(&mut self, linter: &str, path: &str) -> NotifyResult {
        self.advance(ProcessEvent::LintFile);
        self.linted_files += 1;
        fan_out(
            &mut self.observers,
            self.run_id,
            ProcessEvent::LintFile,
            |o, id| o.lint_file(id, linter, path),
        )
    }

    pub fn report_lint(&mut self, report: LintReport) -> NotifyResult {
        self.advance(ProcessEvent::Report);
        let report: &LintReport = self.report.insert(report);
        fan_out(
            &mut self.observers,
            self.run_id,
            ProcessEvent::Report,
            |o, id| o.report(id, report),
        )
    }

    pub fn finish(&mut self) -> NotifyResult {
        self.advance(ProcessEvent::Finish);
        fan_out(
            &mut self.observers,
            self.run_id,
            ProcessEvent::Finish,
            |o, id| o.finish(id),
        )
    }

    /// Broadcast a fatal failure. The state is left where the run stopped.
    pub fn failed(&mut self, message: &str) -> NotifyResult {
        let state = self.state;
        fan_out(
            &mut self.observers,
            self.run_id,
            ProcessEvent::Failed,
            |o, id| o.failed(id, state, message),
        )
    }

    /// Move to the state implied by `event`. The state never moves backwards.
    fn advance(&mut self, event: ProcessEvent) {
        let Some(next) = event.target_state() else {
            return;
        };
        if self.state.is_terminal() {
            warn!(run_id = %self.run_id, %event, "transition after the run finished");
        }
        if next < self.state {
            warn!(
                run_id = %self.run_id,
                %event,
                current = %self.state,
                "out-of-order transition ignored for state tracking"
            );
            return;
        }
        if next != self.state {
            debug!(run_id = %self.run_id, from = %self.state, to = %next, "state transition");
        }
        self.state = next;
    }
}

fn fan_out<F>(
    observers: &mut [Box<dyn ProcessObserver>],
    run_id: Uuid,
    event: ProcessEvent,
    mut notify: F,
) -> NotifyResult
where
    F: FnMut(&mut dyn ProcessObserver, Uuid) -> anyhow::Result<()>,
{
    let mut failures = Vec::new();

    for observer in observers.iter_mut() {
        let outcome = catch_unwind(AssertUnwindSafe(|| notify(observer.as_mut(), run_id)));
        let message = match outcome {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => format!("{:#}", e),
            Err(panic) => panic_message(panic.as_ref()),
        };
        warn!(
            run_id = %run_id,
            %event,
            observer = observer.name(),
            error = %message,
            "observer failed"
        );
        failures.push(ObserverFailure {
            observer: observer.name().to_string(),
            message,
        });
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(ObserverNotificationError { event, failures })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        label: &'static str,
        log: Log,
        fail_on_lint: bool,
    }

    impl Recorder {
        fn boxed(label: &'static str, log: &Log, fail_on_lint: bool) -> Box<dyn ProcessObserver> {
            Box::new(Self {
                label,
                log: Arc::clone(log),
                fail_on_lint,
            })
        }

        fn push(&self, entry: String) {
            self.log.lock().unwrap().push(format!("{}:{}", self.label, entry));
        }
    }

    impl ProcessObserver for Recorder {
        fn name(&self) -> &str {
            self.label
        }

        fn started(&mut self, _run_id: Uuid) -> anyhow::Result<()> {
            self.push("started".into());
            Ok(())
        }

        fn retrieve_file_from_commit(
            &mut self,
            _run_id: Uuid,
            path: &str,
            commit: &CommitRef,
        ) -> anyhow::Result<()> {
            self.push(format!("retrieve {}@{}", path, commit.short()));
            Ok(())
        }

        fn lint_file(&mut self, _run_id: Uuid, linter: &str, path: &str) -> anyhow::Result<()> {
            if self.fail_on_lint {
                anyhow::bail!("lint sink unavailable");
            }
            self.push(format!("lint {} {}", linter, path));
            Ok(())
        }

        fn finish(&mut self, _run_id: Uuid) -> anyhow::Result<()> {
            self.push("finish".into());
            Ok(())
        }
    }

    struct Panicker;

    impl ProcessObserver for Panicker {
        fn name(&self) -> &str {
            "panicker"
        }

        fn started(&mut self, _run_id: Uuid) -> anyhow::Result<()> {
            panic!("observer exploded");
        }
    }

    fn commit() -> CommitRef {
        CommitRef::new("aaaaaaaabbbbbbbbccccccccddddddddeeeeeeee")
    }

    #[test]
    fn new_tracker_starts_in_started_state() {
        let tracker = ProcessTracker::new(Uuid::new_v4(), Vec::new());
        assert_eq!(tracker.state(), ProcessState::Started);
        assert!(tracker.processed_files().is_empty());
        assert!(tracker.commits().is_none());
    }

    #[test]
    fn transitions_visit_states_in_order() {
        let mut tracker = ProcessTracker::new(Uuid::new_v4(), Vec::new());
        let mut seen = vec![tracker.state()];

        tracker.started().unwrap();
        tracker.clone_repo(Path::new("/tmp/run/repo")).unwrap();
        seen.push(tracker.state());
        tracker
            .retrieve_changed_file_set(&commit(), &commit())
            .unwrap();
        seen.push(tracker.state());
        tracker.retrieve_file_from_commit("x.py", &commit()).unwrap();
        tracker.lint_file("flake8", "x.py").unwrap();
        seen.push(tracker.state());
        tracker.report_lint(LintReport::default()).unwrap();
        seen.push(tracker.state());
        tracker.finish().unwrap();
        seen.push(tracker.state());

        assert_eq!(seen, ProcessState::ALL.to_vec());
        assert_eq!(tracker.clone_path(), Some(Path::new("/tmp/run/repo")));
        assert!(tracker.report().is_some());
        assert_eq!(tracker.linted_files(), 1);
    }

    #[test]
    fn state_never_regresses() {
        let mut tracker = ProcessTracker::new(Uuid::new_v4(), Vec::new());
        tracker.lint_file("flake8", "x.py").unwrap();
        tracker.clone_repo(Path::new("/tmp/repo")).unwrap();
        assert_eq!(tracker.state(), ProcessState::LintFiles);
        tracker.finish().unwrap();
        tracker.started().unwrap();
        assert_eq!(tracker.state(), ProcessState::Finished);
    }

    #[test]
    fn processed_files_keep_pull_order() {
        let mut tracker = ProcessTracker::new(Uuid::new_v4(), Vec::new());
        for path in ["b.py", "a.py", "c/d.py"] {
            tracker.retrieve_file_from_commit(path, &commit()).unwrap();
        }
        assert_eq!(tracker.processed_files(), &["b.py", "a.py", "c/d.py"]);
    }

    #[test]
    fn observers_are_notified_in_registration_order() {
        let log: Log = Arc::default();
        let mut tracker = ProcessTracker::new(
            Uuid::new_v4(),
            vec![
                Recorder::boxed("first", &log, false),
                Recorder::boxed("second", &log, false),
            ],
        );
        tracker.started().unwrap();
        tracker.finish().unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "first:started",
                "second:started",
                "first:finish",
                "second:finish"
            ]
        );
    }

    #[test]
    fn failing_observer_does_not_short_circuit_fan_out() {
        let log: Log = Arc::default();
        let mut tracker = ProcessTracker::new(
            Uuid::new_v4(),
            vec![
                Recorder::boxed("one", &log, false),
                Recorder::boxed("two", &log, true),
                Recorder::boxed("three", &log, false),
            ],
        );

        let err = tracker.lint_file("pylint", "pkg/y.py").unwrap_err();

        assert_eq!(err.event, ProcessEvent::LintFile);
        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].observer, "two");
        assert!(err.failures[0].message.contains("lint sink unavailable"));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["one:lint pylint pkg/y.py", "three:lint pylint pkg/y.py"]
        );
        assert_eq!(tracker.state(), ProcessState::LintFiles);
    }

    #[test]
    fn panicking_observer_is_reported_and_others_still_run() {
        let log: Log = Arc::default();
        let mut tracker = ProcessTracker::new(
            Uuid::new_v4(),
            vec![
                Box::new(Panicker) as Box<dyn ProcessObserver>,
                Recorder::boxed("after", &log, false),
            ],
        );

        let err = tracker.started().unwrap_err();

        assert_eq!(err.failures[0].observer, "panicker");
        assert!(err.failures[0].message.contains("observer exploded"));
        assert_eq!(*log.lock().unwrap(), vec!["after:started"]);
    }

    #[test]
    fn failed_keeps_current_state() {
        let mut tracker = ProcessTracker::new(Uuid::new_v4(), Vec::new());
        tracker.clone_repo(Path::new("/tmp/repo")).unwrap();
        tracker.failed("clone failed").unwrap();
        assert_eq!(tracker.state(), ProcessState::CloneRepo);
    }
}
