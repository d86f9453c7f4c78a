use std::path::PathBuf;

use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::errors::{ObserverNotificationError, PipelineError};
use crate::extract::{BaselineSelection, ChangeExtractor, ChangeSet, MaterializedTrees, Revisions, RunLayout};
use crate::lint::{LintEngine, LintReport, LintSession};
use crate::process::{NotifyResult, ProcessObserver, ProcessState, ProcessTracker};
use crate::repo::{CommitRef, RepositoryHandle};

/// What a pipeline needs to know about where and how to extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub destination_root: PathBuf,
    pub selection: BaselineSelection,
}

impl PipelineConfig {
    pub fn from_settings(settings: &Settings, run_id: Uuid) -> Self {
        Self {
            destination_root: settings.local_path_for(run_id),
            selection: settings.baseline_selection,
        }
    }
}

/// Everything a successful run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub state: ProcessState,
    pub target: CommitRef,
    pub baseline: CommitRef,
    pub change_set: ChangeSet,
    pub trees: MaterializedTrees,
    pub processed_files: Vec<String>,
    pub report: LintReport,
    /// Non-fatal observer failures, one entry per affected notification.
    pub observer_errors: Vec<ObserverNotificationError>,
}

impl RunOutcome {
    pub fn observer_failure_count(&self) -> usize {
        failure_count(&self.observer_errors)
    }
}

fn failure_count(errors: &[ObserverNotificationError]) -> usize {
    errors.iter().map(|e| e.failures.len()).sum()
}

/// Drives one run: extraction, then the lint engine, with every step
/// broadcast through the tracker.
pub struct Pipeline {
    run_id: Uuid,
    extractor: ChangeExtractor,
    tracker: ProcessTracker,
}

impl Pipeline {
    pub fn new(run_id: Uuid, config: PipelineConfig, observers: Vec<Box<dyn ProcessObserver>>) -> Self {
        Self {
            run_id,
            extractor: ChangeExtractor::new(config.destination_root, config.selection),
            tracker: ProcessTracker::new(run_id, observers),
        }
    }

    /// Build a pipeline for a fresh run id from resolved settings.
    pub fn from_settings(settings: &Settings, observers: Vec<Box<dyn ProcessObserver>>) -> Self {
        let run_id = Uuid::new_v4();
        Self::new(run_id, PipelineConfig::from_settings(settings, run_id), observers)
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn layout(&self) -> &RunLayout {
        self.extractor.layout()
    }

    /// Execute the run. The pipeline is consumed: one run per instance.
    ///
    /// The first fatal error aborts the run after observers are told via
    /// `failed`. The lint engine is only invoked once both trees are complete.
    pub fn run<H>(
        self,
        handle: &mut H,
        revisions: &Revisions,
        engine: &mut dyn LintEngine,
    ) -> Result<RunOutcome, PipelineError>
    where
        H: RepositoryHandle + ?Sized,
    {
        let Pipeline {
            run_id,
            extractor,
            mut tracker,
        } = self;
        let mut observer_errors = Vec::new();

        info!(%run_id, repository = handle.location(), %revisions, "starting lint run");

        collect(&mut observer_errors, tracker.started());
        collect(
            &mut observer_errors,
            tracker.clone_repo(&extractor.layout().clone_path()),
        );

        let (target, baseline) = match extractor.prepare_revisions(handle, revisions) {
            Ok(commits) => commits,
            Err(e) => return Err(abort(&mut tracker, &mut observer_errors, e.into())),
        };

        collect(
            &mut observer_errors,
            tracker.retrieve_changed_file_set(&target, &baseline),
        );

        let change_set = match extractor.change_set(handle, &target, &baseline) {
            Ok(change_set) => change_set,
            Err(e) => return Err(abort(&mut tracker, &mut observer_errors, e.into())),
        };

        let materialized = extractor.materialize(handle, &target, &baseline, &change_set, |path, commit| {
            collect(
                &mut observer_errors,
                tracker.retrieve_file_from_commit(path, commit),
            )
        });
        let trees = match materialized {
            Ok(trees) => trees,
            Err(e) => return Err(abort(&mut tracker, &mut observer_errors, e.into())),
        };

        let linted = {
            let mut session = LintSession::new(&mut tracker, &mut observer_errors);
            engine.lint(&trees, &mut session)
        };
        let report = match linted {
            Ok(report) => report,
            Err(source) => {
                let error = PipelineError::Lint {
                    engine: engine.name().to_string(),
                    source,
                };
                return Err(abort(&mut tracker, &mut observer_errors, error));
            }
        };

        collect(&mut observer_errors, tracker.report_lint(report.clone()));
        collect(&mut observer_errors, tracker.finish());

        info!(
            %run_id,
            files = report.file_count(),
            findings = report.total_findings(),
            observer_failures = failure_count(&observer_errors),
            "lint run finished"
        );

        Ok(RunOutcome {
            run_id,
            state: tracker.state(),
            target,
            baseline,
            change_set,
            trees,
            processed_files: tracker.processed_files().to_vec(),
            report,
            observer_errors,
        })
    }
}

fn collect(errors: &mut Vec<ObserverNotificationError>, result: NotifyResult) {
    if let Err(e) = result {
        errors.push(e);
    }
}

/// Broadcast a fatal error and hand it back. The error returned is always the
/// fatal one; observer failures, including those of the `failed` broadcast,
/// are counted in the abort log.
fn abort(
    tracker: &mut ProcessTracker,
    observer_errors: &mut Vec<ObserverNotificationError>,
    error: PipelineError,
) -> PipelineError {
    collect(observer_errors, tracker.failed(&error.to_string()));
    warn!(
        run_id = %tracker.run_id(),
        state = %tracker.state(),
        observer_failures = failure_count(observer_errors),
        error = %error,
        "lint run aborted"
    );
    error
}
