use crate::lint::LintReport;
use crate::process::{ProcessObserver, ProcessState};
use crate::repo::CommitRef;
use crate::ui::icons::{CHECK, CROSS, FILE_NEW, FOLDER, LINT, PROGRESS, SPARKLE};
use anyhow::Result;
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

/// Terminal progress for a lint run, rendered via `indicatif` progress bars.
///
/// Two bars are stacked vertically:
/// - Stage bar: how many lifecycle stages the run has passed
/// - File bar: spinner with the file currently being pulled or linted
pub struct ProgressObserver {
    multi: MultiProgress,
    stage_bar: ProgressBar,
    file_bar: ProgressBar,
    verbose: bool,
    pulled: u64,
    linted: u64,
}

impl ProgressObserver {
    pub fn new(verbose: bool) -> Self {
        Self::with_multi(MultiProgress::new(), verbose)
    }

    /// Progress that draws nothing. Used when output is not a terminal and in tests.
    pub fn hidden() -> Self {
        Self::with_multi(
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
            false,
        )
    }

    fn with_multi(multi: MultiProgress, verbose: bool) -> Self {
        let stage_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░");

        let stage_bar = multi.add(ProgressBar::new(ProcessState::ALL.len() as u64 - 1));
        stage_bar.set_style(stage_style);
        stage_bar.set_prefix("Stage");

        let file_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let file_bar = multi.add(ProgressBar::new_spinner());
        file_bar.set_style(file_style);
        file_bar.set_prefix("Files");

        Self {
            multi,
            stage_bar,
            file_bar,
            verbose,
            pulled: 0,
            linted: 0,
        }
    }

    /// Print a line via `MultiProgress`, falling back to `eprintln!` if the rich UI fails.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    fn enter(&self, state: ProcessState, message: String) {
        self.stage_bar.set_position(state_index(state));
        self.stage_bar.set_message(message);
    }

    pub fn pulled(&self) -> u64 {
        self.pulled
    }

    pub fn linted(&self) -> u64 {
        self.linted
    }

    pub fn stage_position(&self) -> u64 {
        self.stage_bar.position()
    }
}

fn state_index(state: ProcessState) -> u64 {
    ProcessState::ALL
        .iter()
        .position(|s| *s == state)
        .unwrap_or_default() as u64
}

impl ProcessObserver for ProgressObserver {
    fn name(&self) -> &str {
        "progress"
    }

    fn started(&mut self, run_id: Uuid) -> Result<()> {
        self.enter(
            ProcessState::Started,
            format!("run {}", style(&run_id.to_string()[..8]).yellow()),
        );
        Ok(())
    }

    fn clone_repo(&mut self, _run_id: Uuid, clone_path: &Path) -> Result<()> {
        self.enter(
            ProcessState::CloneRepo,
            format!("{}cloning into {}", FOLDER, style(clone_path.display()).dim()),
        );
        Ok(())
    }

    fn retrieve_changed_file_set(
        &mut self,
        _run_id: Uuid,
        target: &CommitRef,
        baseline: &CommitRef,
    ) -> Result<()> {
        self.enter(
            ProcessState::RetrieveFiles,
            format!(
                "retrieving {} against {}",
                style(target.short()).cyan(),
                style(baseline.short()).cyan()
            ),
        );
        self.file_bar.enable_steady_tick(Duration::from_millis(100));
        Ok(())
    }

    fn retrieve_file_from_commit(&mut self, _run_id: Uuid, path: &str, commit: &CommitRef) -> Result<()> {
        self.pulled += 1;
        self.file_bar.set_message(format!(
            "{}{} {}",
            FILE_NEW,
            path,
            style(format!("@{}", commit.short())).dim()
        ));
        if self.verbose {
            self.print_line(format!("    {}{} @{}", FILE_NEW, path, commit.short()));
        }
        Ok(())
    }

    fn lint_file(&mut self, _run_id: Uuid, linter: &str, path: &str) -> Result<()> {
        self.linted += 1;
        self.enter(
            ProcessState::LintFiles,
            format!("linting with {}", style(linter).yellow()),
        );
        self.file_bar
            .set_message(format!("{}{} {}", LINT, path, style(format!("#{}", self.linted)).dim()));
        Ok(())
    }

    fn report(&mut self, _run_id: Uuid, report: &LintReport) -> Result<()> {
        self.enter(ProcessState::Report, "reporting".to_string());
        self.file_bar.finish_and_clear();
        let with_findings = report.files_with_findings().count();
        let summary = if with_findings == 0 {
            format!("{} files linted, no findings", style(report.file_count()).green())
        } else {
            format!(
                "{} files linted, {} with findings ({} total)",
                style(report.file_count()).cyan(),
                style(with_findings).red().bold(),
                report.total_findings()
            )
        };
        self.print_line(format!("{}{}", PROGRESS, summary));
        Ok(())
    }

    fn finish(&mut self, _run_id: Uuid) -> Result<()> {
        self.stage_bar.set_position(state_index(ProcessState::Finished));
        self.stage_bar
            .finish_with_message(format!("{}{}", CHECK, style("finished").green().bold()));
        self.print_line(format!("{}Lint run complete", SPARKLE));
        Ok(())
    }

    fn failed(&mut self, _run_id: Uuid, state: ProcessState, message: &str) -> Result<()> {
        self.file_bar.finish_and_clear();
        self.stage_bar.abandon_with_message(format!(
            "{}failed during {}",
            CROSS,
            style(state).red().bold()
        ));
        self.print_line(format!("{}{}", CROSS, style(message).red()));
        Ok(())
    }
}
