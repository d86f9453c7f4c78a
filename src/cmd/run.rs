//! One lint run: `lintable run <REPO> [TARGET] [BASELINE]`.

use anyhow::{Context, Result};
use console::{Term, style};
use serde_json::json;

use lintable::audit::AuditLogger;
use lintable::config::Settings;
use lintable::extract::Revisions;
use lintable::lint::CommandLinter;
use lintable::orchestrator::{Pipeline, RunOutcome};
use lintable::process::{LogObserver, ProcessObserver};
use lintable::repo::GitRepository;
use lintable::ui::ProgressObserver;

use super::super::{Cli, RunArgs};

/// Apply command-line overrides on top of file and environment settings.
pub fn resolve_settings(cli: &Cli, args: &RunArgs) -> Result<Settings> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(path) = &args.local_path {
        settings.local_path = Some(path.clone());
    }
    if let Some(cmd) = &args.lint_cmd {
        settings.lint_command = cmd.clone();
    }
    if let Some(selection) = &args.baseline_selection {
        settings.baseline_selection = selection
            .parse()
            .context("Invalid --baseline-selection")?;
    }
    if let Some(dir) = &args.audit_dir {
        settings.audit_dir = dir.clone();
    }
    Ok(settings)
}

pub fn cmd_run(cli: &Cli, args: &RunArgs) -> Result<()> {
    let settings = resolve_settings(cli, args)?;
    let mut linter = CommandLinter::new(&settings.lint_command)?;

    let mut observers: Vec<Box<dyn ProcessObserver>> = vec![
        Box::new(LogObserver::with_location(&args.repo)),
        Box::new(AuditLogger::new(&settings.audit_dir).with_repository(&args.repo)),
    ];
    if !args.no_progress && !args.json && Term::stderr().is_term() {
        observers.push(Box::new(ProgressObserver::new(cli.verbose)));
    }

    let pipeline = Pipeline::from_settings(&settings, observers);
    let revisions = Revisions::from_refs(args.target.clone(), args.baseline.clone());
    let mut handle = GitRepository::new(args.repo.as_str());

    let outcome = pipeline.run(&mut handle, &revisions, &mut linter)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome_json(&outcome))?);
    } else {
        print_outcome(&outcome);
    }

    for error in &outcome.observer_errors {
        eprintln!("{} {}", style("warning:").yellow().bold(), error);
    }

    Ok(())
}

fn outcome_json(outcome: &RunOutcome) -> serde_json::Value {
    let observer_errors: Vec<_> = outcome
        .observer_errors
        .iter()
        .flat_map(|e| {
            e.failures.iter().map(move |f| {
                json!({
                    "event": e.event,
                    "observer": f.observer,
                    "message": f.message,
                })
            })
        })
        .collect();

    json!({
        "run_id": outcome.run_id,
        "state": outcome.state,
        "target": outcome.target,
        "baseline": outcome.baseline,
        "change_set": outcome.change_set,
        "target_tree": outcome.trees.target_root(),
        "baseline_tree": outcome.trees.baseline_root(),
        "processed_files": outcome.processed_files,
        "report": outcome.report,
        "observer_errors": observer_errors,
    })
}

fn print_outcome(outcome: &RunOutcome) {
    println!();
    println!(
        "{} {} against {}",
        style("Reviewed").bold(),
        style(outcome.target.short()).cyan(),
        style(outcome.baseline.short()).cyan()
    );
    println!(
        "  target tree:   {} ({} files)",
        outcome.trees.target_root().display(),
        outcome.trees.target_files().len()
    );
    println!(
        "  baseline tree: {} ({} files)",
        outcome.trees.baseline_root().display(),
        outcome.trees.baseline_files().len()
    );
    println!();

    let report = &outcome.report;
    if report.is_clean() {
        println!(
            "{} {} files linted, no findings",
            style("✓").green().bold(),
            report.file_count()
        );
        return;
    }

    for (path, findings) in report.files_with_findings() {
        for finding in findings {
            println!(
                "{}:{}:{}: {}",
                style(path).bold(),
                finding.line,
                finding.column,
                finding.message
            );
        }
    }
    println!();
    println!(
        "{} {} finding(s) in {} of {} files",
        style("✗").red().bold(),
        report.total_findings(),
        report.files_with_findings().count(),
        report.file_count()
    );
}
