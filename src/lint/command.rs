//! External command lint engine.
//!
//! Runs a linter executable once per changed file of the target tree, with the
//! tree as working directory and `./<path>` as last argument, so a file name
//! can never be read as an option. Output lines of the form
//! `path:line:col: message` (column optional) become findings.
//!
//! Exit status 0 (clean) and 1 (findings) are expected. Any other status, or
//! termination by a signal, fails the lint run with the linter's stderr.

use anyhow::{Context, Result, bail};
use regex::Regex;
use std::path::Path;
use std::process::Command;
use tracing::debug;

use super::{Finding, LintEngine, LintReport, LintSession};
use crate::extract::MaterializedTrees;

pub struct CommandLinter {
    name: String,
    program: String,
    args: Vec<String>,
    pattern: Regex,
}

impl CommandLinter {
    /// Build from a whitespace-separated command line, e.g. `"flake8 --max-line-length 100"`.
    pub fn new(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let Some(program) = parts.next() else {
            bail!("Lint command is empty");
        };
        let name = Path::new(&program)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.clone());
        let pattern = Regex::new(r"^(?P<path>[^:]+):(?P<line>\d+):(?:(?P<col>\d+):)?\s*(?P<msg>.*)$")
            .context("Invalid lint output pattern")?;

        Ok(Self {
            name,
            program,
            args: parts.collect(),
            pattern,
        })
    }

    /// Parse linter output into findings. Lines that do not match are ignored.
    pub fn parse_output(&self, output: &str) -> Vec<Finding> {
        output
            .lines()
            .filter_map(|line| {
                let caps = self.pattern.captures(line.trim_end())?;
                let line_no = caps["line"].parse().ok()?;
                let column = caps
                    .name("col")
                    .and_then(|c| c.as_str().parse().ok())
                    .unwrap_or(0);
                Some(Finding::new(line_no, column, caps["msg"].trim()))
            })
            .collect()
    }

    fn lint_one(&self, trees: &MaterializedTrees, path: &str) -> Result<Vec<Finding>> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(Path::new(".").join(path))
            .current_dir(trees.target_root())
            .output()
            .with_context(|| format!("Failed to spawn linter '{}'", self.program))?;

        debug!(
            linter = %self.name,
            path,
            status = ?output.status.code(),
            "linter exited"
        );

        match output.status.code() {
            Some(0 | 1) => {}
            code => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let status = code.map_or_else(|| "a signal".to_string(), |c| format!("status {}", c));
                bail!(
                    "Linter '{}' exited with {} on {}: {}",
                    self.name,
                    status,
                    path,
                    stderr.trim()
                );
            }
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(self.parse_output(&stdout))
    }
}

impl LintEngine for CommandLinter {
    fn name(&self) -> &str {
        &self.name
    }

    fn lint(&mut self, trees: &MaterializedTrees, session: &mut LintSession<'_>) -> Result<LintReport> {
        let mut report = LintReport::new();
        for path in trees.target_files() {
            session.lint_file(&self.name, path);
            report.record_file(path);
            for finding in self.lint_one(trees, path)? {
                report.add(path, finding);
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessTracker;
    use std::fs;
    use tempfile::{TempDir, tempdir};
    use uuid::Uuid;

    /// Target tree holding `files`, of which only `changed` were materialized.
    fn trees(files: &[(&str, &str)], changed: &[&str]) -> (TempDir, MaterializedTrees) {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();
        for (name, body) in files {
            fs::write(a.join(name), body).unwrap();
        }
        let changed = changed.iter().map(|s| s.to_string()).collect();
        (dir, MaterializedTrees::new(a, b, changed, Vec::new()))
    }

    fn lint(linter: &mut CommandLinter, trees: &MaterializedTrees) -> Result<LintReport> {
        let mut tracker = ProcessTracker::new(Uuid::new_v4(), Vec::new());
        let mut errors = Vec::new();
        let mut session = LintSession::new(&mut tracker, &mut errors);
        linter.lint(trees, &mut session)
    }

    #[test]
    fn test_new_splits_program_and_args() {
        let linter = CommandLinter::new("/usr/bin/flake8 --max-line-length 100").unwrap();
        assert_eq!(linter.name(), "flake8");
        assert_eq!(linter.program, "/usr/bin/flake8");
        assert_eq!(linter.args, vec!["--max-line-length", "100"]);
    }

    #[test]
    fn test_new_rejects_empty_command() {
        assert!(CommandLinter::new("   ").is_err());
    }

    #[test]
    fn test_parse_output_with_and_without_columns() {
        let linter = CommandLinter::new("flake8").unwrap();
        let output = "\
pkg/x.py:3:1: E302 expected 2 blank lines, found 1
pkg/x.py:12: missing docstring
some banner line
pkg/x.py:notanumber:1: ignored
";
        let findings = linter.parse_output(output);
        assert_eq!(
            findings,
            vec![
                Finding::new(3, 1, "E302 expected 2 blank lines, found 1"),
                Finding::new(12, 0, "missing docstring"),
            ]
        );
    }

    #[test]
    fn test_parse_output_keeps_colons_in_message() {
        let linter = CommandLinter::new("pylint").unwrap();
        let findings = linter.parse_output("a.py:1:5: C0114: Missing module docstring");
        assert_eq!(findings[0].message, "C0114: Missing module docstring");
    }

    #[test]
    fn test_lint_covers_only_materialized_files() {
        let (_dir, trees) = trees(
            &[("x.py", "x = 2\n"), ("stale.py", "# TODO stale\n")],
            &["x.py"],
        );
        let mut linter = CommandLinter::new("grep -Hn TODO").unwrap();

        let report = lint(&mut linter, &trees).unwrap();

        assert_eq!(report.file_count(), 1);
        assert!(report.is_clean());
        assert!(!report.errors.contains_key("stale.py"));
    }

    #[test]
    fn test_lint_dash_named_file_is_not_an_option() {
        let (_dir, trees) = trees(
            &[("-v", "TODO hidden\n"), ("x.py", "TODO visible\n")],
            &["-v", "x.py"],
        );
        let mut linter = CommandLinter::new("grep -Hn TODO").unwrap();

        let report = lint(&mut linter, &trees).unwrap();

        assert_eq!(report.errors["-v"], vec![Finding::new(1, 0, "TODO hidden")]);
        assert_eq!(report.errors["x.py"], vec![Finding::new(1, 0, "TODO visible")]);
    }

    #[test]
    fn test_lint_fails_when_linter_cannot_run() {
        let (_dir, trees) = trees(&[("x.py", "x = 2\n")], &["x.py"]);
        let mut linter = CommandLinter::new("grep --no-such-grep-option TODO").unwrap();

        let err = lint(&mut linter, &trees).unwrap_err();

        let text = err.to_string();
        assert!(text.contains("status 2"), "{text}");
        assert!(text.contains("x.py"), "{text}");
    }

    #[test]
    fn test_lint_exit_status_one_is_findings_not_failure() {
        let (_dir, trees) = trees(&[("x.py", "x = 2\n")], &["x.py"]);
        let mut linter = CommandLinter::new("grep -Hn TODO").unwrap();

        let report = lint(&mut linter, &trees).unwrap();

        assert_eq!(report.errors["x.py"], Vec::<Finding>::new());
    }
}
