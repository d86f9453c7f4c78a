//! Runtime settings.
//!
//! Resolved once per process in layers: built-in defaults, then
//! `lintable.toml`, then the environment (after loading `.env`), then CLI
//! flags applied by the caller.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::extract::BaselineSelection;

pub const DEFAULT_CONFIG_FILE: &str = "lintable.toml";

pub const ENV_LOCAL_PATH: &str = "LINTABLE_LOCAL_PATH";
pub const ENV_BROKER: &str = "CELERY_BROKER";
pub const ENV_BACKEND: &str = "CELERY_BACKEND";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_AUDIT_DIR: &str = "LINTABLE_AUDIT_DIR";
pub const ENV_LINT_CMD: &str = "LINTABLE_LINT_CMD";
pub const ENV_BASELINE_SELECTION: &str = "LINTABLE_BASELINE_SELECTION";

/// The `lintable.toml` file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub run: RunSection,
    #[serde(default)]
    pub services: ServicesSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSection {
    pub local_path: Option<PathBuf>,
    pub audit_dir: Option<PathBuf>,
    pub lint_command: Option<String>,
    pub baseline_selection: Option<BaselineSelection>,
}

/// Task-queue and database endpoints used by the deployment wrapper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServicesSection {
    pub broker_url: Option<String>,
    pub result_backend: Option<String>,
    pub database_url: Option<String>,
}

impl SettingsFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse lintable.toml")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize lintable.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Load `path` if it exists, otherwise an empty file.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

impl From<&Settings> for SettingsFile {
    fn from(settings: &Settings) -> Self {
        Self {
            run: RunSection {
                local_path: settings.local_path.clone(),
                audit_dir: Some(settings.audit_dir.clone()),
                lint_command: Some(settings.lint_command.clone()),
                baseline_selection: Some(settings.baseline_selection),
            },
            services: ServicesSection {
                broker_url: Some(settings.broker_url.clone()),
                result_backend: Some(settings.result_backend.clone()),
                database_url: Some(settings.database_url.clone()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Run root. `None` means a fresh directory under the system temp dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
    pub broker_url: String,
    pub result_backend: String,
    pub database_url: String,
    pub audit_dir: PathBuf,
    pub lint_command: String,
    pub baseline_selection: BaselineSelection,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            local_path: None,
            broker_url: "amqp://".to_string(),
            result_backend: "redis://".to_string(),
            database_url: "postgres://user@localhost:5432/postgres".to_string(),
            audit_dir: PathBuf::from(".lintable/audit"),
            lint_command: "flake8".to_string(),
            baseline_selection: BaselineSelection::default(),
        }
    }
}

impl Settings {
    /// Resolve settings from the process environment.
    ///
    /// `config_file` must exist when given; otherwise `lintable.toml` in the
    /// working directory is used if present.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();
        let file = match config_file {
            Some(path) => SettingsFile::load(path)?,
            None => SettingsFile::load_or_default(Path::new(DEFAULT_CONFIG_FILE))?,
        };
        Self::from_lookup(&file, |key| std::env::var(key).ok())
    }

    /// Resolve settings from a parsed file and an environment lookup.
    pub fn from_lookup<F>(file: &SettingsFile, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        settings.apply_file(file);
        settings.apply_env(lookup)?;
        Ok(settings)
    }

    fn apply_file(&mut self, file: &SettingsFile) {
        let run = &file.run;
        if let Some(path) = &run.local_path {
            self.local_path = Some(path.clone());
        }
        if let Some(dir) = &run.audit_dir {
            self.audit_dir = dir.clone();
        }
        if let Some(cmd) = &run.lint_command {
            self.lint_command = cmd.clone();
        }
        if let Some(selection) = run.baseline_selection {
            self.baseline_selection = selection;
        }

        let services = &file.services;
        if let Some(url) = &services.broker_url {
            self.broker_url = url.clone();
        }
        if let Some(url) = &services.result_backend {
            self.result_backend = url.clone();
        }
        if let Some(url) = &services.database_url {
            self.database_url = url.clone();
        }
    }

    fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = get(ENV_LOCAL_PATH) {
            self.local_path = Some(PathBuf::from(path));
        }
        if let Some(url) = get(ENV_BROKER) {
            self.broker_url = url;
        }
        if let Some(url) = get(ENV_BACKEND) {
            self.result_backend = url;
        }
        if let Some(url) = get(ENV_DATABASE_URL) {
            self.database_url = url;
        }
        if let Some(dir) = get(ENV_AUDIT_DIR) {
            self.audit_dir = PathBuf::from(dir);
        }
        if let Some(cmd) = get(ENV_LINT_CMD) {
            self.lint_command = cmd;
        }
        if let Some(selection) = get(ENV_BASELINE_SELECTION) {
            self.baseline_selection = selection
                .parse()
                .with_context(|| format!("Invalid {}", ENV_BASELINE_SELECTION))?;
        }
        Ok(())
    }

    /// Run root for `run_id`: the configured path, or `<tmp>/lintable-<run_id>`.
    pub fn local_path_for(&self, run_id: Uuid) -> PathBuf {
        self.local_path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(format!("lintable-{}", run_id)))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize settings")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(&SettingsFile::default(), env(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.broker_url, "amqp://");
        assert_eq!(settings.result_backend, "redis://");
        assert_eq!(
            settings.database_url,
            "postgres://user@localhost:5432/postgres"
        );
        assert_eq!(settings.lint_command, "flake8");
        assert_eq!(
            settings.baseline_selection,
            BaselineSelection::AbsentFromBaseline
        );
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file = SettingsFile::parse(
            r#"
[run]
lint_command = "pylint --disable=all"
baseline_selection = "present"

[services]
broker_url = "amqp://queue:5672"
"#,
        )
        .unwrap();
        let settings = Settings::from_lookup(&file, env(&[])).unwrap();
        assert_eq!(settings.lint_command, "pylint --disable=all");
        assert_eq!(
            settings.baseline_selection,
            BaselineSelection::PresentInBaseline
        );
        assert_eq!(settings.broker_url, "amqp://queue:5672");
        assert_eq!(settings.result_backend, "redis://");
    }

    #[test]
    fn test_env_overrides_file() {
        let file = SettingsFile::parse("[run]\nlint_command = \"pylint\"\n").unwrap();
        let settings = Settings::from_lookup(
            &file,
            env(&[
                (ENV_LINT_CMD, "ruff check"),
                (ENV_DATABASE_URL, "postgres://db/lint"),
                (ENV_LOCAL_PATH, "/srv/lint/run"),
            ]),
        )
        .unwrap();
        assert_eq!(settings.lint_command, "ruff check");
        assert_eq!(settings.database_url, "postgres://db/lint");
        assert_eq!(settings.local_path, Some(PathBuf::from("/srv/lint/run")));
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let settings =
            Settings::from_lookup(&SettingsFile::default(), env(&[(ENV_BROKER, "  ")])).unwrap();
        assert_eq!(settings.broker_url, "amqp://");
    }

    #[test]
    fn test_invalid_baseline_selection_is_rejected() {
        let result = Settings::from_lookup(
            &SettingsFile::default(),
            env(&[(ENV_BASELINE_SELECTION, "sideways")]),
        );
        let err = result.unwrap_err();
        assert!(format!("{:#}", err).contains("sideways"));
    }

    #[test]
    fn test_local_path_for_defaults_to_temp_dir() {
        let settings = Settings::default();
        let id = Uuid::new_v4();
        let path = settings.local_path_for(id);
        assert!(path.starts_with(std::env::temp_dir()));
        assert!(path.ends_with(format!("lintable-{}", id)));

        let fixed = Settings {
            local_path: Some(PathBuf::from("/data/run")),
            ..Settings::default()
        };
        assert_eq!(fixed.local_path_for(id), PathBuf::from("/data/run"));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = TempDir::new().unwrap();
        let file = SettingsFile::load_or_default(&dir.path().join("lintable.toml")).unwrap();
        assert_eq!(file, SettingsFile::default());
    }

    #[test]
    fn test_saved_defaults_load_back_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lintable.toml");
        SettingsFile::from(&Settings::default()).save(&path).unwrap();

        let file = SettingsFile::load(&path).unwrap();
        let settings = Settings::from_lookup(&file, env(&[])).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_parse_rejects_malformed_toml() {
        assert!(SettingsFile::parse("[run\nlint_command = 1").is_err());
    }

    #[test]
    fn test_to_toml_omits_unset_local_path() {
        let text = Settings::default().to_toml().unwrap();
        assert!(text.contains("lint_command = \"flake8\""));
        assert!(text.contains("baseline_selection = \"absent\""));
        assert!(!text.contains("local_path"));
    }
}
