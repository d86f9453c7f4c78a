//! Settings view and validation commands: `lintable config`.

use anyhow::Result;
use console::style;
use std::path::{Path, PathBuf};

use lintable::config::{DEFAULT_CONFIG_FILE, Settings, SettingsFile};
use lintable::lint::CommandLinter;

use super::super::{Cli, ConfigCommands};

fn config_path(cli: &Cli) -> PathBuf {
    cli.config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

pub fn cmd_config(cli: &Cli, command: Option<ConfigCommands>) -> Result<()> {
    let path = config_path(cli);

    match command {
        None | Some(ConfigCommands::Show) => show(cli, &path),
        Some(ConfigCommands::Validate) => validate(cli, &path),
        Some(ConfigCommands::Init) => init(&path),
    }
}

fn show(cli: &Cli, path: &Path) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref())?;

    println!();
    println!("Lintable Configuration");
    println!("======================");
    println!();
    if path.exists() {
        println!("Config file: {}", path.display());
    } else {
        println!("No {} found, using defaults and environment.", path.display());
    }
    println!();
    println!("Effective values (with env overrides):");
    println!();
    print!("{}", settings.to_toml()?);
    if settings.local_path.is_none() {
        println!(
            "# local_path unset: each run uses {}",
            std::env::temp_dir().join("lintable-<run id>").display()
        );
    }
    println!();
    Ok(())
}

fn validate(cli: &Cli, path: &Path) -> Result<()> {
    println!();
    println!("Validating configuration...");
    println!();

    if !path.exists() {
        println!("No {} found. Using defaults.", path.display());
    }

    let settings = Settings::load(cli.config.as_deref())?;
    CommandLinter::new(&settings.lint_command)?;

    println!("{} Configuration is valid.", style("✓").green().bold());
    println!();
    Ok(())
}

fn init(path: &Path) -> Result<()> {
    if path.exists() {
        println!("{} already exists, leaving it unchanged.", path.display());
        return Ok(());
    }
    SettingsFile::from(&Settings::default()).save(path)?;
    println!("Created {}", path.display());
    Ok(())
}
