use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "lintable")]
#[command(version, about = "Lint the files a commit changed, next to their baseline versions")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Settings file. Defaults to ./lintable.toml when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Clone a repository, extract a commit's changed files and lint them
    Run(RunArgs),
    /// View, validate or create the settings file
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Repository URL or local path to clone
    pub repo: String,

    /// Commit to review. Defaults to the most recent merge reachable from HEAD.
    pub target: Option<String>,

    /// Commit to compare against. Defaults to the target's first parent.
    pub baseline: Option<String>,

    /// Run root holding repo/, a/ and b/
    #[arg(long)]
    pub local_path: Option<PathBuf>,

    /// Linter command line, run once per file
    #[arg(long)]
    pub lint_cmd: Option<String>,

    /// Baseline file selection: absent or present
    #[arg(long)]
    pub baseline_selection: Option<String>,

    /// Directory for run audit records
    #[arg(long)]
    pub audit_dir: Option<PathBuf>,

    /// Disable the progress display
    #[arg(long)]
    pub no_progress: bool,

    /// Print the outcome as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective settings
    Show,
    /// Check that the settings resolve and the lint command parses
    Validate,
    /// Write lintable.toml with the default settings
    Init,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "lintable=debug" } else { "lintable=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Run(args) => cmd::cmd_run(&cli, args)?,
        Commands::Config { command } => cmd::cmd_config(&cli, command.clone())?,
    }

    Ok(())
}
