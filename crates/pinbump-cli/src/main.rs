mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "pinbump",
    about = "Keep a cookiecutter template's pinned dependencies and CI actions current",
    version,
    propagate_version = true
)]
struct Cli {
    /// Template root (default: auto-detect from cookiecutter.json or .git/)
    #[arg(long, global = true, env = "PINBUMP_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Log progress details to stderr
    #[arg(long, global = true, short = 'v')]
    verbose: bool,

    /// Token sent to the GitHub API to raise the rate limit
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Bump pinned dependencies, workflow actions and pre-commit hooks (default)
    Update {
        /// Show what would change without validating or writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Inspect and validate pinbump.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        None => cmd::update::run(&root, cli.github_token, false, cli.json),
        Some(Commands::Update { dry_run }) => {
            cmd::update::run(&root, cli.github_token, dry_run, cli.json)
        }
        Some(Commands::Config { subcommand }) => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
