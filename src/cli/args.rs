//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Strata - incremental container image builds
///
/// Builds images from git source trees in cached stages. Unchanged stages
/// are reused; new commits land as small patch layers.
#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "STRATA_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the project image, reusing cached stages
    Build(BuildArgs),

    /// Show stage signatures and tags without building
    Plan(PlanArgs),

    /// Inspect or clear the commit ledger
    Ledger(LedgerArgs),

    /// Inspect or create the sidecar tooling container
    Sidecar(SidecarArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Project selection shared by project commands
#[derive(Parser, Debug, Clone)]
pub struct ProjectArgs {
    /// Project directory (defaults to current directory; parents are searched)
    #[arg(short, long)]
    pub project: Option<PathBuf>,
}

/// Arguments for the build command
#[derive(Parser, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}

/// Arguments for the plan command
#[derive(Parser, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the ledger command
#[derive(Parser, Debug)]
pub struct LedgerArgs {
    #[command(subcommand)]
    pub action: LedgerAction,
}

/// Ledger subcommands
#[derive(Subcommand, Debug)]
pub enum LedgerAction {
    /// List recorded layer commits
    List {
        #[command(flatten)]
        project: ProjectArgs,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove every recorded layer commit
    Clear {
        #[command(flatten)]
        project: ProjectArgs,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for the sidecar command
#[derive(Parser, Debug)]
pub struct SidecarArgs {
    #[command(subcommand)]
    pub action: SidecarAction,
}

/// Sidecar subcommands
#[derive(Subcommand, Debug)]
pub enum SidecarAction {
    /// Show whether the sidecar exists
    Status,

    /// Create the sidecar if it does not exist
    Ensure,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}
