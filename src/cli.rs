use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "codekit-install")]
#[command(version)]
#[command(about = "Install the Codekit development environment", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the installation pipeline against a project directory
    Install(InstallArgs),

    /// Print the installer version
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct InstallArgs {
    /// Project directory to install into (defaults to the current directory)
    #[arg(value_name = "DIR")]
    pub project_dir: Option<PathBuf>,

    /// Never prompt; every prompt answers with its default
    #[arg(long)]
    pub non_interactive: bool,

    /// Copy payload files from a local checkout instead of downloading
    #[arg(long)]
    pub local: bool,

    /// Local checkout to copy from (implies --local)
    #[arg(long, value_name = "DIR")]
    pub local_repo_dir: Option<String>,

    /// Skip the .env credential setup
    #[arg(long)]
    pub skip_env: bool,

    /// Skip Python tooling (uv, ruff, basedpyright)
    #[arg(long)]
    pub skip_python: bool,

    /// Skip TypeScript tooling (language server)
    #[arg(long)]
    pub skip_typescript: bool,

    /// Install Go tooling (gopls)
    #[arg(long)]
    pub with_go: bool,

    /// License key for the premium binary
    #[arg(long, env = "CODEKIT_LICENSE_KEY", value_name = "KEY")]
    pub premium_key: Option<String>,
}
