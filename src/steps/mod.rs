//! Concrete installation steps
//!
//! One module per step; `all_steps` is the single place where pipeline
//! topology is declared.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::pipeline::Step;

pub mod bootstrap;
pub mod config_files;
pub mod dependencies;
pub mod devcontainer;
pub mod environment;
pub mod finalize;
pub mod git_setup;
pub mod migration;
pub mod preflight;
pub mod premium;
pub mod shell_config;
pub mod workspace_files;

pub use bootstrap::BootstrapStep;
pub use config_files::ConfigFilesStep;
pub use dependencies::DependenciesStep;
pub use devcontainer::DevcontainerStep;
pub use environment::EnvironmentStep;
pub use finalize::FinalizeStep;
pub use git_setup::GitSetupStep;
pub use migration::MigrationStep;
pub use preflight::PreflightStep;
pub use premium::PremiumStep;
pub use shell_config::ShellConfigStep;
pub use workspace_files::WorkspaceFilesStep;

/// All installation steps in execution order.
///
/// The order is a dependency order: preflight first; the devcontainer offer
/// before anything touches the project; git setup before tools that require a
/// repository; payload files before config generation that reads installed
/// templates; shell config near the end; finalize last.
pub fn all_steps() -> Vec<Box<dyn Step>> {
    vec![
        Box::new(PreflightStep),
        Box::new(DevcontainerStep),
        Box::new(BootstrapStep),
        Box::new(MigrationStep),
        Box::new(GitSetupStep),
        Box::new(WorkspaceFilesStep),
        Box::new(ConfigFilesStep),
        Box::new(DependenciesStep),
        Box::new(EnvironmentStep),
        Box::new(PremiumStep),
        Box::new(ShellConfigStep),
        Box::new(FinalizeStep),
    ]
}

/// Recursive directory copy used by the backup-taking steps.
pub(crate) fn copy_dir_all(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).with_context(|| format!("Could not create {}", dst.display()))?;
    for entry in fs::read_dir(src).with_context(|| format!("Could not read {}", src.display()))? {
        let entry = entry?;
        let dest_path = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_all(&entry.path(), &dest_path)?;
        } else {
            fs::copy(entry.path(), &dest_path)
                .with_context(|| format!("Could not copy {}", entry.path().display()))?;
        }
    }
    Ok(())
}
