//! Final verification and the closing summary
//!
//! Always runs. Confirms the payload landed, reports the agent CLI version
//! when it can be detected, and prints the next-steps panel.

use regex::Regex;

use crate::context::InstallContext;
use crate::errors::InstallError;
use crate::pipeline::Step;
use crate::platform;
use crate::runner;

/// Version of the installed agent CLI, parsed from `ck --version` output.
/// Detection failures fall back to the installer's own version.
fn agent_cli_version() -> String {
    let fallback = || env!("CARGO_PKG_VERSION").to_string();

    if !platform::command_exists("ck") {
        return fallback();
    }
    let Ok(output) = runner::run_capture("ck", &["--version"]) else {
        return fallback();
    };
    // Output shapes vary across releases; take the first semver-looking token.
    match Regex::new(r"\d+\.\d+\.\d+(?:-[\w.]+)?") {
        Ok(re) => re
            .find(&output)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(fallback),
        Err(_) => fallback(),
    }
}

fn missing_payload(ctx: &InstallContext) -> Vec<&'static str> {
    [
        ".codekit/rules/standard",
        ".codekit/settings.local.json",
        ".codekit/.installer-version",
    ]
    .into_iter()
    .filter(|rel| !ctx.project_dir.join(rel).exists())
    .collect()
}

pub struct FinalizeStep;

impl Step for FinalizeStep {
    fn name(&self) -> &'static str {
        "finalize"
    }

    fn run(&self, ctx: &mut InstallContext) -> Result<(), InstallError> {
        let ui = ctx.ui.clone();

        let missing = missing_payload(ctx);
        if !missing.is_empty() {
            return Err(InstallError::fatal(format!(
                "installation incomplete, missing: {}",
                missing.join(", ")
            )));
        }

        let Some(ui) = ui else {
            return Ok(());
        };

        let version = agent_cli_version();
        ui.success(&format!("Installation complete (agent CLI {version})"));

        let mut steps: Vec<(String, String)> = Vec::new();
        if ctx.config_flag("is_upgrade") {
            steps.push((
                "Review the upgrade".to_string(),
                "Your previous setup was backed up next to .codekit/".to_string(),
            ));
        } else {
            steps.push((
                "Open a new shell".to_string(),
                "Reload your shell config to pick up the ck alias".to_string(),
            ));
            steps.push((
                "Add project rules".to_string(),
                "Drop markdown files into .codekit/rules/custom/".to_string(),
            ));
        }
        steps.push((
            "Start the agent".to_string(),
            "Run `ck` in this directory".to_string(),
        ));
        ui.next_steps(&steps);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn complete_project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".codekit/rules/standard")).unwrap();
        fs::write(dir.path().join(".codekit/settings.local.json"), "{}").unwrap();
        fs::write(dir.path().join(".codekit/.installer-version"), "0.4.1\n").unwrap();
        dir
    }

    #[test]
    fn run_passes_on_a_complete_installation() {
        let dir = complete_project();
        let mut ctx = InstallContext::new(dir.path().to_path_buf(), PathBuf::from("/tmp"));
        FinalizeStep.run(&mut ctx).unwrap();
    }

    #[test]
    fn run_fails_and_names_missing_payload() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = InstallContext::new(dir.path().to_path_buf(), PathBuf::from("/tmp"));

        let err = FinalizeStep.run(&mut ctx).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains(".codekit/rules/standard"));
    }

    #[test]
    fn version_detection_has_a_fallback() {
        // `ck` is not on PATH in the test environment.
        assert_eq!(agent_cli_version(), env!("CARGO_PKG_VERSION"));
    }
}
