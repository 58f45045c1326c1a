//! Project .env scaffolding
//!
//! Interactively collects service credentials and writes them to `.env`.
//! Keys the file already defines are never asked for again, and blank
//! answers are simply left out.

use std::fs;
use std::path::Path;

use serde_json::json;

use crate::context::InstallContext;
use crate::errors::InstallError;
use crate::pipeline::Step;

/// (variable, prompt) pairs offered during setup.
const ENV_KEYS: &[(&str, &str)] = &[
    ("CODEKIT_API_KEY", "Codekit API key (optional)"),
    ("SEARCH_API_KEY", "Web search API key (optional)"),
];

fn defined_keys(env_file: &Path) -> Vec<String> {
    let Ok(content) = fs::read_to_string(env_file) else {
        return Vec::new();
    };
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            line.split('=').next().map(|k| k.trim().to_string())
        })
        .collect()
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(meta) = fs::metadata(path) {
        let mut perms = meta.permissions();
        perms.set_mode(0o600);
        let _ = fs::set_permissions(path, perms);
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}

pub struct EnvironmentStep;

impl Step for EnvironmentStep {
    fn name(&self) -> &'static str {
        "environment"
    }

    fn check(&self, ctx: &InstallContext) -> bool {
        if ctx.skip_env {
            return true;
        }
        let existing = defined_keys(&ctx.project_dir.join(".env"));
        ENV_KEYS.iter().all(|(key, _)| existing.contains(&(*key).to_string()))
    }

    fn run(&self, ctx: &mut InstallContext) -> Result<(), InstallError> {
        let ui = ctx.ui.clone();

        // Credentials cannot be collected without a user at the keyboard.
        if ctx.non_interactive {
            if let Some(ui) = &ui {
                ui.info("Non-interactive run, skipping .env setup");
            }
            return Ok(());
        }
        let Some(ui) = ui else {
            return Ok(());
        };

        let env_file = ctx.project_dir.join(".env");
        let created = !env_file.exists();
        let existing = defined_keys(&env_file);
        let mut additions = String::new();

        for (key, prompt) in ENV_KEYS {
            if existing.contains(&(*key).to_string()) {
                continue;
            }
            let value = ui
                .input(prompt, "")
                .map_err(|err| InstallError::Recoverable(err.to_string()))?;
            if !value.trim().is_empty() {
                additions.push_str(&format!("{}={}\n", key, value.trim()));
            }
        }

        if additions.is_empty() {
            return Ok(());
        }

        let mut content = fs::read_to_string(&env_file).unwrap_or_default();
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(&additions);
        fs::write(&env_file, content)
            .map_err(|err| InstallError::Config(format!("could not write .env: {err}")))?;
        restrict_permissions(&env_file);

        if created {
            ctx.config.insert("env_created".into(), json!(true));
        }
        ui.success("Wrote .env");
        Ok(())
    }

    fn rollback(&self, ctx: &InstallContext) -> Result<(), InstallError> {
        if !ctx.config_flag("env_created") {
            return Ok(());
        }
        let env_file = ctx.project_dir.join(".env");
        if env_file.exists() {
            fs::remove_file(&env_file)
                .map_err(|err| InstallError::Recoverable(err.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn defined_keys_parses_assignments() {
        let dir = tempfile::tempdir().unwrap();
        let env = dir.path().join(".env");
        fs::write(&env, "# comment\nCODEKIT_API_KEY=abc\n\nOTHER = x\n").unwrap();
        assert_eq!(defined_keys(&env), vec!["CODEKIT_API_KEY", "OTHER"]);
    }

    #[test]
    fn check_satisfied_when_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = InstallContext::new(dir.path().to_path_buf(), PathBuf::from("/tmp"));
        ctx.skip_env = true;
        assert!(EnvironmentStep.check(&ctx));
    }

    #[test]
    fn check_satisfied_when_all_keys_defined() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = InstallContext::new(dir.path().to_path_buf(), PathBuf::from("/tmp"));
        assert!(!EnvironmentStep.check(&ctx));

        fs::write(
            dir.path().join(".env"),
            "CODEKIT_API_KEY=a\nSEARCH_API_KEY=b\n",
        )
        .unwrap();
        assert!(EnvironmentStep.check(&ctx));
    }

    #[test]
    fn non_interactive_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = InstallContext::new(dir.path().to_path_buf(), PathBuf::from("/tmp"));
        ctx.non_interactive = true;
        EnvironmentStep.run(&mut ctx).unwrap();
        assert!(!dir.path().join(".env").exists());
    }

    #[test]
    fn rollback_removes_env_only_when_created_here() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".env"), "CODEKIT_API_KEY=a\n").unwrap();

        let ctx = InstallContext::new(dir.path().to_path_buf(), PathBuf::from("/tmp"));
        EnvironmentStep.rollback(&ctx).unwrap();
        assert!(dir.path().join(".env").exists());

        let mut ctx = InstallContext::new(dir.path().to_path_buf(), PathBuf::from("/tmp"));
        ctx.config.insert("env_created".into(), json!(true));
        EnvironmentStep.rollback(&ctx).unwrap();
        assert!(!dir.path().join(".env").exists());
    }
}
