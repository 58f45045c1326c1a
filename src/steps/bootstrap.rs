//! Bootstrap: upgrade detection, backup, directory skeleton

use std::fs;
use std::path::Path;

use chrono::Local;
use serde_json::json;

use crate::context::InstallContext;
use crate::errors::InstallError;
use crate::pipeline::Step;

const VERSION_FILE: &str = ".codekit/.installer-version";

const SUBDIRS: &[&str] = &[
    "rules/standard",
    "rules/custom",
    "hooks",
    "commands",
    "skills",
];

fn installed_version(project_dir: &Path) -> Option<String> {
    let version_file = project_dir.join(VERSION_FILE);
    fs::read_to_string(version_file)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn save_version(project_dir: &Path) {
    let version_file = project_dir.join(VERSION_FILE);
    if let Err(err) = fs::write(&version_file, env!("CARGO_PKG_VERSION")) {
        log::debug!("could not write version file: {}", err);
    }
}

/// Bootstrap step. Always runs: detects fresh install vs upgrade, backs up an
/// existing `.codekit/` directory, and creates the directory skeleton.
pub struct BootstrapStep;

impl Step for BootstrapStep {
    fn name(&self) -> &'static str {
        "bootstrap"
    }

    fn run(&self, ctx: &mut InstallContext) -> Result<(), InstallError> {
        let ui = ctx.ui.clone();
        let kit_dir = ctx.project_dir.join(".codekit");

        let is_upgrade = kit_dir.exists();
        if is_upgrade {
            let old_version = installed_version(&ctx.project_dir);
            if let Some(ui) = &ui {
                match &old_version {
                    Some(old) => ui.info(&format!(
                        "Upgrade detected: {} → {}",
                        old,
                        env!("CARGO_PKG_VERSION")
                    )),
                    None => ui.status(&format!(
                        "Detected existing installation at {}",
                        kit_dir.display()
                    )),
                }
            }

            let backup_name = format!(
                ".codekit.backup.{}",
                Local::now().format("%Y%m%d_%H%M%S")
            );
            let backup_path = ctx.project_dir.join(&backup_name);
            if let Some(ui) = &ui {
                ui.status(&format!("Creating backup at {}...", backup_name));
            }

            match super::copy_dir_all(&kit_dir, &backup_path) {
                Ok(()) => {
                    ctx.config.insert(
                        "backup_path".into(),
                        json!(backup_path.to_string_lossy()),
                    );
                    if let Some(ui) = &ui {
                        ui.success(&format!("Backup created: {}", backup_name));
                    }
                }
                Err(err) => {
                    // A failed backup downgrades to a warning; the install
                    // itself can still proceed.
                    if let Some(ui) = &ui {
                        ui.warning(&format!("Could not create backup: {:#}", err));
                    }
                }
            }
            ctx.config.insert("is_upgrade".into(), json!(true));
        } else {
            if let Some(ui) = &ui {
                ui.status("Fresh installation detected");
            }
            ctx.config.insert("is_upgrade".into(), json!(false));
        }

        for subdir in SUBDIRS {
            fs::create_dir_all(kit_dir.join(subdir)).map_err(|err| {
                InstallError::fatal(format!(
                    "could not create {}: {}",
                    kit_dir.join(subdir).display(),
                    err
                ))
            })?;
        }

        save_version(&ctx.project_dir);

        if let Some(ui) = &ui {
            ui.success("Directory structure created");
        }
        Ok(())
    }

    fn rollback(&self, ctx: &InstallContext) -> Result<(), InstallError> {
        let Some(backup_path) = ctx.config_str("backup_path") else {
            return Ok(());
        };
        let backup = Path::new(backup_path);
        let kit_dir = ctx.project_dir.join(".codekit");

        if backup.exists() {
            if kit_dir.exists() {
                fs::remove_dir_all(&kit_dir)
                    .map_err(|err| InstallError::Recoverable(err.to_string()))?;
            }
            fs::rename(backup, &kit_dir)
                .map_err(|err| InstallError::Recoverable(err.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn ctx_for(dir: &Path) -> InstallContext {
        InstallContext::new(dir.to_path_buf(), PathBuf::from("/tmp"))
    }

    #[test]
    fn fresh_install_creates_skeleton() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = ctx_for(dir.path());

        BootstrapStep.run(&mut ctx).unwrap();

        assert!(!ctx.config_flag("is_upgrade"));
        for subdir in SUBDIRS {
            assert!(dir.path().join(".codekit").join(subdir).is_dir());
        }
        assert_eq!(
            installed_version(dir.path()).as_deref(),
            Some(env!("CARGO_PKG_VERSION"))
        );
    }

    #[test]
    fn existing_install_is_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".codekit/rules")).unwrap();
        fs::write(dir.path().join(".codekit/rules/old.md"), "old").unwrap();

        let mut ctx = ctx_for(dir.path());
        BootstrapStep.run(&mut ctx).unwrap();

        assert!(ctx.config_flag("is_upgrade"));
        let backup_path = ctx.config_str("backup_path").unwrap().to_string();
        assert!(Path::new(&backup_path).join("rules/old.md").exists());
    }

    #[test]
    fn rollback_restores_backup() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".codekit")).unwrap();
        fs::write(dir.path().join(".codekit/marker"), "original").unwrap();

        let mut ctx = ctx_for(dir.path());
        BootstrapStep.run(&mut ctx).unwrap();

        // Simulate later steps clobbering the payload.
        fs::write(dir.path().join(".codekit/marker"), "clobbered").unwrap();

        BootstrapStep.rollback(&ctx).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join(".codekit/marker")).unwrap(),
            "original"
        );
    }

    #[test]
    fn rollback_without_backup_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_for(dir.path());
        BootstrapStep.rollback(&ctx).unwrap();
    }
}
