//! Migration: flatten the old nested rules layout from pre-0.3 installs

use std::fs;
use std::path::Path;

use serde_json::json;

use crate::context::InstallContext;
use crate::errors::InstallError;
use crate::pipeline::Step;

/// Whether the project still uses the old nested `rules/standard/<topic>/`
/// layout that newer tooling no longer reads.
fn needs_migration(project_dir: &Path) -> bool {
    let standard_dir = project_dir.join(".codekit/rules/standard");
    let Ok(entries) = fs::read_dir(&standard_dir) else {
        return false;
    };

    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        let hidden = path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().starts_with('.'));
        if path.is_dir() && !hidden && dir_has_markdown(&path) {
            return true;
        }
    }
    false
}

fn dir_has_markdown(dir: &Path) -> bool {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .any(|e| e.path().extension().is_some_and(|ext| ext == "md"))
}

/// Migration step: backs up the old tree, then rewrites it flattened, with
/// nested file names prefixed by their directory (`python/style.md` becomes
/// `python-style.md`).
pub struct MigrationStep;

impl MigrationStep {
    fn flatten(standard_dir: &Path, temp_dir: &Path) -> Result<usize, InstallError> {
        let io_err = |err: std::io::Error| InstallError::fatal(format!("migration failed: {err}"));
        fs::create_dir_all(temp_dir).map_err(io_err)?;

        let mut migrated = 0usize;
        for entry in fs::read_dir(standard_dir).map_err(io_err)?.filter_map(Result::ok) {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if path.is_dir() && !name.starts_with('.') {
                for file in walkdir::WalkDir::new(&path)
                    .into_iter()
                    .filter_map(Result::ok)
                    .filter(|e| e.file_type().is_file())
                    .filter(|e| e.path().extension().is_some_and(|ext| ext == "md"))
                {
                    let relative = file
                        .path()
                        .strip_prefix(&path)
                        .unwrap_or(file.path());
                    let parts: Vec<String> = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().to_string())
                        .collect();
                    let new_name = format!("{}-{}", name, parts.join("-"));
                    fs::copy(file.path(), temp_dir.join(new_name)).map_err(io_err)?;
                    migrated += 1;
                }
            } else if path.is_file() {
                fs::copy(&path, temp_dir.join(&name)).map_err(io_err)?;
                migrated += 1;
            }
        }
        Ok(migrated)
    }
}

impl Step for MigrationStep {
    fn name(&self) -> &'static str {
        "migration"
    }

    fn check(&self, ctx: &InstallContext) -> bool {
        !needs_migration(&ctx.project_dir)
    }

    fn run(&self, ctx: &mut InstallContext) -> Result<(), InstallError> {
        let ui = ctx.ui.clone();
        let rules_dir = ctx.project_dir.join(".codekit/rules");
        let standard_dir = rules_dir.join("standard");

        if !standard_dir.exists() {
            return Ok(());
        }

        if let Some(ui) = &ui {
            ui.section("Migration Required");
            ui.status("Migrating from old directory structure...");
        }

        let backup_dir = rules_dir.join(".standard_backup");
        if !backup_dir.exists() {
            super::copy_dir_all(&standard_dir, &backup_dir)
                .map_err(|err| InstallError::fatal(format!("migration backup failed: {err:#}")))?;
            ctx.config.insert(
                "migration_backup".into(),
                json!(backup_dir.to_string_lossy()),
            );
        }

        let temp_dir = rules_dir.join(".migration_temp");
        let migrated = Self::flatten(&standard_dir, &temp_dir)?;

        if migrated > 0 {
            fs::remove_dir_all(&standard_dir)
                .map_err(|err| InstallError::fatal(format!("migration failed: {err}")))?;
            fs::rename(&temp_dir, &standard_dir)
                .map_err(|err| InstallError::fatal(format!("migration failed: {err}")))?;
            if let Some(ui) = &ui {
                ui.success(&format!("Migrated {} files", migrated));
            }
        } else if temp_dir.exists() {
            let _ = fs::remove_dir_all(&temp_dir);
        }

        if let Some(ui) = &ui {
            ui.success("Migration complete");
        }
        Ok(())
    }

    fn rollback(&self, ctx: &InstallContext) -> Result<(), InstallError> {
        let Some(backup_path) = ctx.config_str("migration_backup") else {
            return Ok(());
        };
        let backup = Path::new(backup_path);
        let standard_dir = ctx.project_dir.join(".codekit/rules/standard");

        if backup.exists() {
            if standard_dir.exists() {
                fs::remove_dir_all(&standard_dir)
                    .map_err(|err| InstallError::Recoverable(err.to_string()))?;
            }
            fs::rename(backup, &standard_dir)
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

    fn seed_old_layout(project: &Path) {
        let standard = project.join(".codekit/rules/standard");
        fs::create_dir_all(standard.join("python")).unwrap();
        fs::write(standard.join("python/style.md"), "# style").unwrap();
        fs::write(standard.join("base.md"), "# base").unwrap();
    }

    #[test]
    fn check_is_satisfied_without_old_layout() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_for(dir.path());
        assert!(MigrationStep.check(&ctx));

        // Flat files alone do not need migration.
        fs::create_dir_all(dir.path().join(".codekit/rules/standard")).unwrap();
        fs::write(
            dir.path().join(".codekit/rules/standard/base.md"),
            "# base",
        )
        .unwrap();
        assert!(MigrationStep.check(&ctx));
    }

    #[test]
    fn check_detects_nested_layout() {
        let dir = tempfile::tempdir().unwrap();
        seed_old_layout(dir.path());
        let ctx = ctx_for(dir.path());
        assert!(!MigrationStep.check(&ctx));
    }

    #[test]
    fn run_flattens_nested_rules() {
        let dir = tempfile::tempdir().unwrap();
        seed_old_layout(dir.path());
        let mut ctx = ctx_for(dir.path());

        MigrationStep.run(&mut ctx).unwrap();

        let standard = dir.path().join(".codekit/rules/standard");
        assert!(standard.join("python-style.md").exists());
        assert!(standard.join("base.md").exists());
        assert!(!standard.join("python").exists());
        assert!(MigrationStep.check(&ctx));
    }

    #[test]
    fn rollback_restores_old_layout() {
        let dir = tempfile::tempdir().unwrap();
        seed_old_layout(dir.path());
        let mut ctx = ctx_for(dir.path());

        MigrationStep.run(&mut ctx).unwrap();
        MigrationStep.rollback(&ctx).unwrap();

        let standard = dir.path().join(".codekit/rules/standard");
        assert!(standard.join("python/style.md").exists());
    }
}
