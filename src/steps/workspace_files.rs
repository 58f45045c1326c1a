//! Payload file installation
//!
//! Pulls every file under `.codekit/` from the source repository into the
//! project, keeps hook scripts executable, and seeds the custom rules
//! directory so it survives a git checkout.

use std::fs;
use std::path::Path;

use serde_json::json;

use crate::context::InstallContext;
use crate::downloads::{self, DownloadConfig};
use crate::errors::InstallError;
use crate::pipeline::Step;

const PAYLOAD_DIR: &str = ".codekit";

/// Human label for the progress line, keyed by payload subdirectory.
fn category_for(path: &str) -> &'static str {
    if path.starts_with(".codekit/rules/") {
        "rules"
    } else if path.starts_with(".codekit/hooks/") {
        "hooks"
    } else if path.starts_with(".codekit/commands/") {
        "commands"
    } else if path.starts_with(".codekit/skills/") {
        "skills"
    } else {
        "files"
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(meta) = fs::metadata(path) {
        let mut perms = meta.permissions();
        perms.set_mode(0o755);
        let _ = fs::set_permissions(path, perms);
    }
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}

pub struct WorkspaceFilesStep;

impl Step for WorkspaceFilesStep {
    fn name(&self) -> &'static str {
        "workspace_files"
    }

    fn run(&self, ctx: &mut InstallContext) -> Result<(), InstallError> {
        let ui = ctx.ui.clone();
        let config = DownloadConfig::for_context(ctx);

        let files = downloads::fetch_repo_files(PAYLOAD_DIR, &config);
        if files.is_empty() {
            // Nothing downstream works without the payload.
            return Err(InstallError::fatal(format!(
                "could not list payload files from {}",
                config.repo_url
            )));
        }

        let spinner = ui.as_ref().map(|ui| ui.spinner("Installing files..."));
        let mut installed: Vec<String> = Vec::new();
        let mut failed: Vec<String> = Vec::new();

        for file in &files {
            if let Some(pb) = &spinner {
                pb.set_message(format!(
                    "Installing {} ({}/{})",
                    category_for(&file.path),
                    installed.len() + failed.len() + 1,
                    files.len()
                ));
            }

            let dest = ctx.project_dir.join(&file.path);
            if !downloads::download_file(&file.path, &dest, &config) {
                failed.push(file.path.clone());
                continue;
            }
            if file.path.starts_with(".codekit/hooks/") {
                make_executable(&dest);
            }
            installed.push(file.path.clone());
        }

        if let Some(pb) = &spinner {
            pb.finish_and_clear();
        }

        // User-populated directories are never shipped with content; keep
        // them present in fresh checkouts with a .gitkeep.
        for seed in [".codekit/rules/custom", ".codekit/skills"] {
            let dir = ctx.project_dir.join(seed);
            if let Err(err) = fs::create_dir_all(&dir) {
                return Err(InstallError::Config(format!(
                    "could not create {}: {err}",
                    dir.display()
                )));
            }
            let gitkeep = dir.join(".gitkeep");
            if !gitkeep.exists() {
                if let Err(err) = fs::write(&gitkeep, "") {
                    return Err(InstallError::Config(format!(
                        "could not create {}: {err}",
                        gitkeep.display()
                    )));
                }
                installed.push(format!("{seed}/.gitkeep"));
            }
        }

        if installed.is_empty() {
            return Err(InstallError::fatal(format!(
                "no payload files could be installed from {}",
                config.repo_url
            )));
        }

        if !failed.is_empty() {
            if let Some(ui) = &ui {
                ui.warning(&format!(
                    "{} file(s) could not be fetched: {}",
                    failed.len(),
                    failed.join(", ")
                ));
            }
        }
        if let Some(ui) = &ui {
            ui.success(&format!("Installed {} files", installed.len()));
        }

        ctx.config
            .insert("installed_files".into(), json!(installed));
        Ok(())
    }

    fn rollback(&self, ctx: &InstallContext) -> Result<(), InstallError> {
        for rel in ctx.config_list("installed_files") {
            let path = ctx.project_dir.join(&rel);
            if path.is_file() {
                fs::remove_file(&path)
                    .map_err(|err| InstallError::Recoverable(err.to_string()))?;
            }
        }
        Ok(())
    }
}
