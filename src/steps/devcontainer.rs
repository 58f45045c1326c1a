//! Dev container scaffolding
//!
//! Offers a `.devcontainer/` setup when running outside a container. The
//! fetched templates carry `{{PROJECT_NAME}}` and `{{PROJECT_SLUG}}`
//! placeholders that are filled in from the project directory name.

use std::fs;
use std::path::Path;

use serde_json::json;

use crate::context::InstallContext;
use crate::downloads::{self, DownloadConfig};
use crate::errors::InstallError;
use crate::pipeline::Step;

const DEVCONTAINER_FILES: &[&str] = &[
    ".devcontainer/devcontainer.json",
    ".devcontainer/Dockerfile",
    ".devcontainer/post-create.sh",
];

/// Whether the installer itself is already running inside a container.
fn in_container() -> bool {
    Path::new("/.dockerenv").exists() || Path::new("/run/.containerenv").exists()
}

fn project_name(ctx: &InstallContext) -> String {
    ctx.project_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "project".to_string())
}

/// Lowercase, with anything outside [a-z0-9] collapsed to single hyphens.
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_hyphen = true;
    for ch in name.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
            last_hyphen = false;
        } else if !last_hyphen {
            slug.push('-');
            last_hyphen = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

fn substitute_placeholders(path: &Path, name: &str, slug: &str) -> std::io::Result<()> {
    let content = fs::read_to_string(path)?;
    let rendered = content
        .replace("{{PROJECT_NAME}}", name)
        .replace("{{PROJECT_SLUG}}", slug);
    if rendered != content {
        fs::write(path, rendered)?;
    }
    Ok(())
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

pub struct DevcontainerStep;

impl Step for DevcontainerStep {
    fn name(&self) -> &'static str {
        "devcontainer"
    }

    fn check(&self, ctx: &InstallContext) -> bool {
        in_container() || ctx.project_dir.join(".devcontainer").exists()
    }

    fn run(&self, ctx: &mut InstallContext) -> Result<(), InstallError> {
        let ui = ctx.ui.clone();

        // Only offered interactively; a scripted install never wants a prompt
        // about containers it did not ask for.
        if ctx.non_interactive {
            return Ok(());
        }

        let choice = match &ui {
            Some(ui) => ui
                .select(
                    "Dev container setup",
                    &["Skip", "Create .devcontainer/ for this project"],
                )
                .unwrap_or(0),
            None => 0,
        };
        if choice == 0 {
            return Ok(());
        }

        let name = project_name(ctx);
        let slug = slugify(&name);
        let config = DownloadConfig::for_context(ctx);
        let mut failed: Vec<&str> = Vec::new();

        for repo_path in DEVCONTAINER_FILES {
            let dest = ctx.project_dir.join(repo_path);
            if !downloads::download_file(repo_path, &dest, &config) {
                failed.push(repo_path);
                continue;
            }
            if let Err(err) = substitute_placeholders(&dest, &name, &slug) {
                return Err(InstallError::Config(format!(
                    "could not render {}: {err}",
                    dest.display()
                )));
            }
            if repo_path.ends_with(".sh") {
                make_executable(&dest);
            }
        }

        if !failed.is_empty() {
            if let Some(ui) = &ui {
                ui.warning(&format!(
                    "Could not fetch dev container files: {}",
                    failed.join(", ")
                ));
            }
            return Ok(());
        }

        ctx.config.insert("devcontainer_created".into(), json!(true));
        if let Some(ui) = &ui {
            ui.success("Created .devcontainer/");
        }
        Ok(())
    }

    fn rollback(&self, ctx: &InstallContext) -> Result<(), InstallError> {
        if !ctx.config_flag("devcontainer_created") {
            return Ok(());
        }
        let dir = ctx.project_dir.join(".devcontainer");
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|err| InstallError::Recoverable(err.to_string()))?;
        }
        Ok(())
    }
}
