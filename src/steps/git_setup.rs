//! Git setup: ensure a repository exists and ignore generated files
//!
//! Runs before the dependency step because some of the installed linters
//! refuse to operate outside a git repository.

use std::fs;
use std::path::Path;

use serde_json::json;

use crate::context::InstallContext;
use crate::errors::InstallError;
use crate::pipeline::Step;
use crate::platform;
use crate::runner;

const GITIGNORE_MARKER: &str = "# Codekit generated files";

const IGNORE_ENTRIES: &[&str] = &[
    ".env",
    ".codekit/settings.local.json",
    ".codekit.backup.*/",
];

fn gitignore_has_marker(gitignore: &Path) -> bool {
    fs::read_to_string(gitignore)
        .map(|content| content.contains(GITIGNORE_MARKER))
        .unwrap_or(false)
}

fn ignore_block() -> String {
    format!("{}\n{}\n", GITIGNORE_MARKER, IGNORE_ENTRIES.join("\n"))
}

/// Remove the managed block (marker line plus its entries) from content.
fn strip_ignore_block(content: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut in_block = false;
    for line in content.lines() {
        if line.trim() == GITIGNORE_MARKER {
            in_block = true;
            continue;
        }
        if in_block {
            if IGNORE_ENTRIES.contains(&line.trim()) || line.trim().is_empty() {
                continue;
            }
            in_block = false;
        }
        lines.push(line);
    }
    let mut result = lines.join("\n");
    if content.ends_with('\n') && !result.is_empty() {
        result.push('\n');
    }
    result
}

pub struct GitSetupStep;

impl Step for GitSetupStep {
    fn name(&self) -> &'static str {
        "git_setup"
    }

    fn check(&self, ctx: &InstallContext) -> bool {
        ctx.project_dir.join(".git").exists()
            && gitignore_has_marker(&ctx.project_dir.join(".gitignore"))
    }

    fn run(&self, ctx: &mut InstallContext) -> Result<(), InstallError> {
        let ui = ctx.ui.clone();

        if !platform::command_exists("git") {
            if let Some(ui) = &ui {
                ui.warning("git not found - skipping repository setup");
            }
            return Ok(());
        }

        if !ctx.project_dir.join(".git").exists() {
            let proceed = match &ui {
                Some(ui) => ui
                    .confirm("Initialize a git repository here?", true)
                    .unwrap_or(true),
                None => true,
            };
            if proceed {
                if let Some(ui) = &ui {
                    ui.status("Initializing git repository...");
                }
                let project = ctx.project_dir.to_string_lossy().to_string();
                if runner::run_quiet("git", &["-C", &project, "init"]) {
                    if let Some(ui) = &ui {
                        ui.success("Initialized git repository");
                    }
                } else if let Some(ui) = &ui {
                    ui.warning("Could not initialize git repository");
                }
            }
        }

        let gitignore = ctx.project_dir.join(".gitignore");
        if !gitignore_has_marker(&gitignore) {
            let mut content = fs::read_to_string(&gitignore).unwrap_or_default();
            if !content.is_empty() && !content.ends_with('\n') {
                content.push('\n');
            }
            content.push('\n');
            content.push_str(&ignore_block());

            fs::write(&gitignore, content)
                .map_err(|err| InstallError::Config(format!("could not update .gitignore: {err}")))?;
            ctx.config.insert("gitignore_updated".into(), json!(true));
            if let Some(ui) = &ui {
                ui.success("Updated .gitignore");
            }
        }

        Ok(())
    }

    fn rollback(&self, ctx: &InstallContext) -> Result<(), InstallError> {
        if !ctx.config_flag("gitignore_updated") {
            return Ok(());
        }
        let gitignore = ctx.project_dir.join(".gitignore");
        let Ok(content) = fs::read_to_string(&gitignore) else {
            return Ok(());
        };
        fs::write(&gitignore, strip_ignore_block(&content))
            .map_err(|err| InstallError::Recoverable(err.to_string()))?;
        Ok(())
    }
}
