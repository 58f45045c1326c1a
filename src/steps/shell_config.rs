//! Shell alias installation
//!
//! Appends a marked `ck` alias block to every shell config file present in
//! the home directory. The marker keeps the block identifiable so upgrades
//! never duplicate it and rollback can strip exactly what was added.

use std::fs;
use std::path::Path;

use serde_json::json;

use crate::context::InstallContext;
use crate::errors::InstallError;
use crate::pipeline::Step;
use crate::platform;

const ALIAS_MARKER: &str = "# Codekit alias";

fn alias_block(path: &Path) -> String {
    let is_fish = path
        .to_string_lossy()
        .contains("fish");
    if is_fish {
        format!("{ALIAS_MARKER}\nalias ck \"npx -y @codekit/agent-cli\"\n")
    } else {
        format!("{ALIAS_MARKER}\nalias ck=\"npx -y @codekit/agent-cli\"\n")
    }
}

fn has_marker(path: &Path) -> bool {
    fs::read_to_string(path)
        .map(|content| content.contains(ALIAS_MARKER))
        .unwrap_or(false)
}

/// Remove the marker line and the alias line that follows it.
fn strip_alias_block(content: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut skip_next = false;
    for line in content.lines() {
        if line.trim() == ALIAS_MARKER {
            skip_next = true;
            continue;
        }
        if skip_next {
            skip_next = false;
            if line.trim_start().starts_with("alias ck") {
                continue;
            }
        }
        lines.push(line);
    }
    let mut result = lines.join("\n");
    if content.ends_with('\n') && !result.is_empty() {
        result.push('\n');
    }
    result
}

pub struct ShellConfigStep;

impl Step for ShellConfigStep {
    fn name(&self) -> &'static str {
        "shell_config"
    }

    fn check(&self, ctx: &InstallContext) -> bool {
        let configs = platform::shell_config_files(&ctx.home_dir);
        !configs.is_empty() && configs.iter().all(|path| has_marker(path))
    }

    fn run(&self, ctx: &mut InstallContext) -> Result<(), InstallError> {
        let ui = ctx.ui.clone();
        let configs = platform::shell_config_files(&ctx.home_dir);
        if configs.is_empty() {
            if let Some(ui) = &ui {
                ui.warning("No shell config files found; add the ck alias manually");
            }
            return Ok(());
        }

        let mut modified: Vec<String> = Vec::new();
        for path in &configs {
            if has_marker(path) {
                continue;
            }
            let mut content = fs::read_to_string(path).unwrap_or_default();
            if !content.is_empty() && !content.ends_with('\n') {
                content.push('\n');
            }
            content.push('\n');
            content.push_str(&alias_block(path));

            fs::write(path, content).map_err(|err| {
                InstallError::Config(format!("could not update {}: {err}", path.display()))
            })?;
            modified.push(path.to_string_lossy().to_string());
        }

        if !modified.is_empty() {
            ctx.config
                .insert("modified_shell_configs".into(), json!(modified));
            if let Some(ui) = &ui {
                ui.success("Added the ck alias to your shell");
            }
        }
        Ok(())
    }

    fn rollback(&self, ctx: &InstallContext) -> Result<(), InstallError> {
        for path in ctx.config_list("modified_shell_configs") {
            let path = Path::new(&path);
            let Ok(content) = fs::read_to_string(path) else {
                continue;
            };
            fs::write(path, strip_alias_block(&content))
                .map_err(|err| InstallError::Recoverable(err.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn home_with_bashrc() -> (tempfile::TempDir, PathBuf) {
        let home = tempfile::tempdir().unwrap();
        let bashrc = home.path().join(".bashrc");
        fs::write(&bashrc, "export PATH=$PATH:~/bin\n").unwrap();
        (home, bashrc)
    }

    #[test]
    fn run_appends_block_to_each_config_once() {
        let (home, bashrc) = home_with_bashrc();
        let mut ctx = InstallContext::new(PathBuf::from("/tmp/p"), home.path().to_path_buf());

        ShellConfigStep.run(&mut ctx).unwrap();
        let first = fs::read_to_string(&bashrc).unwrap();
        assert!(first.contains(ALIAS_MARKER));
        assert!(first.contains("alias ck="));

        ShellConfigStep.run(&mut ctx).unwrap();
        assert_eq!(first, fs::read_to_string(&bashrc).unwrap());
    }

    #[test]
    fn fish_config_gets_fish_syntax() {
        let home = tempfile::tempdir().unwrap();
        let fish_dir = home.path().join(".config/fish");
        fs::create_dir_all(&fish_dir).unwrap();
        let fish_config = fish_dir.join("config.fish");
        fs::write(&fish_config, "").unwrap();
        let mut ctx = InstallContext::new(PathBuf::from("/tmp/p"), home.path().to_path_buf());

        ShellConfigStep.run(&mut ctx).unwrap();

        let content = fs::read_to_string(&fish_config).unwrap();
        assert!(content.contains("alias ck \""));
        assert!(!content.contains("alias ck=\""));
    }

    #[test]
    fn check_requires_marker_in_every_config() {
        let (home, bashrc) = home_with_bashrc();
        let mut ctx = InstallContext::new(PathBuf::from("/tmp/p"), home.path().to_path_buf());
        assert!(!ShellConfigStep.check(&ctx));

        ShellConfigStep.run(&mut ctx).unwrap();
        assert!(ShellConfigStep.check(&ctx));

        fs::write(home.path().join(".zshrc"), "").unwrap();
        assert!(!ShellConfigStep.check(&ctx));
        let _ = bashrc;
    }

    #[test]
    fn no_configs_is_a_warning_not_an_error() {
        let home = tempfile::tempdir().unwrap();
        let mut ctx = InstallContext::new(PathBuf::from("/tmp/p"), home.path().to_path_buf());
        ShellConfigStep.run(&mut ctx).unwrap();
        assert!(ctx.config_list("modified_shell_configs").is_empty());
    }

    #[test]
    fn rollback_restores_original_content() {
        let (home, bashrc) = home_with_bashrc();
        let original = fs::read_to_string(&bashrc).unwrap();
        let mut ctx = InstallContext::new(PathBuf::from("/tmp/p"), home.path().to_path_buf());

        ShellConfigStep.run(&mut ctx).unwrap();
        ShellConfigStep.rollback(&ctx).unwrap();

        let content = fs::read_to_string(&bashrc).unwrap();
        assert!(!content.contains(ALIAS_MARKER));
        assert!(content.contains(original.trim()));
    }
}
