//! Shared installation state
//!
//! One `InstallContext` is built per run from the CLI flags and threaded
//! through every step. Steps communicate through the `config` bag; the
//! orchestrator tracks completion for rollback through `completed_steps`.

use std::collections::HashMap;
use std::path::PathBuf;

use serde_json::Value;

use crate::ui::Console;

pub struct InstallContext {
    /// Absolute path of the project being set up.
    pub project_dir: PathBuf,
    /// The user's home directory.
    pub home_dir: PathBuf,

    pub install_python: bool,
    pub install_typescript: bool,
    pub install_go: bool,

    /// Prompts answer with their defaults; nothing blocks on stdin.
    pub non_interactive: bool,
    /// Copy payload files from a local checkout instead of downloading.
    pub local_mode: bool,
    pub local_repo_dir: Option<PathBuf>,
    /// Skip the .env scaffolding step.
    pub skip_env: bool,
    pub premium_key: Option<String>,

    pub ui: Option<Console>,

    /// Cross-step scratch space (backup paths, installed file lists, flags).
    pub config: HashMap<String, Value>,
    /// Names of steps whose `run` finished, in execution order.
    pub completed_steps: Vec<String>,
}

impl InstallContext {
    pub fn new(project_dir: PathBuf, home_dir: PathBuf) -> Self {
        Self {
            project_dir,
            home_dir,
            install_python: true,
            install_typescript: true,
            install_go: false,
            non_interactive: false,
            local_mode: false,
            local_repo_dir: None,
            skip_env: false,
            premium_key: None,
            ui: None,
            config: HashMap::new(),
            completed_steps: Vec::new(),
        }
    }

    /// Record `step_name` as completed. Idempotent.
    pub fn mark_completed(&mut self, step_name: &str) {
        if !self.is_completed(step_name) {
            self.completed_steps.push(step_name.to_string());
        }
    }

    pub fn is_completed(&self, step_name: &str) -> bool {
        self.completed_steps.iter().any(|s| s == step_name)
    }

    /// Whether a failed run has anything to unwind.
    pub fn needs_rollback(&self) -> bool {
        !self.completed_steps.is_empty()
    }

    /// String value from the config bag, if present and a string.
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(Value::as_str)
    }

    /// Boolean flag from the config bag; absent or non-boolean reads false.
    pub fn config_flag(&self, key: &str) -> bool {
        self.config
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// String list from the config bag; absent reads as empty.
    pub fn config_list(&self, key: &str) -> Vec<String> {
        self.config
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> InstallContext {
        InstallContext::new(PathBuf::from("/tmp/project"), PathBuf::from("/tmp/home"))
    }

    #[test]
    fn defaults() {
        let ctx = ctx();
        assert!(ctx.install_python);
        assert!(ctx.install_typescript);
        assert!(!ctx.install_go);
        assert!(!ctx.non_interactive);
        assert!(!ctx.local_mode);
        assert!(ctx.premium_key.is_none());
        assert!(ctx.completed_steps.is_empty());
    }

    #[test]
    fn mark_completed_preserves_order_and_deduplicates() {
        let mut ctx = ctx();
        ctx.mark_completed("preflight");
        ctx.mark_completed("bootstrap");
        ctx.mark_completed("preflight");
        assert_eq!(ctx.completed_steps, vec!["preflight", "bootstrap"]);
        assert!(ctx.is_completed("bootstrap"));
        assert!(!ctx.is_completed("finalize"));
    }

    #[test]
    fn needs_rollback_tracks_completions() {
        let mut ctx = ctx();
        assert!(!ctx.needs_rollback());
        ctx.mark_completed("bootstrap");
        assert!(ctx.needs_rollback());
    }

    #[test]
    fn config_accessors() {
        let mut ctx = ctx();
        ctx.config.insert("backup_path".into(), json!("/tmp/b"));
        ctx.config.insert("is_upgrade".into(), json!(true));
        ctx.config
            .insert("installed_files".into(), json!(["a.md", "b.sh"]));

        assert_eq!(ctx.config_str("backup_path"), Some("/tmp/b"));
        assert_eq!(ctx.config_str("missing"), None);
        assert!(ctx.config_flag("is_upgrade"));
        assert!(!ctx.config_flag("missing"));
        assert_eq!(ctx.config_list("installed_files"), vec!["a.md", "b.sh"]);
        assert!(ctx.config_list("missing").is_empty());
    }

    #[test]
    fn config_flag_ignores_non_boolean_values() {
        let mut ctx = ctx();
        ctx.config.insert("is_upgrade".into(), json!("yes"));
        assert!(!ctx.config_flag("is_upgrade"));
    }
}
