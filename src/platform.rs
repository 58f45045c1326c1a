//! Cross-platform probes: OS detection, PATH lookups, shell rc discovery

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub fn is_macos() -> bool {
    std::env::consts::OS == "macos"
}

pub fn is_linux() -> bool {
    std::env::consts::OS == "linux"
}

pub fn is_windows() -> bool {
    std::env::consts::OS == "windows"
}

/// Whether we are running under Windows Subsystem for Linux.
pub fn is_wsl() -> bool {
    if !is_linux() {
        return false;
    }
    std::fs::read_to_string("/proc/version")
        .map(|v| v.to_lowercase().contains("microsoft"))
        .unwrap_or(false)
}

/// Check if a command exists in PATH
pub fn command_exists(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Detect the system package manager, if any.
pub fn package_manager() -> Option<&'static str> {
    if is_macos() {
        if command_exists("brew") {
            return Some("brew");
        }
    } else if is_linux() {
        for pm in ["apt-get", "dnf", "yum", "pacman"] {
            if command_exists(pm) {
                return Some(pm);
            }
        }
    }
    None
}

/// Shell configuration files present under the given home directory.
///
/// Bash prefers .bashrc but falls back to .bash_profile; zsh and fish files
/// are included whenever they exist.
pub fn shell_config_files(home: &Path) -> Vec<PathBuf> {
    let mut configs = Vec::new();

    let bashrc = home.join(".bashrc");
    let bash_profile = home.join(".bash_profile");
    if bashrc.exists() {
        configs.push(bashrc);
    }
    if bash_profile.exists() {
        configs.push(bash_profile);
    }

    let zshrc = home.join(".zshrc");
    if zshrc.exists() {
        configs.push(zshrc);
    }

    let fish_config = home.join(".config/fish/config.fish");
    if fish_config.exists() {
        configs.push(fish_config);
    }

    configs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn command_exists_finds_sh() {
        assert!(command_exists("sh"));
        assert!(!command_exists("definitely-not-a-real-command-xyz"));
    }

    #[test]
    fn exactly_one_os_predicate_holds() {
        let count = [is_macos(), is_linux(), is_windows()]
            .iter()
            .filter(|b| **b)
            .count();
        assert!(count <= 1);
    }

    #[test]
    fn shell_config_files_only_returns_existing() {
        let home = tempfile::tempdir().unwrap();
        assert!(shell_config_files(home.path()).is_empty());

        fs::write(home.path().join(".zshrc"), "# zsh\n").unwrap();
        fs::create_dir_all(home.path().join(".config/fish")).unwrap();
        fs::write(home.path().join(".config/fish/config.fish"), "# fish\n").unwrap();

        let configs = shell_config_files(home.path());
        assert_eq!(configs.len(), 2);
        assert!(configs.iter().any(|p| p.ends_with(".zshrc")));
        assert!(configs.iter().any(|p| p.ends_with("config.fish")));
    }
}
