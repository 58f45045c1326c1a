use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Run a command and capture output
pub fn run_capture(cmd: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(cmd)
        .args(args)
        .output()
        .with_context(|| format!("Failed to execute: {} {}", cmd, args.join(" ")))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("Command failed: {}", stderr.trim())
    }
}

/// Run a command silently, returning success/failure
pub fn run_quiet(cmd: &str, args: &[&str]) -> bool {
    Command::new(cmd)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Run a shell command through `bash -c`, retrying transient failures.
///
/// Installer tool downloads regularly hit flaky networks; three attempts with
/// a short delay covers the common cases without stalling a failed install.
pub fn bash_with_retry(command: &str, cwd: Option<&Path>) -> bool {
    for attempt in 1..=MAX_RETRIES {
        let mut cmd = Command::new("bash");
        cmd.args(["-c", command])
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        if cmd.status().map(|s| s.success()).unwrap_or(false) {
            return true;
        }

        if attempt < MAX_RETRIES {
            log::debug!("command failed (attempt {attempt}/{MAX_RETRIES}), retrying: {command}");
            thread::sleep(RETRY_DELAY);
        }
    }
    false
}
