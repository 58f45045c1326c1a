//! Pre-flight checks: validate prerequisites before anything is touched

use std::path::Path;

use crate::context::InstallContext;
use crate::downloads;
use crate::errors::InstallError;
use crate::pipeline::Step;
use crate::platform;

const MIN_DISK_MB: u64 = 500;
const REQUIRED_TOOLS: &[&str] = &["curl", "git"];

/// Free space in megabytes at `path`, or None when the probe is unavailable.
#[cfg(unix)]
#[allow(unsafe_code)]
fn free_disk_mb(path: &Path) -> Option<u64> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        return None;
    }
    #[allow(clippy::unnecessary_cast)]
    Some((stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64) / (1024 * 1024))
}

#[cfg(not(unix))]
fn free_disk_mb(_path: &Path) -> Option<u64> {
    None
}

/// Platforms without the probe pass the check rather than block the install.
fn check_disk_space(path: &Path, min_mb: u64) -> bool {
    free_disk_mb(path).map_or(true, |free| free >= min_mb)
}

/// Whether we can write into `path` (probed against the nearest existing
/// ancestor when the directory itself does not exist yet).
fn check_permissions(path: &Path) -> bool {
    let mut target = path;
    while !target.exists() {
        match target.parent() {
            Some(parent) => target = parent,
            None => return false,
        }
    }

    let probe = target.join(".codekit-write-probe");
    match std::fs::write(&probe, b"") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

fn missing_tools() -> Vec<&'static str> {
    REQUIRED_TOOLS
        .iter()
        .copied()
        .filter(|tool| !platform::command_exists(tool))
        .collect()
}

/// Pre-flight step. Always runs; failures are fatal and abort the pipeline
/// before any other step has executed.
pub struct PreflightStep;

impl Step for PreflightStep {
    fn name(&self) -> &'static str {
        "preflight"
    }

    fn run(&self, ctx: &mut InstallContext) -> Result<(), InstallError> {
        let ui = ctx.ui.clone();
        let mut results: Vec<(&str, bool, String)> = Vec::new();

        if let Some(ui) = &ui {
            if platform::is_wsl() {
                ui.info("Windows Subsystem for Linux detected");
            } else if platform::is_windows() {
                ui.warning("Native Windows is not supported; run inside WSL");
            }
        }

        if let Some(ui) = &ui {
            ui.status("Checking disk space...");
        }
        let disk_ok = check_disk_space(&ctx.project_dir, MIN_DISK_MB);
        results.push((
            "Disk Space (500MB)",
            disk_ok,
            "Insufficient disk space".to_string(),
        ));

        if let Some(ui) = &ui {
            ui.status("Checking write permissions...");
        }
        let perm_ok = check_permissions(&ctx.project_dir);
        results.push((
            "Write Permissions",
            perm_ok,
            format!("Cannot write to {}", ctx.project_dir.display()),
        ));

        if let Some(ui) = &ui {
            ui.status("Checking required tools...");
        }
        let missing = missing_tools();
        let install_hint = platform::package_manager()
            .map(|pm| format!(" (try installing them with {pm})"))
            .unwrap_or_default();
        results.push((
            "Required Tools",
            missing.is_empty(),
            format!("Missing: {}{}", missing.join(", "), install_hint),
        ));

        // Network failures only warn; local mode never needs the network.
        if !ctx.local_mode {
            if let Some(ui) = &ui {
                ui.status("Checking network connectivity...");
            }
            if !downloads::verify_network() {
                if let Some(ui) = &ui {
                    ui.warning("Network connectivity check failed - downloads may fail");
                }
            }
        }

        if let Some(ui) = &ui {
            for (check_name, passed, error_msg) in &results {
                if *passed {
                    ui.success(check_name);
                } else {
                    ui.error(&format!("{}: {}", check_name, error_msg));
                }
            }
        }

        let failures: Vec<String> = results
            .iter()
            .filter(|(_, passed, _)| !passed)
            .map(|(name, _, msg)| format!("{}: {}", name, msg))
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(InstallError::preflight(
                format!("pre-flight checks failed:\n  {}", failures.join("\n  ")),
                "preflight",
            ))
        }
    }
}
