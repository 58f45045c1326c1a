//! Premium binary installation
//!
//! Verifies the license key against the licensing API, then downloads the
//! platform build of the premium helper into `.codekit/bin/`. Skipped
//! entirely when no key was provided.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;

use crate::context::InstallContext;
use crate::errors::InstallError;
use crate::pipeline::Step;

const LICENSE_URL: &str = "https://api.codekit.dev/v1/license/verify";

/// Premium builds are an order of magnitude larger than payload files.
const MAX_BINARY_SIZE: u64 = 100 * 1024 * 1024;

const USER_AGENT: &str = concat!("codekit-installer/", env!("CARGO_PKG_VERSION"));

#[derive(Deserialize)]
struct LicenseResponse {
    valid: bool,
    download_url: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Platform-specific artifact name (ck-premium-linux-x86_64 and friends).
fn binary_name() -> String {
    format!(
        "ck-premium-{}-{}",
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

fn verify_license(key: &str) -> Result<LicenseResponse> {
    let agent = ureq::Agent::new_with_defaults();
    agent
        .post(LICENSE_URL)
        .header("User-Agent", USER_AGENT)
        .send_form([("key", key)])
        .context("license verification request failed")?
        .body_mut()
        .read_json()
        .context("could not parse license response")
}

fn download_binary(url: &str, dest: &Path) -> Result<()> {
    let agent = ureq::Agent::new_with_defaults();
    let mut response = agent
        .get(url)
        .header("User-Agent", USER_AGENT)
        .call()
        .with_context(|| format!("failed to download {}", url))?;
    let bytes = response
        .body_mut()
        .with_config()
        .limit(MAX_BINARY_SIZE)
        .read_to_vec()
        .context("failed to read binary body")?;
    fs::write(dest, bytes).with_context(|| format!("could not write {}", dest.display()))
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

pub struct PremiumStep;

impl PremiumStep {
    fn install_from_local(&self, ctx: &InstallContext, dest: &Path) -> Result<(), InstallError> {
        let Some(repo_dir) = ctx.local_repo_dir.as_ref() else {
            return Err(InstallError::Config(
                "local mode requires a repository directory".into(),
            ));
        };
        let source = repo_dir.join("dist").join(binary_name());
        fs::copy(&source, dest).map_err(|err| {
            InstallError::download(
                format!("could not copy {}: {err}", source.display()),
                None,
            )
        })?;
        Ok(())
    }

    fn install_from_api(&self, key: &str, dest: &Path) -> Result<(), InstallError> {
        let response = verify_license(key)
            .map_err(|err| InstallError::download(format!("{err:#}"), Some(LICENSE_URL.into())))?;

        if !response.valid {
            let reason = response
                .message
                .unwrap_or_else(|| "license key rejected".to_string());
            return Err(InstallError::Config(format!("invalid license: {reason}")));
        }
        let Some(url) = response.download_url else {
            return Err(InstallError::download(
                "license accepted but no download was offered",
                Some(LICENSE_URL.into()),
            ));
        };

        let url = format!("{}/{}", url.trim_end_matches('/'), binary_name());
        download_binary(&url, dest)
            .map_err(|err| InstallError::download(format!("{err:#}"), Some(url.clone())))
    }
}

impl Step for PremiumStep {
    fn name(&self) -> &'static str {
        "premium"
    }

    fn run(&self, ctx: &mut InstallContext) -> Result<(), InstallError> {
        let ui = ctx.ui.clone();
        let Some(key) = ctx.premium_key.clone() else {
            return Ok(());
        };

        let bin_dir = ctx.project_dir.join(".codekit/bin");
        fs::create_dir_all(&bin_dir).map_err(|err| {
            InstallError::Config(format!("could not create {}: {err}", bin_dir.display()))
        })?;
        let dest: PathBuf = bin_dir.join("ck-premium");

        // Premium is an add-on; a failed install never takes down the rest
        // of an otherwise working setup.
        let result = if ctx.local_mode {
            self.install_from_local(ctx, &dest)
        } else {
            if let Some(ui) = &ui {
                ui.status("Verifying license...");
            }
            self.install_from_api(&key, &dest)
        };
        if let Err(err) = result {
            if let Some(ui) = &ui {
                ui.warning(&format!("Premium install failed: {err}"));
            }
            log::warn!("premium install failed: {}", err);
            return Ok(());
        }

        make_executable(&dest)
            .map_err(|err| InstallError::Config(format!("could not chmod premium binary: {err}")))?;

        ctx.config.insert(
            "premium_binary".into(),
            json!(dest.to_string_lossy()),
        );
        if let Some(ui) = &ui {
            ui.success("Premium binary installed");
        }
        Ok(())
    }

    fn rollback(&self, ctx: &InstallContext) -> Result<(), InstallError> {
        let Some(path) = ctx.config_str("premium_binary") else {
            return Ok(());
        };
        let path = Path::new(path);
        if path.exists() {
            fs::remove_file(path).map_err(|err| InstallError::Recoverable(err.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_ctx(project: &Path, repo: &Path, key: &str) -> InstallContext {
        let mut ctx = InstallContext::new(project.to_path_buf(), PathBuf::from("/tmp"));
        ctx.local_mode = true;
        ctx.local_repo_dir = Some(repo.to_path_buf());
        ctx.premium_key = Some(key.to_string());
        ctx
    }

    #[test]
    fn no_key_means_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = InstallContext::new(dir.path().to_path_buf(), PathBuf::from("/tmp"));
        PremiumStep.run(&mut ctx).unwrap();
        assert!(!dir.path().join(".codekit/bin").exists());
    }

    #[test]
    fn local_mode_copies_platform_binary() {
        let repo = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        fs::create_dir_all(repo.path().join("dist")).unwrap();
        fs::write(repo.path().join("dist").join(binary_name()), b"\x7fELF").unwrap();
        let mut ctx = local_ctx(project.path(), repo.path(), "key-123");

        PremiumStep.run(&mut ctx).unwrap();

        let dest = project.path().join(".codekit/bin/ck-premium");
        assert!(dest.exists());
        assert_eq!(ctx.config_str("premium_binary"), Some(dest.to_string_lossy().as_ref()));
    }

    #[cfg(unix)]
    #[test]
    fn installed_binary_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let repo = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        fs::create_dir_all(repo.path().join("dist")).unwrap();
        fs::write(repo.path().join("dist").join(binary_name()), b"bin").unwrap();
        let mut ctx = local_ctx(project.path(), repo.path(), "key-123");

        PremiumStep.run(&mut ctx).unwrap();

        let mode = fs::metadata(project.path().join(".codekit/bin/ck-premium"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[test]
    fn missing_artifact_degrades_to_a_warning() {
        let repo = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        let mut ctx = local_ctx(project.path(), repo.path(), "key-123");
        PremiumStep.run(&mut ctx).unwrap();
        assert!(ctx.config_str("premium_binary").is_none());
        assert!(!project.path().join(".codekit/bin/ck-premium").exists());
    }

    #[test]
    fn rollback_removes_recorded_binary() {
        let repo = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        fs::create_dir_all(repo.path().join("dist")).unwrap();
        fs::write(repo.path().join("dist").join(binary_name()), b"bin").unwrap();
        let mut ctx = local_ctx(project.path(), repo.path(), "key-123");

        PremiumStep.run(&mut ctx).unwrap();
        PremiumStep.rollback(&ctx).unwrap();
        assert!(!project.path().join(".codekit/bin/ck-premium").exists());
    }
}
