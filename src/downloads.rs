//! Repository file listing and downloads
//!
//! Payload files are fetched one at a time from the source repository (raw
//! GitHub URLs, listing via the git-tree API) or copied from a local checkout
//! in local mode. Writes are skipped when the destination already has the
//! same content, so repeated runs do not touch unchanged files.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::context::InstallContext;

/// Maximum size accepted for a single payload file (10 MB).
const MAX_BODY_SIZE: u64 = 10 * 1024 * 1024;

const USER_AGENT: &str = concat!("codekit-installer/", env!("CARGO_PKG_VERSION"));

/// Where payload files come from for this run.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub repo_url: String,
    pub repo_branch: String,
    pub local_mode: bool,
    pub local_repo_dir: Option<PathBuf>,
}

impl DownloadConfig {
    /// Source configuration for the given run context.
    pub fn for_context(ctx: &InstallContext) -> Self {
        Self {
            repo_url: "https://github.com/codekit-dev/codekit".to_string(),
            repo_branch: "main".to_string(),
            local_mode: ctx.local_mode,
            local_repo_dir: ctx.local_repo_dir.clone(),
        }
    }
}

/// A repository-relative file path.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub path: String,
}

#[derive(Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
}

#[derive(Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

/// Download (or copy, in local mode) one repository file to `dest_path`.
///
/// Returns false on failure; callers collect failed paths and degrade to a
/// warning rather than aborting. The destination is left untouched when its
/// content already matches.
pub fn download_file(repo_path: &str, dest_path: &Path, config: &DownloadConfig) -> bool {
    match fetch_and_write(repo_path, dest_path, config) {
        Ok(()) => true,
        Err(err) => {
            log::debug!("failed to fetch {}: {:#}", repo_path, err);
            false
        }
    }
}

fn fetch_and_write(repo_path: &str, dest_path: &Path, config: &DownloadConfig) -> Result<()> {
    if let Some(parent) = dest_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Could not create {}", parent.display()))?;
    }

    let bytes = if config.local_mode {
        let repo_dir = config
            .local_repo_dir
            .as_ref()
            .context("local mode requires a repository directory")?;
        let source = repo_dir.join(repo_path);
        if source == dest_path {
            return Ok(());
        }
        fs::read(&source).with_context(|| format!("Could not read {}", source.display()))?
    } else {
        fetch_remote(repo_path, config)?
    };

    if content_matches(dest_path, &bytes) {
        return Ok(());
    }

    fs::write(dest_path, &bytes)
        .with_context(|| format!("Could not write {}", dest_path.display()))
}

fn fetch_remote(repo_path: &str, config: &DownloadConfig) -> Result<Vec<u8>> {
    let url = format!(
        "{}/raw/{}/{}",
        config.repo_url, config.repo_branch, repo_path
    );
    let agent = ureq::Agent::new_with_defaults();

    let mut response = agent
        .get(&url)
        .header("User-Agent", USER_AGENT)
        .call()
        .with_context(|| format!("Failed to download {}", url))?;

    response
        .body_mut()
        .with_config()
        .limit(MAX_BODY_SIZE)
        .read_to_vec()
        .context("Failed to read response body")
}

/// Whether `dest` already holds exactly `bytes` (compared by content hash).
fn content_matches(dest: &Path, bytes: &[u8]) -> bool {
    match fs::read(dest) {
        Ok(existing) => blake3::hash(&existing) == blake3::hash(bytes),
        Err(_) => false,
    }
}

/// List every repository file under `dir_path`.
///
/// Local mode walks the checkout; remote mode queries the git-tree API.
/// Failures read as an empty listing, which callers report as a warning.
pub fn fetch_repo_files(dir_path: &str, config: &DownloadConfig) -> Vec<FileInfo> {
    if config.local_mode {
        let Some(repo_dir) = config.local_repo_dir.as_ref() else {
            return Vec::new();
        };
        return walk_local(repo_dir, dir_path);
    }

    match fetch_remote_tree(config) {
        Ok(tree) => tree
            .tree
            .into_iter()
            .filter(|e| e.kind == "blob" && e.path.starts_with(dir_path))
            .map(|e| FileInfo { path: e.path })
            .collect(),
        Err(err) => {
            log::debug!("failed to list repository tree: {:#}", err);
            Vec::new()
        }
    }
}

fn walk_local(repo_dir: &Path, dir_path: &str) -> Vec<FileInfo> {
    let source_dir = repo_dir.join(dir_path);
    if !source_dir.is_dir() {
        return Vec::new();
    }

    walkdir::WalkDir::new(&source_dir)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .strip_prefix(repo_dir)
                .ok()
                .map(|rel| FileInfo {
                    path: rel.to_string_lossy().replace('\\', "/"),
                })
        })
        .collect()
}

fn fetch_remote_tree(config: &DownloadConfig) -> Result<TreeResponse> {
    let repo_path = config
        .repo_url
        .trim_start_matches("https://github.com/")
        .trim_end_matches('/');
    let url = format!(
        "https://api.github.com/repos/{}/git/trees/{}?recursive=true",
        repo_path, config.repo_branch
    );

    let agent = ureq::Agent::new_with_defaults();
    agent
        .get(&url)
        .header("Accept", "application/vnd.github+json")
        .header("User-Agent", USER_AGENT)
        .call()
        .with_context(|| format!("Failed to query {}", url))?
        .body_mut()
        .read_json()
        .context("Failed to parse tree response")
}

/// Quick connectivity probe used by preflight (warning-only).
pub fn verify_network() -> bool {
    let agent = ureq::Agent::new_with_defaults();
    agent
        .head("https://api.github.com")
        .header("User-Agent", USER_AGENT)
        .call()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config(repo_dir: &Path) -> DownloadConfig {
        DownloadConfig {
            repo_url: "https://github.com/codekit-dev/codekit".to_string(),
            repo_branch: "main".to_string(),
            local_mode: true,
            local_repo_dir: Some(repo_dir.to_path_buf()),
        }
    }

    #[test]
    fn local_mode_copies_file() {
        let repo = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fs::create_dir_all(repo.path().join(".codekit/rules")).unwrap();
        fs::write(repo.path().join(".codekit/rules/base.md"), "# rules\n").unwrap();

        let config = local_config(repo.path());
        let dest_file = dest.path().join(".codekit/rules/base.md");
        assert!(download_file(".codekit/rules/base.md", &dest_file, &config));
        assert_eq!(fs::read_to_string(&dest_file).unwrap(), "# rules\n");
    }

    #[test]
    fn local_mode_fails_for_missing_source() {
        let repo = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let config = local_config(repo.path());
        assert!(!download_file(
            ".codekit/missing.md",
            &dest.path().join("missing.md"),
            &config
        ));
    }

    #[test]
    fn unchanged_destination_is_not_rewritten() {
        let repo = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fs::write(repo.path().join("a.txt"), "same").unwrap();
        let dest_file = dest.path().join("a.txt");
        fs::write(&dest_file, "same").unwrap();

        let before = fs::metadata(&dest_file).unwrap().modified().unwrap();
        let config = local_config(repo.path());
        assert!(download_file("a.txt", &dest_file, &config));
        let after = fs::metadata(&dest_file).unwrap().modified().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn fetch_repo_files_walks_local_checkout() {
        let repo = tempfile::tempdir().unwrap();
        fs::create_dir_all(repo.path().join(".codekit/hooks")).unwrap();
        fs::write(repo.path().join(".codekit/hooks/check.sh"), "#!/bin/sh\n").unwrap();
        fs::write(repo.path().join(".codekit/settings.json"), "{}\n").unwrap();
        fs::write(repo.path().join("README.md"), "readme\n").unwrap();

        let config = local_config(repo.path());
        let mut paths: Vec<String> = fetch_repo_files(".codekit", &config)
            .into_iter()
            .map(|f| f.path)
            .collect();
        paths.sort();

        assert_eq!(
            paths,
            vec![".codekit/hooks/check.sh", ".codekit/settings.json"]
        );
    }

    #[test]
    fn fetch_repo_files_empty_without_local_dir() {
        let config = DownloadConfig {
            repo_url: "https://github.com/codekit-dev/codekit".to_string(),
            repo_branch: "main".to_string(),
            local_mode: true,
            local_repo_dir: None,
        };
        assert!(fetch_repo_files(".codekit", &config).is_empty());
    }

    #[test]
    fn content_matches_detects_difference() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        fs::write(&file, "one").unwrap();
        assert!(content_matches(&file, b"one"));
        assert!(!content_matches(&file, b"two"));
        assert!(!content_matches(&dir.path().join("missing"), b"one"));
    }
}
