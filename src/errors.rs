//! Installer error taxonomy
//!
//! Severity is part of the type: fatal variants abort the run and trigger
//! rollback, recoverable ones are expected to be absorbed by the step that
//! raised them and reported as warnings.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstallError {
    /// A failure the raising step can absorb (the run may continue).
    #[error("{0}")]
    Recoverable(String),

    /// A network fetch failed.
    #[error("download failed: {message}")]
    Download {
        message: String,
        url: Option<String>,
    },

    /// A configuration file could not be read, written, or merged.
    #[error("configuration error: {0}")]
    Config(String),

    /// Unrecoverable failure. Aborts the run.
    #[error("{0}")]
    Fatal(String),

    /// An environment precondition is not met. Aborts the run.
    #[error("{message}")]
    Preflight {
        message: String,
        check: Option<String>,
    },
}

impl InstallError {
    pub fn download(message: impl Into<String>, url: Option<String>) -> Self {
        Self::Download {
            message: message.into(),
            url,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    pub fn preflight(message: impl Into<String>, check: impl Into<String>) -> Self {
        Self::Preflight {
            message: message.into(),
            check: Some(check.into()),
        }
    }

    /// Whether this error must abort the run regardless of context.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_) | Self::Preflight { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatality_matrix() {
        assert!(InstallError::fatal("boom").is_fatal());
        assert!(InstallError::preflight("no disk", "disk_space").is_fatal());
        assert!(!InstallError::Recoverable("minor".into()).is_fatal());
        assert!(!InstallError::download("timeout", None).is_fatal());
        assert!(!InstallError::Config("bad json".into()).is_fatal());
    }

    #[test]
    fn download_keeps_url() {
        let err = InstallError::download("404", Some("https://example.com/f".into()));
        match err {
            InstallError::Download { url, .. } => {
                assert_eq!(url.as_deref(), Some("https://example.com/f"));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn preflight_keeps_check_name() {
        let err = InstallError::preflight("missing git", "required_tools");
        match err {
            InstallError::Preflight { check, .. } => {
                assert_eq!(check.as_deref(), Some("required_tools"));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            InstallError::download("connection refused", None).to_string(),
            "download failed: connection refused"
        );
        assert_eq!(
            InstallError::Config("settings.json is not valid JSON".into()).to_string(),
            "configuration error: settings.json is not valid JSON"
        );
        assert_eq!(InstallError::fatal("boom").to_string(), "boom");
    }
}
