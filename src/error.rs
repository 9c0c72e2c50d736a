//! Error taxonomy for the installer components.
//!
//! Every fatal condition surfaces as one of these variants; the runners wrap
//! them in `anyhow` context and `main` prints the chain before exiting.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstallerError {
    /// Bad or unreadable persisted settings, invalid CLI values.
    #[error("configuration error: {0}")]
    Config(String),

    /// Release lookup or download failure.
    #[error("network error: {0}")]
    Network(String),

    /// Permission, disk space or missing-path failures.
    #[error("filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Virtual environment creation or dependency installation failure.
    #[error("environment provisioning failed: {0}")]
    Provision(String),

    /// Unit write, enable or restart failure.
    #[error("service integration failed: {0}")]
    Service(String),

    #[error(
        "Unable to identify system service manager (systemd/openrc). \
         Install one of them and re-run the installer."
    )]
    UnsupportedInitSystem,

    #[error("this installer must be run as root")]
    PermissionDenied,

    /// A subprocess exited unsuccessfully or could not be spawned.
    #[error("command `{command}` failed: {detail}")]
    Command { command: String, detail: String },
}

impl InstallerError {
    /// Attach a path to an I/O error.
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for InstallerError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

pub type InstallResult<T> = Result<T, InstallerError>;
