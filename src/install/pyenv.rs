//! Python interpreter check and the bridge's virtual environment.

use std::path::{Path, PathBuf};

use log::{debug, info};

use super::command::{self, COMMAND_TIMEOUT, PIP_TIMEOUT};
use crate::error::{InstallResult, InstallerError};

pub const MIN_PYTHON: (u32, u32) = (3, 10);

/// Parse `Python 3.11.2` into `(3, 11)`.
pub fn parse_python_version(output: &str) -> Option<(u32, u32)> {
    let version = output.split_whitespace().find(|t| t.starts_with(|c: char| c.is_ascii_digit()))?;
    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}

/// Fail unless `python3` is at least [`MIN_PYTHON`].
pub async fn check_python_version() -> InstallResult<()> {
    let (want_major, want_minor) = MIN_PYTHON;
    let output = command::try_output("python3", ["--version"]).await.ok_or_else(|| {
        InstallerError::Provision("python3 not found; install Python 3 and re-run".to_string())
    })?;

    // Python 2 printed its version on stderr
    let text = format!(
        "{} {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    let found = parse_python_version(&text).ok_or_else(|| {
        InstallerError::Provision(format!("could not parse python3 version from `{}`", text.trim()))
    })?;

    if found < MIN_PYTHON {
        return Err(InstallerError::Provision(format!(
            "Python {want_major}.{want_minor} or newer is required, found {}.{}",
            found.0, found.1
        )));
    }
    debug!("python3 {}.{} OK", found.0, found.1);
    Ok(())
}

/// A `python3 -m venv` environment.
#[derive(Debug, Clone)]
pub struct VirtualEnv {
    path: PathBuf,
}

impl VirtualEnv {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Executable `name` inside the environment's `bin/`.
    pub fn bin(&self, name: &str) -> PathBuf {
        self.path.join("bin").join(name)
    }

    pub fn exists(&self) -> bool {
        self.bin("python").exists()
    }

    /// Create the environment unless it already exists.
    pub async fn ensure(&self) -> InstallResult<()> {
        if self.exists() {
            info!("Reusing virtual environment {}", self.path.display());
            return Ok(());
        }
        info!("Creating virtual environment {}", self.path.display());
        let path = self.path.to_string_lossy();
        command::run("python3", ["-m", "venv", &*path], COMMAND_TIMEOUT)
            .await
            .map_err(|e| InstallerError::Provision(e.to_string()))?;
        Ok(())
    }

    /// `pip install -r <requirements>`
    pub async fn install_requirements(&self, requirements: &Path) -> InstallResult<()> {
        if !requirements.is_file() {
            return Err(InstallerError::Provision(format!(
                "{} not found",
                requirements.display()
            )));
        }
        info!("Installing python dependencies from {}", requirements.display());
        let requirements = requirements.to_string_lossy();
        self.pip(&["-r", &*requirements]).await
    }

    pub async fn install_package(&self, package: &str) -> InstallResult<()> {
        info!("Installing {package} into {}", self.path.display());
        self.pip(&[package]).await
    }

    async fn pip(&self, args: &[&str]) -> InstallResult<()> {
        let pip = self.bin("pip");
        let pip = pip.to_string_lossy();
        let mut full = vec!["install", "--disable-pip-version-check"];
        full.extend_from_slice(args);
        command::run(&pip, full, PIP_TIMEOUT)
            .await
            .map_err(|e| InstallerError::Provision(e.to_string()))?;
        Ok(())
    }
}
