//! mediamtx relay binary management.

use std::path::{Path, PathBuf};

use log::{debug, info};

use super::command;
use super::file_ops::set_mode;
use crate::download::{self, Component, ExtractFilter};
use crate::error::InstallResult;

/// Outcome of [`MediaMtx::ensure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayStatus {
    pub version: String,
    pub changed: bool,
}

#[derive(Debug, Clone)]
pub struct MediaMtx {
    dir: PathBuf,
}

impl MediaMtx {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn binary(&self) -> PathBuf {
        self.dir.join("mediamtx")
    }

    /// Version reported by `mediamtx --version`, if installed.
    pub async fn installed_version(&self) -> Option<String> {
        let binary = self.binary();
        if !binary.is_file() {
            return None;
        }
        let output = command::try_output(&binary, ["--version"]).await?;
        parse_version_output(&String::from_utf8_lossy(&output.stdout))
    }

    /// Install `version` ("latest" or pinned) unless it is already present.
    pub async fn ensure(&self, client: &reqwest::Client, version: &str) -> InstallResult<RelayStatus> {
        let release = download::resolve(client, Component::MediaRelay, version).await?;
        let installed = self.installed_version().await;
        debug!("[mediamtx] installed: {installed:?}, wanted: {}", release.version);

        if installed.as_deref() == Some(release.version.as_str()) {
            info!("MediaMTX v{} is already installed", release.version);
            return Ok(RelayStatus {
                version: release.version,
                changed: false,
            });
        }

        info!("Installing MediaMTX v{} to {}", release.version, self.dir.display());
        let data = download::download(client, &release).await?;
        download::unpack(data, self.dir.clone(), ExtractFilter::containing("mediamtx")).await?;
        set_mode(&self.binary(), 0o755)?;

        Ok(RelayStatus {
            version: release.version,
            changed: true,
        })
    }
}

/// Extract the version from `mediamtx --version` output (`v1.9.0`).
pub fn parse_version_output(output: &str) -> Option<String> {
    let token = output.split_whitespace().last()?;
    Some(download::normalize_tag(token).to_string())
}
