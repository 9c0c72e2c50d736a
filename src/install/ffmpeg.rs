//! ffmpeg-for-homebridge static build.

use std::path::{Path, PathBuf};

use log::info;

use crate::config::LATEST;
use crate::download::{self, Component, ExtractFilter};
use crate::error::{InstallResult, InstallerError};

/// Install the latest static ffmpeg under `root` unless `ffmpeg` is on `PATH`.
///
/// Returns whether anything was installed.
pub async fn ensure_ffmpeg(client: &reqwest::Client, root: &Path) -> InstallResult<bool> {
    if let Ok(path) = which::which("ffmpeg") {
        info!("ffmpeg already installed at {}", path.display());
        return Ok(false);
    }

    let release = download::resolve(client, Component::Transcoder, LATEST).await?;
    info!("Installing ffmpeg-for-homebridge {} to {}", release.version, root.display());

    let data = download::download(client, &release).await?;
    let written = download::unpack(data, root.to_path_buf(), ExtractFilter::all()).await?;
    info!("Extracted {} ffmpeg files", written.len());

    let path = require_on_path("ffmpeg")?;
    info!("ffmpeg installed at {}", path.display());
    Ok(true)
}

/// Locate `program` on `PATH` or fail the provisioning step.
fn require_on_path(program: &str) -> InstallResult<PathBuf> {
    which::which(program).map_err(|_| {
        InstallerError::Provision(format!(
            "{program} not found on PATH after install; check that /usr/local/bin is on PATH"
        ))
    })
}
