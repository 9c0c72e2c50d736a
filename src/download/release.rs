//! Resolution of "latest" or pinned versions to concrete release artifacts

use std::fmt;

use log::{debug, info};

use super::github::{GitHubRelease, GitHubRepo};
use super::platform::Arch;
use crate::config::LATEST;
use crate::error::{InstallResult, InstallerError};

/// Upstream projects the installer pulls releases from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    /// docker-wyze-bridge, installed from the source tarball
    Bridge,
    /// mediamtx binary release
    MediaRelay,
    /// ffmpeg-for-homebridge static build
    Transcoder,
}

impl Component {
    pub fn repo(&self) -> GitHubRepo {
        match self {
            Component::Bridge => GitHubRepo::new("mrlt8", "docker-wyze-bridge"),
            Component::MediaRelay => GitHubRepo::new("bluenviron", "mediamtx"),
            Component::Transcoder => GitHubRepo::new("homebridge", "ffmpeg-for-homebridge"),
        }
    }

    /// Asset name substring to pick, or `None` to use the source tarball.
    pub fn asset_pattern(&self, arch: Arch) -> Option<&'static str> {
        match self {
            Component::Bridge => None,
            Component::MediaRelay => Some(arch.mediamtx_asset()),
            Component::Transcoder => Some(arch.ffmpeg_asset()),
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.repo().name)
    }
}

/// A resolved artifact: which component, which version, where to get it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRef {
    pub component: Component,
    /// Tag without its leading `v`
    pub version: String,
    pub url: String,
    /// Expected `sha256:<hex>` digest, when GitHub publishes one
    pub digest: Option<String>,
}

/// Strip a leading `v` from a release tag.
pub fn normalize_tag(tag: &str) -> &str {
    tag.strip_prefix('v').unwrap_or(tag)
}

/// Pick the downloadable artifact of `release` for `component` on `arch`.
pub fn release_ref(
    component: Component,
    release: &GitHubRelease,
    arch: Arch,
) -> InstallResult<ReleaseRef> {
    let version = normalize_tag(&release.tag_name).to_string();

    match component.asset_pattern(arch) {
        Some(pattern) => {
            let asset = release
                .assets
                .iter()
                .find(|a| a.name.contains(pattern))
                .ok_or_else(|| {
                    InstallerError::Network(format!(
                        "[{component}] No asset matching `{pattern}` in release {}",
                        release.tag_name
                    ))
                })?;
            Ok(ReleaseRef {
                component,
                version,
                url: asset.browser_download_url.clone(),
                digest: asset.digest.clone(),
            })
        }
        None => {
            let url = release.tarball_url.clone().ok_or_else(|| {
                InstallerError::Network(format!(
                    "[{component}] Release {} has no source tarball",
                    release.tag_name
                ))
            })?;
            Ok(ReleaseRef {
                component,
                version,
                url,
                digest: None,
            })
        }
    }
}

/// Query GitHub for `component` at `version` ("latest" or a pinned tag).
pub async fn resolve(
    client: &reqwest::Client,
    component: Component,
    version: &str,
) -> InstallResult<ReleaseRef> {
    let repo = component.repo();
    let release = if version == LATEST {
        repo.latest_release(client).await?
    } else {
        repo.release_by_version(client, version).await?
    };
    debug!(
        "[{component}] Found release: {}",
        release.name.as_deref().unwrap_or(&release.tag_name)
    );

    let resolved = release_ref(component, &release, Arch::detect()?)?;
    info!("[{component}] {version} resolved to {}", resolved.version);
    Ok(resolved)
}
