//! GitHub release API interaction

use std::time::Duration;

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::LINK;
use serde::Deserialize;

use crate::error::{InstallResult, InstallerError};

pub const GITHUB_API: &str = "https://api.github.com";
const API_TIMEOUT: Duration = Duration::from_secs(30);
const PER_PAGE: u32 = 100;

static NEXT_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<([^>]+)>\s*;\s*rel="next""#).expect("static regex")
});

/// GitHub release metadata from API
#[derive(Deserialize, Debug, Clone)]
pub struct GitHubRelease {
    #[serde(default)]
    pub name: Option<String>,
    pub tag_name: String,
    #[serde(default)]
    pub tarball_url: Option<String>,
    #[serde(default)]
    pub assets: Vec<GitHubAsset>,
}

/// GitHub release asset metadata
#[derive(Deserialize, Debug, Clone)]
pub struct GitHubAsset {
    pub name: String,
    pub browser_download_url: String,
    /// `sha256:<hex>` on newer releases
    #[serde(default)]
    pub digest: Option<String>,
}

/// A single `owner/name` repository on GitHub.
#[derive(Debug, Clone)]
pub struct GitHubRepo {
    pub owner: &'static str,
    pub name: &'static str,
}

impl GitHubRepo {
    pub fn new(owner: &'static str, name: &'static str) -> Self {
        Self { owner, name }
    }

    fn api_url(&self) -> String {
        format!("{GITHUB_API}/repos/{}/{}", self.owner, self.name)
    }

    /// Fetch the release marked latest.
    pub async fn latest_release(&self, client: &reqwest::Client) -> InstallResult<GitHubRelease> {
        let url = format!("{}/releases/latest", self.api_url());
        let response = client.get(&url).timeout(API_TIMEOUT).send().await?;

        if !response.status().is_success() {
            return Err(InstallerError::Network(format!(
                "[{}] GitHub API error: HTTP {}",
                self.name,
                response.status()
            )));
        }

        Ok(response.json().await?)
    }

    /// Walk every page of `/releases` until one matches `version`.
    pub async fn release_by_version(
        &self,
        client: &reqwest::Client,
        version: &str,
    ) -> InstallResult<GitHubRelease> {
        let mut next = Some(format!("{}/releases?per_page={PER_PAGE}", self.api_url()));

        while let Some(url) = next.take() {
            debug!("[{}] Fetching {}", self.name, url);
            let response = client.get(&url).timeout(API_TIMEOUT).send().await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(InstallerError::Network(format!(
                    "[{}] Error fetching release info: {status} - {body}",
                    self.name
                )));
            }

            next = response
                .headers()
                .get(LINK)
                .and_then(|v| v.to_str().ok())
                .and_then(next_page_link);

            let page: Vec<GitHubRelease> = response.json().await?;
            if let Some(release) = find_release(page, version) {
                return Ok(release);
            }
        }

        Err(InstallerError::Network(format!(
            "[{}] Unable to locate release: {version}",
            self.name
        )))
    }
}

/// Whether `release` is the one a user means by `version`.
///
/// Matches the release title or the tag with or without a leading `v`.
pub fn matches_version(release: &GitHubRelease, version: &str) -> bool {
    release.name.as_deref() == Some(version)
        || release.tag_name == version
        || release.tag_name == format!("v{version}")
}

pub fn find_release(releases: Vec<GitHubRelease>, version: &str) -> Option<GitHubRelease> {
    releases.into_iter().find(|r| matches_version(r, version))
}

/// URL of the `rel="next"` entry in a `Link` header.
pub fn next_page_link(header: &str) -> Option<String> {
    NEXT_LINK
        .captures(header)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(name: &str, tag: &str) -> GitHubRelease {
        GitHubRelease {
            name: Some(name.to_string()),
            tag_name: tag.to_string(),
            tarball_url: Some(format!("https://example.invalid/{tag}.tar.gz")),
            assets: vec![],
        }
    }

    #[test]
    fn test_matches_version_forms() {
        let r = release("Release 2.10.3", "v2.10.3");
        assert!(matches_version(&r, "2.10.3"));
        assert!(matches_version(&r, "v2.10.3"));
        assert!(matches_version(&r, "Release 2.10.3"));
        assert!(!matches_version(&r, "2.10"));
    }

    #[test]
    fn test_find_pinned_release_not_first() {
        let page = vec![
            release("v2.11.0", "v2.11.0"),
            release("v2.10.3", "v2.10.3"),
            release("v2.10.2", "v2.10.2"),
        ];
        let found = find_release(page, "2.10.3").unwrap();
        assert_eq!(found.tag_name, "v2.10.3");
    }

    #[test]
    fn test_next_page_link() {
        let header = r#"<https://api.github.com/repositories/1/releases?page=2>; rel="next", <https://api.github.com/repositories/1/releases?page=9>; rel="last""#;
        assert_eq!(
            next_page_link(header).as_deref(),
            Some("https://api.github.com/repositories/1/releases?page=2")
        );

        let last_page = r#"<https://api.github.com/repositories/1/releases?page=1>; rel="prev", <https://api.github.com/repositories/1/releases?page=1>; rel="first""#;
        assert_eq!(next_page_link(last_page), None);
    }

    #[test]
    fn test_release_deserialize_minimal() {
        let json = r#"{
            "name": "v1.9.0",
            "tag_name": "v1.9.0",
            "tarball_url": "https://api.github.com/repos/a/b/tarball/v1.9.0",
            "assets": [{
                "name": "mediamtx_v1.9.0_linux_amd64.tar.gz",
                "browser_download_url": "https://github.com/a/b/releases/download/v1.9.0/x.tar.gz",
                "size": 42,
                "digest": "sha256:00"
            }]
        }"#;
        let r: GitHubRelease = serde_json::from_str(json).unwrap();
        assert_eq!(r.assets.len(), 1);
        assert_eq!(r.assets[0].digest.as_deref(), Some("sha256:00"));
    }
}
