//! Artifact download with progress reporting and digest verification

use std::time::Duration;

use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};
use sha2::{Digest, Sha256};
use tokio::time::timeout;

use super::release::ReleaseRef;
use crate::error::{InstallResult, InstallerError};

const DOWNLOAD_CONNECT_TIMEOUT: Duration = Duration::from_secs(30); // Initial connection
const DOWNLOAD_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(300); // 5 min no data

/// Shared HTTP client; GitHub rejects requests without a user agent.
pub fn http_client() -> InstallResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .connect_timeout(DOWNLOAD_CONNECT_TIMEOUT)
        .user_agent(concat!("wyze-bridge-installer/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Download `release` into memory, checking status, size and digest.
pub async fn download(client: &reqwest::Client, release: &ReleaseRef) -> InstallResult<Vec<u8>> {
    let label = release.component.to_string();
    debug!("[{label}] Downloading {}", release.url);

    let response = client.get(&release.url).send().await?;
    if !response.status().is_success() {
        return Err(InstallerError::Network(format!(
            "[{label}] Error downloading file: HTTP {}",
            response.status()
        )));
    }

    let total_bytes = response.content_length().unwrap_or(0);
    let pb = progress_bar(&label, total_bytes);

    let mut data = Vec::with_capacity(total_bytes as usize);
    let mut stream = response.bytes_stream();
    loop {
        let chunk = match timeout(DOWNLOAD_INACTIVITY_TIMEOUT, stream.next()).await {
            Ok(Some(Ok(chunk))) => chunk,
            Ok(Some(Err(e))) => {
                pb.abandon();
                return Err(e.into());
            }
            Ok(None) => break,
            Err(_) => {
                pb.abandon();
                return Err(InstallerError::Network(format!(
                    "[{label}] Download timeout: no data received for {} seconds \
                     after {} bytes. Check network connection and retry.",
                    DOWNLOAD_INACTIVITY_TIMEOUT.as_secs(),
                    data.len()
                )));
            }
        };
        data.extend_from_slice(&chunk);
        pb.set_position(data.len() as u64);
    }
    pb.finish_and_clear();

    if data.is_empty() {
        return Err(InstallerError::Network(format!(
            "[{label}] Empty response from {}",
            release.url
        )));
    }

    if let Some(expected) = &release.digest {
        verify_digest(&data, expected)
            .map_err(|e| InstallerError::Network(format!("[{label}] {e}")))?;
    }

    Ok(data)
}

/// Compare `data` to a GitHub asset digest of the form `sha256:<hex>`.
///
/// Unknown algorithms are logged and accepted.
pub fn verify_digest(data: &[u8], expected: &str) -> Result<(), String> {
    let Some(hex_digest) = expected.strip_prefix("sha256:") else {
        warn!("Skipping verification for unsupported digest `{expected}`");
        return Ok(());
    };

    let actual = hex::encode(Sha256::digest(data));
    if actual.eq_ignore_ascii_case(hex_digest) {
        Ok(())
    } else {
        Err(format!(
            "checksum mismatch: expected sha256:{hex_digest}, got sha256:{actual}"
        ))
    }
}

fn progress_bar(label: &str, total_bytes: u64) -> ProgressBar {
    let pb = if total_bytes > 0 {
        ProgressBar::new(total_bytes)
    } else {
        ProgressBar::new_spinner()
    };
    if let Ok(style) =
        ProgressStyle::default_bar().template("   [{bar:40.green/blue}] {bytes}/{total_bytes}  {msg}")
    {
        pb.set_style(style.progress_chars("█▓░"));
    }
    pb.set_message(format!("📥 {label}"));
    pb
}
