//! Checks that must pass before anything is touched.

use std::time::Duration;

use log::debug;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{InstallResult, InstallerError};

const CONNECTIVITY_HOST: (&str, u16) = ("github.com", 443);
const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(5);

/// Check if running with root privileges
pub fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}

pub fn require_root() -> InstallResult<()> {
    if is_root() {
        Ok(())
    } else {
        Err(InstallerError::PermissionDenied)
    }
}

/// Fail unless GitHub accepts a TCP connection within five seconds.
pub async fn require_internet() -> InstallResult<()> {
    let (host, port) = CONNECTIVITY_HOST;
    match timeout(CONNECTIVITY_TIMEOUT, TcpStream::connect((host, port))).await {
        Ok(Ok(_)) => {
            debug!("Connected to {host}:{port}");
            Ok(())
        }
        Ok(Err(e)) => Err(InstallerError::Network(format!(
            "No internet connection ({host}:{port}: {e})"
        ))),
        Err(_) => Err(InstallerError::Network(format!(
            "No internet connection ({host}:{port} timed out)"
        ))),
    }
}
