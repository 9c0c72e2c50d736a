//! Service account lookup and creation.

use std::path::PathBuf;

use log::{info, warn};
use nix::unistd::{Gid, Uid, User};

use super::command::{self, COMMAND_TIMEOUT};
use crate::error::{InstallResult, InstallerError};

/// The system account the bridge runs as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAccount {
    pub name: String,
    pub uid: Uid,
    pub gid: Gid,
    pub home: PathBuf,
}

impl From<User> for ServiceAccount {
    fn from(user: User) -> Self {
        Self {
            name: user.name,
            uid: user.uid,
            gid: user.gid,
            home: user.dir,
        }
    }
}

/// Look up `name` in the passwd database.
pub fn lookup(name: &str) -> InstallResult<Option<ServiceAccount>> {
    User::from_name(name)
        .map(|u| u.map(ServiceAccount::from))
        .map_err(|e| InstallerError::Config(format!("failed to look up user {name}: {e}")))
}

/// Return the account `name`, creating a system account when it is missing.
pub async fn ensure_service_account(name: &str) -> InstallResult<ServiceAccount> {
    if let Some(account) = lookup(name)? {
        info!("Using existing service account {name}");
        return Ok(account);
    }

    warn!("User {name} doesn't exist. Creating system account.");
    let home = format!("/home/{name}");

    if which::which("useradd").is_ok() {
        command::run(
            "useradd",
            [
                "--system",
                "--create-home",
                "--user-group",
                "--home-dir",
                home.as_str(),
                "--shell",
                "/usr/bin/bash",
                name,
            ],
            COMMAND_TIMEOUT,
        )
        .await?;
    } else {
        // busybox (Alpine)
        command::run("addgroup", ["-S", name], COMMAND_TIMEOUT).await?;
        command::run(
            "adduser",
            ["-S", "-G", name, "-h", home.as_str(), "-s", "/bin/ash", name],
            COMMAND_TIMEOUT,
        )
        .await?;
    }

    lookup(name)?.ok_or_else(|| {
        InstallerError::Config(format!("user {name} still missing after account creation"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_root() {
        let root = lookup("root").unwrap().expect("root exists");
        assert!(root.uid.is_root());
    }

    #[test]
    fn test_lookup_missing() {
        assert!(lookup("no-such-user-wyze-test").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_existing_account_is_reused() {
        let first = ensure_service_account("root").await.unwrap();
        let second = ensure_service_account("root").await.unwrap();
        assert_eq!(first, second);
    }
}
