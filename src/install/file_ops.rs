//! Filesystem helpers: atomic writes, modes and recursive ownership.

use std::fs;
use std::io::Write;
use std::path::Path;

use log::{debug, info};
use nix::unistd::{Gid, Uid, chown};
use walkdir::WalkDir;

use super::account::ServiceAccount;
use crate::error::{InstallResult, InstallerError};

/// Write file atomically to prevent corruption
pub fn write_file_atomic(path: &Path, content: &str) -> InstallResult<()> {
    let temp_path = path.with_extension("tmp");

    {
        let mut file =
            fs::File::create(&temp_path).map_err(|e| InstallerError::fs(&temp_path, e))?;
        file.write_all(content.as_bytes())
            .map_err(|e| InstallerError::fs(&temp_path, e))?;
        file.sync_all()
            .map_err(|e| InstallerError::fs(&temp_path, e))?;
    }

    fs::rename(&temp_path, path).map_err(|e| InstallerError::fs(path, e))?;
    Ok(())
}

/// Set unix permission bits on `path`.
pub fn set_mode(path: &Path, mode: u32) -> InstallResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| InstallerError::fs(path, e))
}

/// `chown -R uid:gid path`, leaving symlinks untouched.
pub fn chown_recursive(path: &Path, uid: Uid, gid: Gid) -> InstallResult<()> {
    for entry in WalkDir::new(path).follow_links(false) {
        let entry = entry.map_err(|e| {
            let p = e.path().unwrap_or(path).to_path_buf();
            InstallerError::fs(p, e.into())
        })?;
        if entry.path_is_symlink() {
            continue;
        }
        chown(entry.path(), Some(uid), Some(gid))
            .map_err(|e| InstallerError::fs(entry.path(), e.into()))?;
    }
    Ok(())
}

/// Hand `path` (recursively) to the service account.
pub fn give_to(path: &Path, account: &ServiceAccount) -> InstallResult<()> {
    debug!("chown -R {}:{} {}", account.name, account.name, path.display());
    chown_recursive(path, account.uid, account.gid)
}

/// Create each folder (with parents) and hand it to the service account.
pub fn create_application_folders(folders: &[&Path], account: &ServiceAccount) -> InstallResult<()> {
    let names: Vec<String> = folders.iter().map(|p| p.display().to_string()).collect();
    info!("Creating required folders: {}", names.join(","));

    for path in folders {
        fs::create_dir_all(path).map_err(|e| InstallerError::fs(*path, e))?;
        give_to(path, account)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn test_write_file_atomic_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unit.service");

        write_file_atomic(&path, "first").unwrap();
        write_file_atomic(&path, "second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        assert!(!dir.path().join("unit.tmp").exists());
    }

    #[test]
    fn test_set_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret.env");
        fs::write(&path, "x").unwrap();

        set_mode(&path, 0o600).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_chown_to_current_owner_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/file"), "x").unwrap();

        chown_recursive(dir.path(), Uid::current(), Gid::current()).unwrap();
    }
}
