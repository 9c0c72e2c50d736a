//! The docker-wyze-bridge application directory.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::account::ServiceAccount;
use super::env_file;
use super::file_ops::{give_to, set_mode};
use crate::download::{self, Arch, ExtractFilter, ReleaseRef};
use crate::error::{InstallResult, InstallerError};

/// Hard-coded relay path inside the upstream container image.
const CONTAINER_MEDIAMTX: &str = "/app/mediamtx";

const APP_ENV_TEMPLATE: &str = "\
# [OPTIONAL] Credentials can be set in the WebUI
# API Key and ID can be obtained from the wyze dev portal:
# https://developer-api-console.wyze.com/#/apikey/view
#WYZE_EMAIL=
#WYZE_PASSWORD=
#API_ID=
#API_KEY=

# WebUI and Stream authentication:
# Set WB_AUTH to false to disable web and stream auth.
WB_AUTH=True
# WB_USERNAME=
# WB_PASSWORD=
# STREAM_AUTH=

## Additional Options can be configured here, as per
## https://github.com/mrlt8/docker-wyze-bridge/wiki/Advanced-Option
";

#[derive(Debug, Clone)]
pub struct BridgeApp {
    path: PathBuf,
}

impl BridgeApp {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The `.env` shipped with (and versioned by) the application.
    pub fn env_file(&self) -> PathBuf {
        self.path.join(".env")
    }

    pub fn requirements(&self) -> PathBuf {
        self.path.join("requirements.txt")
    }

    pub fn is_installed(&self) -> bool {
        self.path.join("frontend.py").is_file()
    }

    /// `VERSION` recorded in the application's `.env`.
    pub fn installed_version(&self) -> InstallResult<Option<String>> {
        if !self.is_installed() {
            return Ok(None);
        }
        env_file::read_key(&self.env_file(), "VERSION")
    }

    /// Download `release` and extract its `app/` tree into the application path.
    pub async fn install(&self, client: &reqwest::Client, release: &ReleaseRef) -> InstallResult<()> {
        info!("Installing docker-wyze-bridge v{} to {}", release.version, self.path.display());

        let data = download::download(client, release).await?;
        let written = download::unpack(
            data,
            self.path.clone(),
            ExtractFilter::containing("/app/").strip(2),
        )
        .await?;
        debug!("Extracted {} files", written.len());

        if !self.is_installed() {
            return Err(InstallerError::Network(format!(
                "release {} did not contain the application frontend",
                release.version
            )));
        }

        env_file::update_key(&self.env_file(), "VERSION", &release.version)
    }

    /// Delete the application directory ahead of a clean reinstall.
    pub fn remove(&self) -> InstallResult<()> {
        if self.path.exists() {
            info!("Removing {}", self.path.display());
            fs::remove_dir_all(&self.path).map_err(|e| InstallerError::fs(&self.path, e))?;
        }
        Ok(())
    }

    /// Point the relay launcher at the real mediamtx binary.
    ///
    /// Returns whether the launcher was modified.
    pub fn patch_mediamtx_path(&self, binary: &Path) -> InstallResult<bool> {
        let launcher = self.path.join("wyzebridge").join("mtx_server.py");
        if !launcher.is_file() {
            debug!("No relay launcher at {}, nothing to patch", launcher.display());
            return Ok(false);
        }
        let source = fs::read_to_string(&launcher).map_err(|e| InstallerError::fs(&launcher, e))?;

        let patched = patch_path(&source, &binary.to_string_lossy());
        if patched == source {
            return Ok(false);
        }

        info!("Patching {} to use {}", launcher.display(), binary.display());
        fs::write(&launcher, patched).map_err(|e| InstallerError::fs(&launcher, e))?;
        Ok(true)
    }
}

fn patch_path(source: &str, binary: &str) -> String {
    if binary == CONTAINER_MEDIAMTX {
        return source.to_string();
    }
    source.replace(CONTAINER_MEDIAMTX, binary)
}

/// Copy the bundled IOTC library for `arch` to `dest` when missing or stale.
pub fn install_iotc_library(app_path: &Path, arch: Arch, dest: &Path) -> InstallResult<bool> {
    let source = app_path.join("lib").join(arch.iotc_library());
    let wanted = fs::read(&source).map_err(|e| InstallerError::fs(&source, e))?;

    if dest.is_file() {
        let current = fs::read(dest).map_err(|e| InstallerError::fs(dest, e))?;
        if current == wanted {
            debug!("{} is up to date", dest.display());
            return Ok(false);
        }
    }

    info!("Installing IOTC library {} to {}", source.display(), dest.display());
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| InstallerError::fs(parent, e))?;
    }
    fs::write(dest, wanted).map_err(|e| InstallerError::fs(dest, e))?;
    set_mode(dest, 0o755)?;
    Ok(true)
}

/// Create the user-editable app env file unless it already exists.
///
/// Only the file is handed to `owner`; a newly created parent stays with the
/// installer at mode 0750.
pub fn write_app_env_template(path: &Path, owner: &ServiceAccount) -> InstallResult<bool> {
    if path.exists() {
        info!("Keeping existing configuration at {}", path.display());
        return Ok(false);
    }

    if let Some(parent) = path.parent()
        && !parent.is_dir()
    {
        fs::create_dir_all(parent).map_err(|e| InstallerError::fs(parent, e))?;
        set_mode(parent, 0o750)?;
    }

    info!("Creating application configuration file: {}", path.display());
    fs::write(path, APP_ENV_TEMPLATE).map_err(|e| InstallerError::fs(path, e))?;
    set_mode(path, 0o600)?;
    if let Err(e) = give_to(path, owner) {
        warn!("Could not hand {} to {}: {e}", path.display(), owner.name);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::{Gid, Uid};
    use std::os::unix::fs::{MetadataExt, PermissionsExt};

    fn current_account() -> ServiceAccount {
        ServiceAccount {
            name: "current".to_string(),
            uid: Uid::current(),
            gid: Gid::current(),
            home: PathBuf::from("/tmp"),
        }
    }

    fn fake_install(dir: &Path) -> BridgeApp {
        fs::create_dir_all(dir.join("wyzebridge")).unwrap();
        fs::write(dir.join("frontend.py"), "app = None\n").unwrap();
        fs::write(dir.join(".env"), "VERSION=2.9.12\nMTX_TAG=1.8.0\n").unwrap();
        fs::write(
            dir.join("wyzebridge/mtx_server.py"),
            "cmd = \"/app/mediamtx /app/mediamtx.yml\"\n",
        )
        .unwrap();
        BridgeApp::new(dir)
    }

    #[test]
    fn test_installed_version() {
        let dir = tempfile::tempdir().unwrap();
        let app = BridgeApp::new(dir.path());
        assert_eq!(app.installed_version().unwrap(), None);

        let app = fake_install(dir.path());
        assert!(app.is_installed());
        assert_eq!(app.installed_version().unwrap().as_deref(), Some("2.9.12"));
    }

    #[test]
    fn test_patch_mediamtx_path() {
        let dir = tempfile::tempdir().unwrap();
        let app = fake_install(dir.path());
        let binary = Path::new("/srv/mediamtx/mediamtx");

        assert!(app.patch_mediamtx_path(binary).unwrap());
        let patched = fs::read_to_string(dir.path().join("wyzebridge/mtx_server.py")).unwrap();
        assert_eq!(
            patched,
            "cmd = \"/srv/mediamtx/mediamtx /srv/mediamtx/mediamtx.yml\"\n"
        );

        assert!(!app.patch_mediamtx_path(binary).unwrap());
    }

    #[test]
    fn test_patch_without_launcher_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("frontend.py"), "app = None\n").unwrap();
        let app = BridgeApp::new(dir.path());

        assert!(!app.patch_mediamtx_path(Path::new("/srv/mediamtx/mediamtx")).unwrap());
        assert!(!dir.path().join("wyzebridge").exists());
    }

    #[test]
    fn test_iotc_library_copied_once() {
        let dir = tempfile::tempdir().unwrap();
        let app_path = dir.path().join("app");
        fs::create_dir_all(app_path.join("lib")).unwrap();
        fs::write(app_path.join("lib/lib.amd64"), b"\x7fELF").unwrap();
        let dest = dir.path().join("usr/local/lib/libIOTCAPIs_ALL.so");

        assert!(install_iotc_library(&app_path, Arch::Amd64, &dest).unwrap());
        assert!(!install_iotc_library(&app_path, Arch::Amd64, &dest).unwrap());
        assert_eq!(fs::read(&dest).unwrap(), b"\x7fELF");
    }

    #[test]
    fn test_app_env_template_not_clobbered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("etc/app.env");
        let owner = current_account();

        assert!(write_app_env_template(&path, &owner).unwrap());
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        fs::write(&path, "WYZE_EMAIL=me@example.com\n").unwrap();
        assert!(!write_app_env_template(&path, &owner).unwrap());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "WYZE_EMAIL=me@example.com\n"
        );
    }

    #[test]
    fn test_app_env_parent_stays_with_installer() {
        let dir = tempfile::tempdir().unwrap();
        let conf_dir = dir.path().join("etc/wyze-bridge");
        let nobody = ServiceAccount {
            name: "nobody".to_string(),
            uid: Uid::from_raw(65534),
            gid: Gid::from_raw(65534),
            home: PathBuf::from("/nonexistent"),
        };

        assert!(write_app_env_template(&conf_dir.join("app.env"), &nobody).unwrap());

        let meta = fs::metadata(&conf_dir).unwrap();
        assert_eq!(meta.uid(), Uid::current().as_raw());
        assert_eq!(meta.permissions().mode() & 0o777, 0o750);
    }

    #[tokio::test]
    async fn test_extract_filter_keeps_app_tree() {
        let dir = tempfile::tempdir().unwrap();
        let archive = download::tar_gz(&[
            ("mrlt8-docker-wyze-bridge-abc/README.md", b"readme"),
            ("mrlt8-docker-wyze-bridge-abc/app/frontend.py", b"app"),
            ("mrlt8-docker-wyze-bridge-abc/app/wyzebridge/mtx_server.py", b"x"),
        ]);
        let written = download::unpack(
            archive,
            dir.path().to_path_buf(),
            ExtractFilter::containing("/app/").strip(2),
        )
        .await
        .unwrap();

        assert_eq!(written.len(), 2);
        assert!(dir.path().join("frontend.py").is_file());
        assert!(dir.path().join("wyzebridge/mtx_server.py").is_file());
        assert!(!dir.path().join("README.md").exists());
    }
}
