//! Init system detection and service unit management
//!
//! ## Module Organization
//!
//! - `systemd` - `.service` unit rendering and `systemctl` control
//! - `openrc` - `/etc/init.d` script rendering and `rc-service` control

mod openrc;
mod systemd;

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::config::Settings;
use crate::error::{InstallResult, InstallerError};
use crate::install::file_ops::{set_mode, write_file_atomic};
use crate::install::pyenv::VirtualEnv;

pub const SERVICE_NAME: &str = "wyze-bridge";

/// Supported service managers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitSystem {
    Systemd,
    OpenRc,
}

impl InitSystem {
    /// Detect the host's init system.
    pub fn detect() -> InstallResult<Self> {
        Self::detect_in(Path::new("/"))
    }

    /// Detect the init system of the filesystem tree at `root`.
    pub fn detect_in(root: &Path) -> InstallResult<Self> {
        let found = if root.join("usr/bin/systemctl").is_file() {
            InitSystem::Systemd
        } else if root.join("sbin/rc-update").is_file() {
            InitSystem::OpenRc
        } else {
            return Err(InstallerError::UnsupportedInitSystem);
        };
        debug!("Detected init system: {found:?}");
        Ok(found)
    }

    pub fn unit_path(&self) -> PathBuf {
        match self {
            InitSystem::Systemd => systemd::unit_path(),
            InitSystem::OpenRc => openrc::script_path(),
        }
    }

    pub fn render(&self, unit: &UnitSpec) -> String {
        match self {
            InitSystem::Systemd => systemd::render(unit),
            InitSystem::OpenRc => openrc::render(unit),
        }
    }

    fn unit_mode(&self) -> u32 {
        match self {
            InitSystem::Systemd => 0o644,
            InitSystem::OpenRc => 0o755,
        }
    }

    /// Where the service's output (and the generated wbadmin password) ends up.
    pub fn log_hint(&self) -> &'static str {
        match self {
            InitSystem::Systemd => "Check log output by running `journalctl -u wyze-bridge.service`",
            InitSystem::OpenRc => "Check log output at /var/log/wyze-bridge.log",
        }
    }

    /// Render `unit` into the filesystem tree at `root`.
    ///
    /// Returns whether the unit content changed.
    pub fn write_in(&self, root: &Path, unit: &UnitSpec) -> InstallResult<bool> {
        let path = self.unit_path();
        let relative = path.strip_prefix("/").unwrap_or(&path);
        write_unit(&root.join(relative), &self.render(unit), self.unit_mode())
    }

    /// Write the unit for `unit` and register it with the init system.
    ///
    /// Returns whether the unit content changed.
    pub async fn install(&self, unit: &UnitSpec) -> InstallResult<bool> {
        let changed = self.write_in(Path::new("/"), unit)?;
        match self {
            InitSystem::Systemd => systemd::enable().await?,
            InitSystem::OpenRc => openrc::enable().await?,
        }
        Ok(changed)
    }

    pub async fn restart(&self) -> InstallResult<()> {
        info!("Restarting {SERVICE_NAME} service");
        match self {
            InitSystem::Systemd => systemd::restart().await,
            InitSystem::OpenRc => openrc::restart().await,
        }
    }
}

/// Front-end server the unit launches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontEnd {
    /// Flask development server
    Flask,
    /// Gunicorn WSGI server
    Gunicorn,
}

impl FrontEnd {
    pub fn from_gunicorn_flag(gunicorn: bool) -> Self {
        if gunicorn { FrontEnd::Gunicorn } else { FrontEnd::Flask }
    }

    /// Executable name, also the process name matched on stop.
    pub fn program(&self) -> &'static str {
        match self {
            FrontEnd::Flask => "flask",
            FrontEnd::Gunicorn => "gunicorn",
        }
    }
}

/// Everything needed to render a service unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSpec {
    pub user: String,
    pub app_path: PathBuf,
    pub app_conf: PathBuf,
    pub executable: PathBuf,
    pub front_end: FrontEnd,
    pub ip: String,
    pub port: u16,
}

impl UnitSpec {
    pub fn new(settings: &Settings, venv: &VirtualEnv) -> Self {
        let front_end = FrontEnd::from_gunicorn_flag(settings.app_gunicorn);
        Self {
            user: settings.app_user.clone(),
            app_path: settings.app_path.clone(),
            app_conf: settings.app_conf.clone(),
            executable: venv.bin(front_end.program()),
            front_end,
            ip: settings.app_ip.clone(),
            port: settings.app_port,
        }
    }

    pub fn bridge_env(&self) -> PathBuf {
        self.app_path.join(".env")
    }
}

/// Write `content` to `path` with `mode` unless it is already identical.
pub fn write_unit(path: &Path, content: &str, mode: u32) -> InstallResult<bool> {
    let unchanged = fs::read_to_string(path)
        .map(|current| current == content)
        .unwrap_or(false);
    if unchanged {
        debug!("{} is up to date", path.display());
        return Ok(false);
    }

    info!("Writing service unit {}", path.display());
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| InstallerError::fs(parent, e))?;
    }
    write_file_atomic(path, content)?;
    set_mode(path, mode)?;
    Ok(true)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    pub(crate) fn unit(front_end: FrontEnd) -> UnitSpec {
        UnitSpec {
            user: "wyze".to_string(),
            app_path: PathBuf::from("/srv/wyze-bridge"),
            app_conf: PathBuf::from("/etc/wyze-bridge/app.env"),
            executable: PathBuf::from("/home/wyze/.wyze-venv/bin").join(front_end.program()),
            front_end,
            ip: "0.0.0.0".to_string(),
            port: 5000,
        }
    }

    #[test]
    fn test_detect_systemd_preferred() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("usr/bin")).unwrap();
        fs::create_dir_all(root.path().join("sbin")).unwrap();
        fs::write(root.path().join("usr/bin/systemctl"), "").unwrap();
        fs::write(root.path().join("sbin/rc-update"), "").unwrap();

        assert_eq!(InitSystem::detect_in(root.path()).unwrap(), InitSystem::Systemd);
    }

    #[test]
    fn test_detect_openrc() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("sbin")).unwrap();
        fs::write(root.path().join("sbin/rc-update"), "").unwrap();

        assert_eq!(InitSystem::detect_in(root.path()).unwrap(), InitSystem::OpenRc);
    }

    #[test]
    fn test_detect_unsupported() {
        let root = tempfile::tempdir().unwrap();
        let err = InitSystem::detect_in(root.path()).unwrap_err();
        assert!(matches!(err, InstallerError::UnsupportedInitSystem));
    }

    #[test]
    fn test_unsupported_init_system_writes_nothing() {
        let root = tempfile::tempdir().unwrap();
        let spec = unit(FrontEnd::Flask);

        let err = InitSystem::detect_in(root.path())
            .and_then(|init| init.write_in(root.path(), &spec))
            .unwrap_err();

        assert!(matches!(err, InstallerError::UnsupportedInitSystem));
        assert!(!root.path().join("etc/systemd/system/wyze-bridge.service").exists());
        assert!(!root.path().join("etc/init.d/wyze-bridge").exists());
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_detected_init_system_writes_its_unit() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("sbin")).unwrap();
        fs::write(root.path().join("sbin/rc-update"), "").unwrap();

        let init = InitSystem::detect_in(root.path()).unwrap();
        assert!(init.write_in(root.path(), &unit(FrontEnd::Flask)).unwrap());

        let script = root.path().join("etc/init.d/wyze-bridge");
        let mode = fs::metadata(&script).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert!(!root.path().join("etc/systemd").exists());
    }

    #[test]
    fn test_unit_spec_from_settings() {
        let mut settings = Settings::default();
        settings.app_gunicorn = true;
        settings.app_port = 8080;
        let venv = VirtualEnv::new("/home/wyze/.wyze-venv");

        let unit = UnitSpec::new(&settings, &venv);
        assert_eq!(unit.front_end, FrontEnd::Gunicorn);
        assert_eq!(unit.executable, PathBuf::from("/home/wyze/.wyze-venv/bin/gunicorn"));
        assert_eq!(unit.port, 8080);
        assert_eq!(unit.bridge_env(), PathBuf::from("/srv/wyze-bridge/.env"));
    }

    #[test]
    fn test_write_unit_reports_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("init.d/wyze-bridge");

        assert!(write_unit(&path, "#!/sbin/openrc-run\n", 0o755).unwrap());
        assert!(!write_unit(&path, "#!/sbin/openrc-run\n", 0o755).unwrap());
        assert!(write_unit(&path, "#!/sbin/openrc-run\n# v2\n", 0o755).unwrap());

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
