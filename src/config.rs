//! Installer settings: built-in defaults, the persisted JSON file, and CLI
//! overrides merged into one [`Settings`] value.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{InstallResult, InstallerError};
use crate::install::file_ops::set_mode;

pub const DEFAULT_INSTALLATION_CONF: &str = "/etc/wyze-bridge/install.json";
pub const LATEST: &str = "latest";

/// Resolved installer settings.
///
/// Field names serialize in the upper-case form used on the command line so the
/// persisted file and the CLI flags share one vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct Settings {
    pub app_conf: PathBuf,
    #[serde(deserialize_with = "de_bool")]
    pub app_gunicorn: bool,
    pub app_ip: String,
    pub app_path: PathBuf,
    #[serde(deserialize_with = "de_port")]
    pub app_port: u16,
    pub app_user: String,
    pub app_version: String,
    pub media_mtx_version: String,
    pub media_mtx_path: PathBuf,
    /// Location of the persisted settings file; never written into itself.
    #[serde(skip)]
    pub installation_conf: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_conf: PathBuf::from("/etc/wyze-bridge/app.env"),
            app_gunicorn: false,
            app_ip: "0.0.0.0".into(),
            app_path: PathBuf::from("/srv/wyze-bridge"),
            app_port: 5000,
            app_user: "wyze".into(),
            app_version: LATEST.into(),
            media_mtx_version: LATEST.into(),
            media_mtx_path: PathBuf::from("/srv/mediamtx"),
            installation_conf: PathBuf::from(DEFAULT_INSTALLATION_CONF),
        }
    }
}

/// Values supplied on the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub app_conf: Option<PathBuf>,
    pub app_gunicorn: Option<String>,
    pub app_ip: Option<String>,
    pub app_path: Option<PathBuf>,
    pub app_port: Option<String>,
    pub app_user: Option<String>,
    pub app_version: Option<String>,
    pub media_mtx_version: Option<String>,
    pub media_mtx_path: Option<PathBuf>,
    pub installation_conf: Option<PathBuf>,
}

/// One row of `show-settings` output.
pub struct SettingEntry {
    pub key: &'static str,
    pub description: &'static str,
    pub value: String,
}

impl Settings {
    /// Merge defaults, the persisted file and `overrides`, in that order.
    ///
    /// `--INSTALLATION_CONF` decides which file is read. A missing file is not
    /// an error; a malformed one is.
    pub fn resolve(overrides: &SettingsOverrides) -> InstallResult<Self> {
        let conf_path = overrides
            .installation_conf
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_INSTALLATION_CONF));

        let mut settings = Self::load(&conf_path)?;
        settings.apply(overrides)?;
        Ok(settings)
    }

    /// Load the persisted file at `path`, falling back to defaults when absent.
    pub fn load(path: &Path) -> InstallResult<Self> {
        let mut settings = if path.is_file() {
            let raw = fs::read_to_string(path).map_err(|e| InstallerError::fs(path, e))?;
            debug!("Read persisted settings from {}", path.display());
            serde_json::from_str::<Settings>(&raw).map_err(|e| {
                InstallerError::Config(format!(
                    "unexpected error reading {}: {e}",
                    path.display()
                ))
            })?
        } else {
            Settings::default()
        };
        settings.installation_conf = path.to_path_buf();
        Ok(settings)
    }

    /// Apply CLI overrides on top of the current values.
    pub fn apply(&mut self, o: &SettingsOverrides) -> InstallResult<()> {
        if let Some(v) = &o.app_conf {
            self.app_conf = v.clone();
        }
        if let Some(v) = &o.app_gunicorn {
            self.app_gunicorn = parse_bool(v)?;
        }
        if let Some(v) = &o.app_ip {
            self.app_ip = v.clone();
        }
        if let Some(v) = &o.app_path {
            self.app_path = v.clone();
        }
        if let Some(v) = &o.app_port {
            self.app_port = parse_port(v)?;
        }
        if let Some(v) = &o.app_user {
            self.app_user = v.clone();
        }
        if let Some(v) = &o.app_version {
            self.app_version = v.clone();
        }
        if let Some(v) = &o.media_mtx_version {
            self.media_mtx_version = v.clone();
        }
        if let Some(v) = &o.media_mtx_path {
            self.media_mtx_path = v.clone();
        }
        if let Some(v) = &o.installation_conf {
            self.installation_conf = v.clone();
        }
        Ok(())
    }

    /// Persist everything except `INSTALLATION_CONF` to `installation_conf`.
    pub fn save(&self) -> InstallResult<()> {
        let path = &self.installation_conf;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.is_dir()
        {
            fs::create_dir_all(parent).map_err(|e| InstallerError::fs(parent, e))?;
            set_mode(parent, 0o750)?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| InstallerError::Config(format!("failed to serialize settings: {e}")))?;
        fs::write(path, json).map_err(|e| InstallerError::fs(path, e))?;

        info!("Saved installer settings to {}", path.display());
        Ok(())
    }

    /// Every setting with its description, in CLI order.
    pub fn entries(&self) -> Vec<SettingEntry> {
        let entry = |key, description, value: String| SettingEntry {
            key,
            description,
            value,
        };
        vec![
            entry(
                "APP_CONF",
                "Path to env file containing docker-wyze-bridge settings.",
                self.app_conf.display().to_string(),
            ),
            entry(
                "APP_GUNICORN",
                "Use Gunicorn for frontend service.",
                self.app_gunicorn.to_string(),
            ),
            entry(
                "APP_IP",
                "IP address on which docker-wyze-bridge will listen.",
                self.app_ip.clone(),
            ),
            entry(
                "APP_PATH",
                "Location of docker-wyze-bridge application.",
                self.app_path.display().to_string(),
            ),
            entry(
                "APP_PORT",
                "Port on which docker-wyze-bridge will listen.",
                self.app_port.to_string(),
            ),
            entry(
                "APP_USER",
                "User account used to run the docker-wyze-bridge.",
                self.app_user.clone(),
            ),
            entry(
                "APP_VERSION",
                "Version of docker-wyze-bridge to install.",
                self.app_version.clone(),
            ),
            entry(
                "MEDIA_MTX_VERSION",
                "Version of mediamtx to install.",
                self.media_mtx_version.clone(),
            ),
            entry(
                "MEDIA_MTX_PATH",
                "Location of mediamtx application.",
                self.media_mtx_path.display().to_string(),
            ),
            entry(
                "INSTALLATION_CONF",
                "Path to file containing settings of this script, used for updates.",
                self.installation_conf.display().to_string(),
            ),
        ]
    }

    /// `host:port` the bridge front-end binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.app_ip, self.app_port)
    }
}

/// Accepts the usual yes/no spellings, case-insensitively.
pub fn parse_bool(value: &str) -> InstallResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "t" | "y" | "1" => Ok(true),
        "no" | "false" | "f" | "n" | "0" => Ok(false),
        other => Err(InstallerError::Config(format!(
            "boolean value expected, got `{other}`"
        ))),
    }
}

fn parse_port(value: &str) -> InstallResult<u16> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|_| InstallerError::Config(format!("invalid port `{value}`")))
}

// Older installers persisted CLI values verbatim, so numbers and flags may
// arrive as strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum Loose<T> {
    Typed(T),
    Text(String),
}

fn de_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    match Loose::<bool>::deserialize(d)? {
        Loose::Typed(b) => Ok(b),
        Loose::Text(s) => parse_bool(&s).map_err(serde::de::Error::custom),
    }
}

fn de_port<'de, D: Deserializer<'de>>(d: D) -> Result<u16, D::Error> {
    match Loose::<u16>::deserialize(d)? {
        Loose::Typed(p) => Ok(p),
        Loose::Text(s) => parse_port(&s).map_err(serde::de::Error::custom),
    }
}
