//! CLI argument parsing for wyze-bridge-install

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::SettingsOverrides;

/// Action to perform.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// First-time installation
    Install,
    /// Update an existing installation in place
    Update,
    /// Print resolved settings without changing anything
    ShowSettings,
}

/// Command-line arguments for wyze-bridge-install
#[derive(Parser, Debug, Clone)]
#[command(name = "wyze-bridge-install")]
#[command(version, about = "Manage Wyze Bridge installation and updates.")]
pub struct Cli {
    /// Action to perform.
    #[arg(value_enum)]
    pub action: Action,

    /// Path to env file containing docker-wyze-bridge settings.
    #[arg(long = "APP_CONF", help_heading = "Application Settings")]
    pub app_conf: Option<PathBuf>,

    /// Use Gunicorn for frontend service.
    #[arg(long = "APP_GUNICORN", help_heading = "Application Settings")]
    pub app_gunicorn: Option<String>,

    /// IP address on which docker-wyze-bridge will listen.
    #[arg(long = "APP_IP", help_heading = "Application Settings")]
    pub app_ip: Option<String>,

    /// Location of docker-wyze-bridge application.
    #[arg(long = "APP_PATH", help_heading = "Application Settings")]
    pub app_path: Option<PathBuf>,

    /// Port on which docker-wyze-bridge will listen.
    #[arg(long = "APP_PORT", help_heading = "Application Settings")]
    pub app_port: Option<String>,

    /// User account used to run the docker-wyze-bridge.
    #[arg(long = "APP_USER", help_heading = "Application Settings")]
    pub app_user: Option<String>,

    /// Version of docker-wyze-bridge to install.
    #[arg(long = "APP_VERSION", help_heading = "Application Settings")]
    pub app_version: Option<String>,

    /// Version of mediamtx to install.
    #[arg(long = "MEDIA_MTX_VERSION", help_heading = "MediaMTX Settings")]
    pub media_mtx_version: Option<String>,

    /// Location of mediamtx application.
    #[arg(long = "MEDIA_MTX_PATH", help_heading = "MediaMTX Settings")]
    pub media_mtx_path: Option<PathBuf>,

    /// Path to file containing settings of this script, used for updates.
    #[arg(long = "INSTALLATION_CONF")]
    pub installation_conf: Option<PathBuf>,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Settings supplied on the command line.
    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            app_conf: self.app_conf.clone(),
            app_gunicorn: self.app_gunicorn.clone(),
            app_ip: self.app_ip.clone(),
            app_path: self.app_path.clone(),
            app_port: self.app_port.clone(),
            app_user: self.app_user.clone(),
            app_version: self.app_version.clone(),
            media_mtx_version: self.media_mtx_version.clone(),
            media_mtx_path: self.media_mtx_path.clone(),
            installation_conf: self.installation_conf.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_action_and_overrides() {
        let cli = Cli::try_parse_from([
            "wyze-bridge-install",
            "update",
            "--APP_VERSION",
            "2.10.3",
            "--APP_PORT",
            "5050",
            "--MEDIA_MTX_PATH",
            "/opt/mediamtx",
        ])
        .unwrap();

        assert_eq!(cli.action, Action::Update);
        let o = cli.overrides();
        assert_eq!(o.app_version.as_deref(), Some("2.10.3"));
        assert_eq!(o.app_port.as_deref(), Some("5050"));
        assert_eq!(o.media_mtx_path, Some(PathBuf::from("/opt/mediamtx")));
        assert!(o.app_ip.is_none());
        assert!(o.installation_conf.is_none());
    }

    #[test]
    fn test_show_settings_action_name() {
        let cli = Cli::try_parse_from(["wyze-bridge-install", "show-settings"]).unwrap();
        assert_eq!(cli.action, Action::ShowSettings);
    }

    #[test]
    fn test_unknown_action_rejected() {
        assert!(Cli::try_parse_from(["wyze-bridge-install", "uninstall"]).is_err());
        assert!(Cli::try_parse_from(["wyze-bridge-install"]).is_err());
    }
}
