//! Systemd unit file generation and control.

use std::path::PathBuf;

use super::{FrontEnd, SERVICE_NAME, UnitSpec};
use crate::error::{InstallResult, InstallerError};
use crate::install::command::{self, COMMAND_TIMEOUT};

pub(super) fn unit_path() -> PathBuf {
    PathBuf::from(format!("/etc/systemd/system/{SERVICE_NAME}.service"))
}

fn exec_start(unit: &UnitSpec) -> String {
    let exe = unit.executable.display();
    match unit.front_end {
        FrontEnd::Gunicorn => format!(
            "{exe} --bind={}:{} --workers=1 --threads=1 'frontend:create_app()'",
            unit.ip, unit.port
        ),
        FrontEnd::Flask => format!(
            "{exe} --app frontend run --host {} --port {}",
            unit.ip, unit.port
        ),
    }
}

pub(super) fn render(unit: &UnitSpec) -> String {
    let mut content = String::with_capacity(512);

    content.push_str("[Unit]\n");
    content.push_str(&format!("Description={SERVICE_NAME} daemon\n"));
    content.push_str("After=network.target\n\n");

    content.push_str("[Service]\n");
    content.push_str(&format!("User={}\n", unit.user));
    content.push_str(&format!("Group={}\n", unit.user));
    content.push_str(&format!("WorkingDirectory={}\n", unit.app_path.display()));
    // later files override earlier ones
    content.push_str(&format!("EnvironmentFile={}\n", unit.bridge_env().display()));
    content.push_str(&format!("EnvironmentFile={}\n", unit.app_conf.display()));
    content.push_str(&format!("ExecStart={}\n", exec_start(unit)));
    content.push_str("KillMode=mixed\n");
    content.push_str("TimeoutStopSec=5\n");
    content.push_str("PrivateTmp=true\n");
    content.push_str("Restart=always\n\n");

    content.push_str("[Install]\n");
    content.push_str("WantedBy=multi-user.target\n");

    content
}

async fn systemctl(args: &[&str]) -> InstallResult<()> {
    command::run("systemctl", args, COMMAND_TIMEOUT)
        .await
        .map_err(|e| InstallerError::Service(e.to_string()))?;
    Ok(())
}

/// Reload unit files and enable the service at boot.
pub(super) async fn enable() -> InstallResult<()> {
    systemctl(&["daemon-reload"]).await?;
    systemctl(&["enable", format!("{SERVICE_NAME}.service").as_str()]).await
}

pub(super) async fn restart() -> InstallResult<()> {
    systemctl(&["restart", SERVICE_NAME]).await
}

#[cfg(test)]
mod tests {
    use super::super::tests::unit;
    use super::*;

    #[test]
    fn test_render_flask() {
        let rendered = render(&unit(FrontEnd::Flask));
        assert!(rendered.starts_with("[Unit]\nDescription=wyze-bridge daemon\n"));
        assert!(rendered.contains("User=wyze\nGroup=wyze\n"));
        assert!(rendered.contains("WorkingDirectory=/srv/wyze-bridge\n"));
        assert!(rendered.contains(
            "EnvironmentFile=/srv/wyze-bridge/.env\nEnvironmentFile=/etc/wyze-bridge/app.env\n"
        ));
        assert!(rendered.contains(
            "ExecStart=/home/wyze/.wyze-venv/bin/flask --app frontend run --host 0.0.0.0 --port 5000\n"
        ));
        assert!(rendered.ends_with("[Install]\nWantedBy=multi-user.target\n"));
    }

    #[test]
    fn test_render_gunicorn() {
        let rendered = render(&unit(FrontEnd::Gunicorn));
        assert!(rendered.contains(
            "ExecStart=/home/wyze/.wyze-venv/bin/gunicorn --bind=0.0.0.0:5000 --workers=1 --threads=1 'frontend:create_app()'\n"
        ));
    }

    #[test]
    fn test_unit_path() {
        assert_eq!(unit_path(), PathBuf::from("/etc/systemd/system/wyze-bridge.service"));
    }
}
