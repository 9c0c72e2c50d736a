//! OpenRC init script generation and control (Alpine).

use std::path::PathBuf;

use super::{FrontEnd, SERVICE_NAME, UnitSpec};
use crate::error::{InstallResult, InstallerError};
use crate::install::command::{self, COMMAND_TIMEOUT};

const OUTPUT_LOG: &str = "/var/log/wyze-bridge.log";

pub(super) fn script_path() -> PathBuf {
    PathBuf::from(format!("/etc/init.d/{SERVICE_NAME}"))
}

fn command_args(unit: &UnitSpec) -> String {
    match unit.front_end {
        // start-stop-daemon runs as root here, gunicorn drops privileges itself
        FrontEnd::Gunicorn => format!(
            "--bind={}:{} --workers=1 --threads=1 -u {user} -g {user} frontend:create_app()",
            unit.ip,
            unit.port,
            user = unit.user
        ),
        FrontEnd::Flask => format!("--app frontend run --host {} --port {}", unit.ip, unit.port),
    }
}

pub(super) fn render(unit: &UnitSpec) -> String {
    let app_path = unit.app_path.display();
    let bridge_env = unit.bridge_env();
    let bridge_env = bridge_env.display();
    let app_conf = unit.app_conf.display();

    format!(
        r#"#!/sbin/openrc-run

description="{SERVICE_NAME} daemon"

command="{command}"
command_args="{args}"
command_user="{user}"
command_background="yes"
output_log="{OUTPUT_LOG}"

depend() {{
    need net
}}

start_pre() {{
    ebegin "Setting up environment"
    if [ -f {bridge_env} ]; then
        export $(grep -v '^#' {bridge_env} | xargs)
    fi
    if [ -f {app_conf} ]; then
        export $(grep -v '^#' {app_conf} | xargs)
    fi
}}

start() {{
    ebegin "Starting {SERVICE_NAME}"
    start-stop-daemon -S -d {app_path} -x $command -- $command_args >> $output_log 2>&1 &
    eend $?
}}

stop() {{
    ebegin "Stopping {SERVICE_NAME}"
    start-stop-daemon --stop --retry 3 --name {process}
    eend $?
}}
"#,
        command = unit.executable.display(),
        args = command_args(unit),
        user = unit.user,
        process = unit.front_end.program(),
    )
}

async fn rc(program: &str, args: &[&str]) -> InstallResult<()> {
    command::run(program, args, COMMAND_TIMEOUT)
        .await
        .map_err(|e| InstallerError::Service(e.to_string()))?;
    Ok(())
}

/// Add the service to the default runlevel.
pub(super) async fn enable() -> InstallResult<()> {
    rc("rc-update", &["add", SERVICE_NAME, "default"]).await
}

/// `restart` also starts a stopped service.
pub(super) async fn restart() -> InstallResult<()> {
    rc("rc-service", &[SERVICE_NAME, "restart"]).await
}
