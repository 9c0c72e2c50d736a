//! Subprocess execution with timeouts

use std::ffi::OsStr;
use std::process::Output;
use std::time::Duration;

use log::debug;
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::{InstallResult, InstallerError};

pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(300); // 5 minutes default
pub const PIP_TIMEOUT: Duration = Duration::from_secs(1800); // dependency builds can be slow

/// Run `program` with `args`, failing on spawn error, timeout or non-zero exit.
pub async fn run<I, S>(program: &str, args: I, limit: Duration) -> InstallResult<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args).kill_on_drop(true);
    let rendered = render(program, &cmd);
    debug!("Running {rendered}");

    let output = timeout(limit, cmd.output())
        .await
        .map_err(|_| InstallerError::Command {
            command: rendered.clone(),
            detail: format!("timed out after {} seconds", limit.as_secs()),
        })?
        .map_err(|e| InstallerError::Command {
            command: rendered.clone(),
            detail: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(InstallerError::Command {
            command: rendered,
            detail: format!("{}: {}", output.status, stderr.trim()),
        });
    }

    Ok(output)
}

/// Run `program` and return its output whatever the exit status.
///
/// `None` when it cannot be spawned or does not finish in time.
pub async fn try_output<I, S>(program: impl AsRef<OsStr>, args: I) -> Option<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args).kill_on_drop(true);
    match timeout(COMMAND_TIMEOUT, cmd.output()).await {
        Ok(Ok(output)) => Some(output),
        _ => None,
    }
}

fn render(program: &str, cmd: &Command) -> String {
    let args: Vec<String> = cmd
        .as_std()
        .get_args()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{program} {}", args.join(" "))
    }
}
