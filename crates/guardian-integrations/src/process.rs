//! Subprocess execution shared by the CLI-backed collaborators.

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;

use crate::error::IntegrationError;
use crate::Result;

/// Run `program args..` in `cwd` and capture its output.
///
/// A missing executable maps to `ToolNotFound`; `timeout_secs == 0` means no
/// limit. The exit status is left for the caller to judge.
pub(crate) async fn capture<I, S>(
    program: &str,
    args: I,
    cwd: Option<&Path>,
    timeout_secs: u64,
) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let child = command.spawn().map_err(|e| match e.kind() {
        ErrorKind::NotFound => IntegrationError::ToolNotFound {
            tool: program.to_string(),
        },
        _ => IntegrationError::Io(e),
    })?;

    if timeout_secs == 0 {
        return Ok(child.wait_with_output().await?);
    }
    match tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output()).await {
        Ok(output) => Ok(output?),
        Err(_) => Err(IntegrationError::Timeout {
            command: program.to_string(),
            secs: timeout_secs,
        }),
    }
}

pub(crate) fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}
