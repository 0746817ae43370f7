//! Syntax check execution.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use guardian_core::{GuardianError, Result};
use tokio::process::Command;
use tracing::debug;

use crate::check::CheckConfig;

/// Result of one check execution.
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Check name.
    pub check_name: String,

    /// Exit code (0 = success).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Whether execution succeeded.
    pub success: bool,
}

impl CheckResult {
    /// Whether this check passed (exit code 0).
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }
}

/// Runs external check commands.
pub struct CheckRunner;

impl CheckRunner {
    /// Run `config` against `file` and return the result.
    ///
    /// Spawn failures and timeouts are errors; a non-zero exit is a failed
    /// result.
    pub async fn execute(config: &CheckConfig, file: &Path) -> Result<CheckResult> {
        let start = Instant::now();

        let argv = config.argv_for(file);
        let Some((exe, args)) = argv.split_first() else {
            return Err(GuardianError::Validation(format!(
                "check {} has empty command",
                config.name
            )));
        };

        let mut command = Command::new(exe);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| {
            GuardianError::Validation(format!("check {} could not start {exe}: {e}", config.name))
        })?;

        let output = if config.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(config.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| {
                GuardianError::Validation(format!(
                    "check {} timed out after {} seconds",
                    config.name, config.timeout_secs
                ))
            })??
        } else {
            child.wait_with_output().await?
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        debug!(check = %config.name, exit_code, duration_ms, "check finished");

        Ok(CheckResult {
            check_name: config.name.clone(),
            exit_code,
            stdout,
            stderr,
            duration_ms,
            success: output.status.success(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_passed() {
        let result = CheckResult {
            check_name: "py_compile".to_string(),
            exit_code: 0,
            stdout: "".to_string(),
            stderr: "".to_string(),
            duration_ms: 100,
            success: true,
        };
        assert!(result.passed());
    }

    #[test]
    fn test_check_result_failed() {
        let result = CheckResult {
            check_name: "py_compile".to_string(),
            exit_code: 1,
            stdout: "".to_string(),
            stderr: "SyntaxError".to_string(),
            duration_ms: 100,
            success: false,
        };
        assert!(!result.passed());
    }

    #[tokio::test]
    async fn test_execute_substitutes_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("ok.txt");
        std::fs::write(&file, "def ok():\n    pass\n").unwrap();

        let config = CheckConfig::custom(
            "grep_def",
            vec!["grep".into(), "-q".into(), "def ".into(), "{file}".into()],
            &["txt"],
            60,
        );
        let result = CheckRunner::execute(&config, &file).await.expect("execute failed");
        assert!(result.passed());
    }

    #[tokio::test]
    async fn test_execute_failing_command() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bad.txt");
        std::fs::write(&file, "nothing here\n").unwrap();

        let config = CheckConfig::custom(
            "grep_def",
            vec!["grep".into(), "-q".into(), "def ".into()],
            &["txt"],
            60,
        );
        let result = CheckRunner::execute(&config, &file).await.expect("execute failed");
        assert!(!result.passed());
        assert_ne!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn test_execute_missing_binary_is_error() {
        let config = CheckConfig::custom(
            "missing",
            vec!["definitely-not-a-real-checker-binary".into()],
            &["x"],
            5,
        );
        let err = CheckRunner::execute(&config, Path::new("a.x")).await.unwrap_err();
        assert!(err.to_string().contains("could not start"));
    }

    #[tokio::test]
    async fn test_execute_timeout_is_error() {
        let config = CheckConfig::custom(
            "sleepy",
            vec!["sh".into(), "-c".into(), "sleep 5 # {file}".into()],
            &["x"],
            1,
        );
        let err = CheckRunner::execute(&config, Path::new("a.x")).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
