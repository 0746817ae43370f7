//! Syntax check definitions and configuration.

use std::path::Path;

use async_trait::async_trait;
use guardian_core::Result;
use serde::{Deserialize, Serialize};

use crate::runner::{CheckResult, CheckRunner};

/// Placeholder replaced by the path of the file under check.
pub const FILE_PLACEHOLDER: &str = "{file}";

/// Builtin syntax checks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinCheck {
    /// python -m py_compile <file>
    PythonCompile,
}

impl BuiltinCheck {
    /// Get the check name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinCheck::PythonCompile => "py_compile",
        }
    }

    /// Command line for the check, using `interpreter` as the executable.
    pub fn command(&self, interpreter: &str) -> Vec<String> {
        match self {
            BuiltinCheck::PythonCompile => vec![
                interpreter.to_string(),
                "-m".to_string(),
                "py_compile".to_string(),
                FILE_PLACEHOLDER.to_string(),
            ],
        }
    }

    /// File extensions this check understands.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            BuiltinCheck::PythonCompile => &["py"],
        }
    }
}

/// Configuration for an external syntax check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Human-readable check name.
    pub name: String,

    /// Command to execute (first element is executable). `{file}` is replaced
    /// by the checked path; if absent, the path is appended.
    pub command: Vec<String>,

    /// Extensions (without the dot) the check is registered for.
    pub extensions: Vec<String>,

    /// Timeout in seconds (0 = none).
    pub timeout_secs: u64,
}

impl CheckConfig {
    /// Create a check configuration from a builtin check.
    pub fn from_builtin(check: BuiltinCheck, interpreter: &str, timeout_secs: u64) -> Self {
        Self {
            name: check.name().to_string(),
            command: check.command(interpreter),
            extensions: check.extensions().iter().map(|e| e.to_string()).collect(),
            timeout_secs,
        }
    }

    /// Create a custom check configuration.
    pub fn custom(
        name: impl Into<String>,
        command: Vec<String>,
        extensions: &[&str],
        timeout_secs: u64,
    ) -> Self {
        Self {
            name: name.into(),
            command,
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
            timeout_secs,
        }
    }

    /// Concrete argv for checking `file`.
    pub fn argv_for(&self, file: &Path) -> Vec<String> {
        let path = file.to_string_lossy();
        let mut substituted = false;
        let mut argv: Vec<String> = self
            .command
            .iter()
            .map(|arg| {
                if arg.contains(FILE_PLACEHOLDER) {
                    substituted = true;
                    arg.replace(FILE_PLACEHOLDER, &path)
                } else {
                    arg.clone()
                }
            })
            .collect();
        if !substituted {
            argv.push(path.into_owned());
        }
        argv
    }
}

/// A syntax check for one kind of file.
#[async_trait]
pub trait SyntaxCheck: Send + Sync {
    fn name(&self) -> &str;

    /// Check `file`. An `Err` means the check could not run at all.
    async fn check(&self, file: &Path) -> Result<CheckResult>;
}

/// A syntax check backed by an external command.
#[derive(Debug, Clone)]
pub struct CommandCheck {
    config: CheckConfig,
}

impl CommandCheck {
    pub fn new(config: CheckConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }
}

#[async_trait]
impl SyntaxCheck for CommandCheck {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn check(&self, file: &Path) -> Result<CheckResult> {
        CheckRunner::execute(&self.config, file).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_python_compile() {
        let config = CheckConfig::from_builtin(BuiltinCheck::PythonCompile, "python3", 30);
        assert_eq!(config.name, "py_compile");
        assert_eq!(config.extensions, vec!["py".to_string()]);
        assert_eq!(
            config.argv_for(Path::new("/ws/app.py")),
            vec!["python3", "-m", "py_compile", "/ws/app.py"]
        );
    }

    #[test]
    fn test_argv_appends_path_without_placeholder() {
        let config = CheckConfig::custom("node", vec!["node".into(), "--check".into()], &["js"], 10);
        assert_eq!(
            config.argv_for(Path::new("a.js")),
            vec!["node", "--check", "a.js"]
        );
    }

    #[test]
    fn test_argv_substitutes_inside_argument() {
        let config = CheckConfig::custom(
            "ruby",
            vec!["ruby".into(), "-c".into(), "--file={file}".into()],
            &["rb"],
            10,
        );
        assert_eq!(
            config.argv_for(Path::new("x.rb")),
            vec!["ruby", "-c", "--file=x.rb"]
        );
    }
}
