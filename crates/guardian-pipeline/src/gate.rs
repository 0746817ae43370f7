//! Validation gate for candidate file contents.
//!
//! A candidate goes through two explicit phases: [`StagedCandidate::write`]
//! puts it on disk, then [`ValidationGate::settle`] runs the syntax check
//! registered for the file's extension and either keeps the candidate
//! (`Accepted`) or writes the original bytes back (`Reverted`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use guardian_core::{FileOutcome, GuardianError, ResolvedPath, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::check::{BuiltinCheck, CheckConfig, CommandCheck, SyntaxCheck};

/// Gate evaluation verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateVerdict {
    /// Whether the gate passed.
    pub passed: bool,

    /// Name of the check that ran, if any was registered.
    pub check: Option<String>,

    /// Summary message.
    pub message: String,
}

impl GateVerdict {
    fn pass(check: &str) -> Self {
        Self {
            passed: true,
            check: Some(check.to_string()),
            message: format!("{check} passed"),
        }
    }

    fn fail(check: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            passed: false,
            check: check.map(str::to_string),
            message: message.into(),
        }
    }
}

/// Accepts or rejects candidate contents by language.
///
/// Checks are keyed by lowercase file extension. A file whose extension has
/// no registered check is rejected: only verified changes are published.
#[derive(Clone, Default)]
pub struct ValidationGate {
    checks: HashMap<String, Arc<dyn SyntaxCheck>>,
}

impl std::fmt::Debug for ValidationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut extensions: Vec<&String> = self.checks.keys().collect();
        extensions.sort();
        f.debug_struct("ValidationGate")
            .field("extensions", &extensions)
            .finish()
    }
}

impl ValidationGate {
    /// A gate with no checks; it rejects everything until one is registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// The default gate: `python -m py_compile` for `.py` files.
    pub fn with_defaults(python: &str, timeout_secs: u64) -> Self {
        Self::new().register_command(CheckConfig::from_builtin(
            BuiltinCheck::PythonCompile,
            python,
            timeout_secs,
        ))
    }

    /// Register `check` for one extension, replacing any previous one.
    pub fn register(mut self, extension: &str, check: Arc<dyn SyntaxCheck>) -> Self {
        self.checks.insert(normalize_extension(extension), check);
        self
    }

    /// Register a command check for every extension in its configuration.
    pub fn register_command(self, config: CheckConfig) -> Self {
        let extensions = config.extensions.clone();
        let check: Arc<dyn SyntaxCheck> = Arc::new(CommandCheck::new(config));
        extensions
            .iter()
            .fold(self, |gate, ext| gate.register(ext, check.clone()))
    }

    pub fn check_for(&self, file: &Path) -> Option<&Arc<dyn SyntaxCheck>> {
        let ext = file.extension()?.to_str()?;
        self.checks.get(&normalize_extension(ext))
    }

    /// Run the registered check for `file`.
    pub async fn evaluate(&self, file: &Path) -> GateVerdict {
        let Some(check) = self.check_for(file) else {
            return GateVerdict::fail(
                None,
                format!("no syntax check registered for {}", file.display()),
            );
        };

        match check.check(file).await {
            Ok(result) if result.passed() => GateVerdict::pass(check.name()),
            Ok(result) => {
                let detail = if result.stderr.trim().is_empty() {
                    result.stdout.trim().to_string()
                } else {
                    result.stderr.trim().to_string()
                };
                GateVerdict::fail(
                    Some(check.name()),
                    format!("{} exited with code {}: {}", check.name(), result.exit_code, detail),
                )
            }
            Err(e) => GateVerdict::fail(Some(check.name()), e.to_string()),
        }
    }

    /// `true` when `file` passes its syntax check.
    pub async fn validate(&self, file: &Path) -> bool {
        self.evaluate(file).await.passed
    }

    /// Validate a staged candidate and keep or revert it.
    pub async fn settle(&self, staged: StagedCandidate) -> Result<FileOutcome> {
        let verdict = self.evaluate(&staged.absolute).await;
        if verdict.passed {
            debug!(file = %staged.relative, check = ?verdict.check, "candidate accepted");
            Ok(staged.accept())
        } else {
            warn!(file = %staged.relative, reason = %verdict.message, "candidate failed validation; reverting");
            staged.revert().await
        }
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}

/// Candidate content that has been written to disk but not yet judged.
#[derive(Debug)]
#[must_use = "a staged candidate must be settled, accepted or reverted"]
pub struct StagedCandidate {
    absolute: PathBuf,
    relative: String,
    original: String,
    candidate: String,
}

impl StagedCandidate {
    /// Write `candidate` over the file, remembering `original` for revert.
    ///
    /// If the write itself fails the original bytes are put back before the
    /// error is returned.
    pub async fn write(path: &ResolvedPath, original: String, candidate: String) -> Result<Self> {
        if let Err(e) = tokio::fs::write(&path.absolute, candidate.as_bytes()).await {
            tokio::fs::write(&path.absolute, original.as_bytes())
                .await
                .map_err(|restore| {
                    GuardianError::Validation(format!(
                        "failed to write candidate for {} ({e}) and failed to restore it ({restore})",
                        path.relative
                    ))
                })?;
            return Err(e.into());
        }
        Ok(Self {
            absolute: path.absolute.clone(),
            relative: path.relative.clone(),
            original,
            candidate,
        })
    }

    pub fn path(&self) -> &Path {
        &self.absolute
    }

    /// Keep the candidate on disk.
    pub fn accept(self) -> FileOutcome {
        FileOutcome::accepted(self.relative, self.original, self.candidate)
    }

    /// Restore the exact original bytes.
    pub async fn revert(self) -> Result<FileOutcome> {
        tokio::fs::write(&self.absolute, self.original.as_bytes())
            .await
            .map_err(|e| {
                GuardianError::Validation(format!(
                    "failed to restore {} after rejection: {e}",
                    self.relative
                ))
            })?;
        Ok(FileOutcome::reverted(self.relative, self.original, self.candidate))
    }
}
