//! Run identity, workspace and lifecycle state.

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{GuardianError, Result};
use super::finding::Finding;
use super::outcome::{FindingOutcome, FixedFileSet};

/// Repository identity as carried by the triggering event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    pub clone_url: String,
    pub owner: String,
    pub name: String,
}

/// A single proposed change (pull request) on the hosting service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

/// Everything needed to start one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub repository: RepoRef,
    pub change_number: u64,
    pub branch: String,
}

impl RunRequest {
    pub fn change(&self) -> ChangeRef {
        ChangeRef {
            owner: self.repository.owner.clone(),
            repo: self.repository.name.clone(),
            number: self.change_number,
        }
    }
}

/// Unique identity of a run.
///
/// Two runs never share an identity, even for the same repository and change:
/// the id combines repository, change number, a timestamp and a random suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdentity {
    pub run_id: String,
    pub request: RunRequest,
    pub started_at: DateTime<Utc>,
}

impl RunIdentity {
    pub fn new(request: RunRequest) -> Self {
        let started_at = Utc::now();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let run_id = format!(
            "{}_pr{}_{}_{}",
            sanitize_component(&request.repository.name),
            request.change_number,
            started_at.timestamp(),
            &suffix[..8]
        );
        Self {
            run_id,
            request,
            started_at,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.run_id
    }
}

/// Replace anything that is not safe in a directory name.
pub fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "repo".to_string()
    } else {
        trimmed.to_string()
    }
}

/// An exclusively owned working copy for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub root_path: PathBuf,
    /// Commit the branch pointed at after checkout, once known.
    pub revision_handle: Option<String>,
    pub branch_name: String,
}

/// A finding path resolved against a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub absolute: PathBuf,
    /// Forward-slash path relative to the workspace root, as handed to the VCS.
    pub relative: String,
}

impl Workspace {
    pub fn new(root_path: PathBuf, branch_name: impl Into<String>) -> Self {
        Self {
            root_path,
            revision_handle: None,
            branch_name: branch_name.into(),
        }
    }

    /// Map a finding path onto a path inside this workspace.
    ///
    /// Accepts paths relative to the root (optionally `./`-prefixed) and
    /// absolute paths under the root. Anything that would leave the root is
    /// rejected.
    pub fn relativize(&self, file_path: &str) -> Result<String> {
        let raw = Path::new(file_path);
        let relative = if raw.is_absolute() {
            raw.strip_prefix(&self.root_path)
                .map_err(|_| GuardianError::PathEscape(file_path.to_string()))?
        } else {
            raw
        };

        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                _ => return Err(GuardianError::PathEscape(file_path.to_string())),
            }
        }
        if parts.is_empty() {
            return Err(GuardianError::PathEscape(file_path.to_string()));
        }
        Ok(parts.join("/"))
    }

    /// Resolve a finding path to an existing regular file, if there is one.
    ///
    /// Symlinks are rejected, as is any path whose real location is outside
    /// the root.
    pub fn resolve(&self, file_path: &str) -> Result<Option<ResolvedPath>> {
        let relative = self.relativize(file_path)?;
        let absolute = self.root_path.join(&relative);
        let metadata = match std::fs::symlink_metadata(&absolute) {
            Ok(metadata) => metadata,
            Err(_) => return Ok(None),
        };
        if metadata.file_type().is_symlink() {
            return Err(GuardianError::PathEscape(file_path.to_string()));
        }
        if !metadata.is_file() {
            return Ok(None);
        }

        let root = std::fs::canonicalize(&self.root_path)?;
        let real = std::fs::canonicalize(&absolute)?;
        if !real.starts_with(&root) {
            return Err(GuardianError::PathEscape(file_path.to_string()));
        }
        Ok(Some(ResolvedPath { absolute, relative }))
    }
}

/// Lifecycle states of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Init,
    Cloned,
    CheckedOut,
    Analyzed,
    NoFindings,
    FixCycle,
    Committed,
    Notified,
    FatalError,
    Done,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Init => "init",
            RunState::Cloned => "cloned",
            RunState::CheckedOut => "checked_out",
            RunState::Analyzed => "analyzed",
            RunState::NoFindings => "no_findings",
            RunState::FixCycle => "fix_cycle",
            RunState::Committed => "committed",
            RunState::Notified => "notified",
            RunState::FatalError => "fatal_error",
            RunState::Done => "done",
        }
    }
}

/// Aggregate state of a run in progress.
#[derive(Debug)]
pub struct RunContext {
    pub identity: RunIdentity,
    pub workspace: Workspace,
    pub findings: Vec<Finding>,
    pub outcomes: Vec<FindingOutcome>,
    pub fixed_files: FixedFileSet,
}

impl RunContext {
    pub fn new(identity: RunIdentity, workspace: Workspace) -> Self {
        Self {
            identity,
            workspace,
            findings: Vec::new(),
            outcomes: Vec::new(),
            fixed_files: FixedFileSet::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RunRequest {
        RunRequest {
            repository: RepoRef {
                clone_url: "http://localhost:3000/admin/vulnerable-repo.git".to_string(),
                owner: "admin".to_string(),
                name: "vulnerable-repo".to_string(),
            },
            change_number: 22,
            branch: "feat/x".to_string(),
        }
    }

    #[test]
    fn test_run_identity_unique_per_run() {
        let a = RunIdentity::new(request());
        let b = RunIdentity::new(request());
        assert_ne!(a.run_id, b.run_id);
        assert!(a.run_id.starts_with("vulnerable-repo_pr22_"));
    }

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("my repo/../x"), "my_repo_.._x");
        assert_eq!(sanitize_component(".."), "repo");
        assert_eq!(sanitize_component("ok-name_1"), "ok-name_1");
    }

    #[test]
    fn test_relativize_accepts_relative_and_absolute_inside_root() {
        let ws = Workspace::new(PathBuf::from("/tmp/ws"), "main");
        assert_eq!(ws.relativize("app.py").unwrap(), "app.py");
        assert_eq!(ws.relativize("./pkg/mod.py").unwrap(), "pkg/mod.py");
        assert_eq!(ws.relativize("/tmp/ws/pkg/mod.py").unwrap(), "pkg/mod.py");
    }

    #[test]
    fn test_relativize_rejects_escapes() {
        let ws = Workspace::new(PathBuf::from("/tmp/ws"), "main");
        assert!(ws.relativize("../etc/passwd").is_err());
        assert!(ws.relativize("/etc/passwd").is_err());
        assert!(ws.relativize(".").is_err());
    }

    #[test]
    fn test_resolve_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.py"), "x = 1\n").unwrap();
        let ws = Workspace::new(dir.path().to_path_buf(), "main");

        let found = ws.resolve("app.py").unwrap().unwrap();
        assert_eq!(found.relative, "app.py");
        assert_eq!(found.absolute, dir.path().join("app.py"));
        assert!(ws.resolve("missing.py").unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_rejects_symlink_to_outside_file() {
        let outside = tempfile::tempdir().unwrap();
        let victim = outside.path().join("victim.py");
        std::fs::write(&victim, "SECRET = 1\n").unwrap();

        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(&victim, dir.path().join("evil.py")).unwrap();
        let ws = Workspace::new(dir.path().to_path_buf(), "main");

        assert!(matches!(
            ws.resolve("evil.py"),
            Err(GuardianError::PathEscape(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_rejects_file_under_symlinked_directory() {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("mod.py"), "x = 1\n").unwrap();

        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("pkg")).unwrap();
        let ws = Workspace::new(dir.path().to_path_buf(), "main");

        assert!(matches!(
            ws.resolve("pkg/mod.py"),
            Err(GuardianError::PathEscape(_))
        ));
    }
}
