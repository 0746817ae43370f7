//! Contracts for the external systems a run talks to.
//!
//! - `Analyzer`: static analysis over a workspace, returning ranked findings
//! - `SuggestionOracle`: text generation service returning SEARCH/REPLACE text
//! - `VcsClient`: clone / checkout / stage / commit / push primitives
//! - `Notifier`: human-readable status on the proposed change
//!
//! Implementations must be stateless or internally synchronized: one instance
//! is shared by every concurrent run without further locking.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{ChangeRef, Finding, Result};

/// Runs static analysis over a checked-out workspace.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Findings in ranked order. Paths are relative to `workspace_root`.
    ///
    /// An error here means the analysis itself could not be carried out.
    async fn analyze(&self, workspace_root: &Path) -> Result<Vec<Finding>>;
}

/// What the oracle is asked to fix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionRequest {
    /// Location plus textual description of the finding.
    pub vulnerability_report: String,
    /// Workspace-relative path of the file.
    pub file_path: String,
    pub line_number: u32,
    /// Current on-disk content of the file.
    pub file_content: String,
}

impl SuggestionRequest {
    pub fn for_finding(finding: &Finding, file_path: &str, file_content: &str) -> Self {
        Self {
            vulnerability_report: finding.vulnerability_report(),
            file_path: file_path.to_string(),
            line_number: finding.line_number,
            file_content: file_content.to_string(),
        }
    }
}

/// Produces patch text for a single finding.
#[async_trait]
pub trait SuggestionOracle: Send + Sync {
    /// Raw response text. It is parsed by the patch applier and is not
    /// assumed to be well-formed.
    async fn suggest(&self, request: &SuggestionRequest) -> Result<String>;
}

/// Version-control transport.
#[async_trait]
pub trait VcsClient: Send + Sync {
    /// Clone `repo_url` into `dest`, which must not exist yet.
    async fn clone_repo(&self, repo_url: &str, dest: &Path) -> Result<()>;

    /// Check out `branch` and return the commit it points at.
    async fn checkout(&self, repo_root: &Path, branch: &str) -> Result<String>;

    /// Stage files, given as paths relative to the repository root.
    async fn stage(&self, repo_root: &Path, files: &[String]) -> Result<()>;

    /// Commit the staged files and return the new commit id.
    async fn commit(&self, repo_root: &Path, message: &str) -> Result<String>;

    /// Push `branch` to the origin remote.
    async fn push(&self, repo_root: &Path, branch: &str) -> Result<()>;
}

/// Posts status comments on a proposed change.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn post_comment(&self, change: &ChangeRef, body: &str) -> Result<()>;
}
