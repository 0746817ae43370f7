//! Per-finding fix outcomes and the run-wide set of accepted files.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use super::finding::Finding;

/// Terminal status of one fix cycle for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Accepted,
    Reverted,
    Skipped,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Accepted => "accepted",
            FileStatus::Reverted => "reverted",
            FileStatus::Skipped => "skipped",
        }
    }
}

/// Why a fix cycle ended without touching the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The finding's path does not resolve to a file inside the workspace.
    FileMissing,
    /// Applying the suggestion produced content identical to the original.
    NoEffectiveChange,
}

/// Result of one fix cycle against one file.
///
/// Owned by a single cycle; contents are never shared across files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOutcome {
    /// Path relative to the workspace root.
    pub file_path: String,
    pub status: FileStatus,
    pub original_content: String,
    pub candidate_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
}

impl FileOutcome {
    pub fn skipped(file_path: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            file_path: file_path.into(),
            status: FileStatus::Skipped,
            original_content: String::new(),
            candidate_content: String::new(),
            skip_reason: Some(reason),
        }
    }

    pub fn unchanged(file_path: impl Into<String>, content: String) -> Self {
        Self {
            file_path: file_path.into(),
            status: FileStatus::Skipped,
            candidate_content: content.clone(),
            original_content: content,
            skip_reason: Some(SkipReason::NoEffectiveChange),
        }
    }

    pub fn accepted(file_path: impl Into<String>, original: String, candidate: String) -> Self {
        Self {
            file_path: file_path.into(),
            status: FileStatus::Accepted,
            original_content: original,
            candidate_content: candidate,
            skip_reason: None,
        }
    }

    pub fn reverted(file_path: impl Into<String>, original: String, candidate: String) -> Self {
        Self {
            file_path: file_path.into(),
            status: FileStatus::Reverted,
            original_content: original,
            candidate_content: candidate,
            skip_reason: None,
        }
    }
}

/// How the fix cycle for one finding ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CycleResult {
    Completed(FileOutcome),
    /// An error inside the cycle; the finding stays unresolved.
    Errored { message: String },
}

/// A finding paired with its fix-cycle result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingOutcome {
    pub finding: Finding,
    pub result: CycleResult,
}

impl FindingOutcome {
    pub fn status(&self) -> Option<FileStatus> {
        match &self.result {
            CycleResult::Completed(outcome) => Some(outcome.status),
            CycleResult::Errored { .. } => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.status() == Some(FileStatus::Accepted)
    }
}

/// Insertion-ordered set of accepted file paths for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixedFileSet {
    files: IndexSet<String>,
}

impl FixedFileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted path. Returns `false` if it was already present.
    pub fn insert(&mut self, path: impl Into<String>) -> bool {
        self.files.insert(path.into())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains(path)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.files.iter().cloned().collect()
    }
}
