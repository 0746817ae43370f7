//! Domain models for Guardian.
//!
//! Canonical definitions for the core entities:
//! - `Finding`: One issue reported by static analysis
//! - `PatchBlock` / `PatchSet`: Exact-match edits proposed for a finding
//! - `FileOutcome` / `FixedFileSet`: What each fix cycle did, and what the run will publish
//! - `PullRequestEvent`: The webhook payload that starts a run
//! - `RunIdentity` / `Workspace` / `RunContext`: Per-run state

pub mod error;
pub mod event;
pub mod finding;
pub mod outcome;
pub mod patch;
pub mod run;

// Re-export main types and errors
pub use error::{GuardianError, PayloadError, Result};
pub use event::{
    is_actionable_action, Owner, PullRequest, PullRequestEvent, PullRequestHead, Repository,
    ACTIONABLE_ACTIONS, PULL_REQUEST_EVENT,
};
pub use finding::{Confidence, Finding, FindingKey};
pub use outcome::{CycleResult, FileOutcome, FileStatus, FindingOutcome, FixedFileSet, SkipReason};
pub use patch::{PatchBlock, PatchSet};
pub use run::{
    sanitize_component, ChangeRef, RepoRef, ResolvedPath, RunContext, RunIdentity, RunRequest,
    RunState, Workspace,
};
