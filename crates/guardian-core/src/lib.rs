//! Guardian Core Library
//!
//! Domain model, exact-match patch application and the contracts for the
//! external systems a remediation run depends on.

pub mod collaborators;
pub mod digest;
pub mod domain;
pub mod fakes;
pub mod obs;
pub mod patch;
pub mod telemetry;

pub use collaborators::{Analyzer, Notifier, SuggestionOracle, SuggestionRequest, VcsClient};

pub use digest::ContentDigest;

pub use telemetry::init_tracing;

pub use domain::{
    is_actionable_action, ChangeRef, Confidence, CycleResult, FileOutcome, FileStatus, Finding,
    FindingKey, FindingOutcome, FixedFileSet, GuardianError, PatchBlock, PatchSet, PayloadError,
    PullRequestEvent, RepoRef, ResolvedPath, Result, RunContext, RunIdentity, RunRequest,
    RunState, SkipReason, Workspace, ACTIONABLE_ACTIONS, PULL_REQUEST_EVENT,
};

pub use patch::{
    parse_patch_set, unified_diff, BlockOutcome, PatchApplication, PatchApplier,
    DIVIDER_MARKER, REPLACE_MARKER, SEARCH_MARKER,
};

/// Crate version, reported by the daemon health endpoint and the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
