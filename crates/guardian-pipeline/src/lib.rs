//! Guardian Pipeline - per-run vulnerability remediation
//!
//! Provides the run orchestrator that:
//! - Clones each run into its own isolated workspace
//! - Applies one suggested patch per finding, in analyzer order
//! - Keeps a candidate only if it passes the syntax check for its language
//! - Publishes the accepted files as a single commit and reports on the change

pub mod check;
pub mod gate;
pub mod orchestrator;
pub mod runner;
pub mod workspace;

// Re-export key types
pub use check::{BuiltinCheck, CheckConfig, CommandCheck, SyntaxCheck};
pub use gate::{GateVerdict, StagedCandidate, ValidationGate};
pub use orchestrator::{
    failure_message, start_message, success_message, Collaborators, FailureReport,
    FixOrchestrator, PipelineConfig, RunFailure, RunReport,
};
pub use runner::{CheckResult, CheckRunner};
pub use workspace::{remove_forcibly, WorkspaceManager};
