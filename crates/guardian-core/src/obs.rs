//! Structured observability hooks for Guardian run lifecycle events.
//!
//! This module provides:
//! - A run-scoped tracing span to instrument a run's future with
//! - Emission functions for key lifecycle events: start, state change,
//!   per-finding outcome, commit, finish
//!
//! Events are emitted at `info!` level (filter with `RUST_LOG`).

use tracing::{info, warn};

use crate::digest::ContentDigest;
use crate::domain::{FileOutcome, RunState};

/// The span every log line of a run is recorded under.
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("guardian.run", run_id = %run_id)
}

/// Emit event: run started for a change.
pub fn emit_run_started(run_id: &str, repository: &str, change_number: u64, branch: &str) {
    info!(
        event = "run.started",
        run_id = %run_id,
        repository = %repository,
        change_number = change_number,
        branch = %branch,
    );
}

/// Emit event: run moved to a new lifecycle state.
pub fn emit_state(run_id: &str, state: RunState) {
    info!(event = "run.state", run_id = %run_id, state = state.as_str());
}

/// Emit event: a fix cycle finished for one file.
pub fn emit_file_outcome(run_id: &str, outcome: &FileOutcome) {
    let original = ContentDigest::of(&outcome.original_content);
    let candidate = ContentDigest::of(&outcome.candidate_content);
    info!(
        event = "finding.outcome",
        run_id = %run_id,
        file = %outcome.file_path,
        status = outcome.status.as_str(),
        original = %original.short(),
        candidate = %candidate.short(),
    );
}

/// Emit event: a fix cycle failed with an error (warning level).
pub fn emit_finding_error(run_id: &str, file: &str, error: &dyn std::fmt::Display) {
    warn!(event = "finding.error", run_id = %run_id, file = %file, error = %error);
}

/// Emit event: accepted files committed and pushed.
pub fn emit_committed(run_id: &str, commit: &str, files: usize) {
    info!(event = "run.committed", run_id = %run_id, commit = %commit, files = files);
}

/// Emit event: run finished.
pub fn emit_run_finished(run_id: &str, duration_ms: u64, fixed_files: usize, success: bool) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        fixed_files = fixed_files,
        success = success,
    );
}

/// Emit event: a status comment could not be posted (warning level).
pub fn emit_notify_failed(run_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "notify.failed", run_id = %run_id, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_span_create() {
        let _entered = run_span("test-run-id").entered();
    }

    #[test]
    fn test_emitters_do_not_panic_without_subscriber() {
        let outcome = FileOutcome::accepted("a.py", "x".to_string(), "y".to_string());
        emit_file_outcome("run-1", &outcome);
        emit_state("run-1", RunState::FixCycle);
        emit_notify_failed("run-1", &"503");
    }
}
