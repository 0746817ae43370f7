//! Per-run remediation state machine.
//!
//! `Init → Cloned → CheckedOut → Analyzed`, then either `NoFindings → Done`
//! or `FixCycle → [Committed → Notified] → Done`. Any fatal failure goes to
//! `FatalError → Notified → Done` and leaves the workspace on disk for
//! inspection.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use guardian_core::obs;
use guardian_core::patch::truncate_for_log;
use guardian_core::{
    unified_diff, Analyzer, ChangeRef, CycleResult, FileOutcome, FileStatus, Finding,
    FindingOutcome, GuardianError, Notifier, PatchApplier, Result, RunContext, RunIdentity,
    RunRequest, RunState, SkipReason, SuggestionOracle, SuggestionRequest, VcsClient, Workspace,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn, Instrument};

use crate::gate::{StagedCandidate, ValidationGate};
use crate::workspace::WorkspaceManager;

const MAX_DIAGNOSTIC_CHARS: usize = 4000;

/// Stage at which a run failed fatally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunFailure {
    /// The working copy could not be created.
    Workspace,
    /// The branch could not be checked out.
    Checkout,
    /// The analyzer could not be run or its output was unusable.
    Analysis,
    /// Staging, committing or pushing the accepted files failed.
    Publish,
    /// A panic escaped a stage of the run.
    Defect,
}

impl RunFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunFailure::Workspace => "workspace",
            RunFailure::Checkout => "checkout",
            RunFailure::Analysis => "analysis",
            RunFailure::Publish => "publish",
            RunFailure::Defect => "defect",
        }
    }
}

/// A fatal failure with its diagnostic text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    pub kind: RunFailure,
    pub diagnostic: String,
}

/// Knobs for a pipeline instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Message for the single commit a run publishes.
    pub commit_message: String,

    /// Remove the workspace after a run that did not fail fatally.
    pub release_workspaces: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            commit_message: "chore: Security fixes by Guardian Agent".to_string(),
            release_workspaces: true,
        }
    }
}

/// The external systems a run talks to.
///
/// Cloned into every run; implementations are shared without locking.
#[derive(Clone)]
pub struct Collaborators {
    pub analyzer: Arc<dyn Analyzer>,
    pub oracle: Arc<dyn SuggestionOracle>,
    pub vcs: Arc<dyn VcsClient>,
    pub notifier: Arc<dyn Notifier>,
}

/// Result of a complete run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub change: ChangeRef,
    /// States visited, in order.
    pub states: Vec<RunState>,
    /// Number of findings the analyzer reported (after payload validation).
    pub findings: usize,
    pub outcomes: Vec<FindingOutcome>,
    /// Accepted files, in first-accepted order, without duplicates.
    pub fixed_files: Vec<String>,
    /// Commit published by the run, if any.
    pub commit: Option<String>,
    pub failure: Option<FailureReport>,
    pub workspace_root: Option<PathBuf>,
    pub duration_ms: u64,
}

impl RunReport {
    fn new(identity: &RunIdentity) -> Self {
        Self {
            run_id: identity.run_id.clone(),
            change: identity.request.change(),
            states: Vec::new(),
            findings: 0,
            outcomes: Vec::new(),
            fixed_files: Vec::new(),
            commit: None,
            failure: None,
            workspace_root: None,
            duration_ms: 0,
        }
    }

    fn enter(&mut self, state: RunState) {
        obs::emit_state(&self.run_id, state);
        self.states.push(state);
    }

    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    pub fn final_state(&self) -> Option<RunState> {
        self.states.last().copied()
    }

    /// Count of outcomes with the given status.
    pub fn count(&self, status: FileStatus) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status() == Some(status))
            .count()
    }

    /// Findings whose cycle ended in an error.
    pub fn errored(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status().is_none()).count()
    }
}

/// Start-of-fix-cycle comment.
pub fn start_message(findings: usize) -> String {
    format!("🛡️ **Guardian Agent** found {findings} security issues. Attempting fixes...")
}

/// Comment listing published files.
pub fn success_message(files: &[String]) -> String {
    format!("✅ Applied fixes to: {}", files.join(", "))
}

/// Comment for a fatal failure.
pub fn failure_message(failure: &FailureReport) -> String {
    format!(
        "❌ Guardian run failed ({}):\n```\n{}\n```",
        failure.kind.as_str(),
        failure.diagnostic
    )
}

/// Drives one run per request through analyze, fix, publish and notify.
#[derive(Clone)]
pub struct FixOrchestrator {
    deps: Collaborators,
    gate: Arc<ValidationGate>,
    workspaces: Arc<WorkspaceManager>,
    config: Arc<PipelineConfig>,
}

impl FixOrchestrator {
    pub fn new(
        deps: Collaborators,
        gate: ValidationGate,
        workspaces: WorkspaceManager,
        config: PipelineConfig,
    ) -> Self {
        Self {
            deps,
            gate: Arc::new(gate),
            workspaces: Arc::new(workspaces),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Execute one run to completion.
    ///
    /// Never returns an error and never unwinds: fatal failures, panics
    /// included, are reported to the change and recorded on the returned
    /// report.
    pub async fn run(&self, request: RunRequest) -> RunReport {
        let identity = RunIdentity::new(request);
        let span = obs::run_span(&identity.run_id);
        async {
            let started = Instant::now();
            let mut report = RunReport::new(&identity);
            let outcome = AssertUnwindSafe(self.execute(&identity, &mut report))
                .catch_unwind()
                .await;
            if let Err(payload) = outcome {
                let diagnostic = format!("run aborted by a defect: {}", panic_message(&*payload));
                error!(error = %diagnostic, "defect escaped the run; nothing will be published");
                self.abort(&mut report, RunFailure::Defect, diagnostic).await;
            }
            self.complete(report, started)
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, identity: &RunIdentity, report: &mut RunReport) {
        let request = &identity.request;

        obs::emit_run_started(
            &identity.run_id,
            &request.repository.name,
            request.change_number,
            &request.branch,
        );
        report.enter(RunState::Init);

        let mut workspace = match self
            .workspaces
            .acquire(self.deps.vcs.as_ref(), &request.repository.clone_url, identity)
            .await
        {
            Ok(ws) => ws,
            Err(e) => return self.abort(report, RunFailure::Workspace, e.to_string()).await,
        };
        report.workspace_root = Some(workspace.root_path.clone());
        report.enter(RunState::Cloned);

        match self
            .deps
            .vcs
            .checkout(&workspace.root_path, &workspace.branch_name)
            .await
        {
            Ok(head) => workspace.revision_handle = Some(head),
            Err(e) => return self.abort(report, RunFailure::Checkout, e.to_string()).await,
        }
        report.enter(RunState::CheckedOut);

        let findings = match self.deps.analyzer.analyze(&workspace.root_path).await {
            Ok(findings) => accept_findings(findings),
            Err(e) => {
                return self
                    .abort(report, RunFailure::Analysis, format!("analysis failed: {e}"))
                    .await
            }
        };
        report.findings = findings.len();
        report.enter(RunState::Analyzed);

        if findings.is_empty() {
            info!("no security issues found");
            report.enter(RunState::NoFindings);
            return self.finish(&workspace).await;
        }

        info!(findings = findings.len(), "security issues found; starting fix cycle");
        self.notify(&report.run_id, &report.change, &start_message(findings.len()))
            .await;

        let mut ctx = RunContext::new(identity.clone(), workspace);
        ctx.findings = findings;
        report.enter(RunState::FixCycle);

        let cycle = AssertUnwindSafe(self.fix_all(&mut ctx)).catch_unwind().await;
        report.outcomes = ctx.outcomes.clone();
        if let Err(payload) = cycle {
            let diagnostic = format!("fix cycle aborted by a defect: {}", panic_message(&*payload));
            error!(error = %diagnostic, "defect escaped the fix cycle; nothing will be published");
            return self.abort(report, RunFailure::Defect, diagnostic).await;
        }

        report.fixed_files = ctx.fixed_files.to_vec();
        if ctx.fixed_files.is_empty() {
            info!("no fix passed validation; nothing to publish");
            return self.finish(&ctx.workspace).await;
        }

        match self.publish(&ctx).await {
            Ok(commit) => report.commit = Some(commit),
            Err(e) => return self.abort(report, RunFailure::Publish, e.to_string()).await,
        }
        report.enter(RunState::Committed);

        if self
            .notify(&report.run_id, &report.change, &success_message(&report.fixed_files))
            .await
        {
            report.enter(RunState::Notified);
        }
        self.finish(&ctx.workspace).await
    }

    /// Process every finding in analyzer order, one at a time.
    async fn fix_all(&self, ctx: &mut RunContext) {
        let run_id = ctx.identity.run_id.clone();
        let findings = ctx.findings.clone();

        for finding in findings {
            let result = match self.fix_one(&ctx.workspace, &finding).await {
                Ok(outcome) => {
                    obs::emit_file_outcome(&run_id, &outcome);
                    if outcome.status == FileStatus::Accepted
                        && !ctx.fixed_files.insert(outcome.file_path.clone())
                    {
                        debug!(file = %outcome.file_path, "file already in fixed set");
                    }
                    CycleResult::Completed(outcome)
                }
                Err(e) => {
                    obs::emit_finding_error(&run_id, &finding.file_path, &e);
                    CycleResult::Errored {
                        message: e.to_string(),
                    }
                }
            };
            ctx.outcomes.push(FindingOutcome { finding, result });
        }
    }

    /// One fix cycle: load, suggest, apply, stage, validate.
    async fn fix_one(&self, workspace: &Workspace, finding: &Finding) -> Result<FileOutcome> {
        let Some(resolved) = workspace.resolve(&finding.file_path)? else {
            warn!(file = %finding.file_path, "file not found in workspace; skipping");
            return Ok(FileOutcome::skipped(
                finding.file_path.clone(),
                SkipReason::FileMissing,
            ));
        };

        let original = tokio::fs::read_to_string(&resolved.absolute).await?;
        let request = SuggestionRequest::for_finding(finding, &resolved.relative, &original);
        let suggestion = match self.deps.oracle.suggest(&request).await {
            Ok(text) => text,
            Err(e) => {
                warn!(file = %resolved.relative, error = %e, "suggestion request failed; no patch");
                String::new()
            }
        };

        let application = PatchApplier::apply_with_report(&original, &suggestion);
        if application.content == original {
            debug!(file = %resolved.relative, "suggestion produced no effective change");
            return Ok(FileOutcome::unchanged(resolved.relative, original));
        }

        debug!(
            file = %resolved.relative,
            blocks = application.applied_count(),
            diff = %unified_diff(&resolved.relative, &original, &application.content),
            "applying candidate"
        );
        let staged = StagedCandidate::write(&resolved, original, application.content).await?;
        self.gate.settle(staged).await
    }

    /// Commit exactly the accepted files as one changeset and push it.
    async fn publish(&self, ctx: &RunContext) -> Result<String> {
        let root = &ctx.workspace.root_path;
        let files = ctx.fixed_files.to_vec();

        self.deps.vcs.stage(root, &files).await?;
        let commit = self
            .deps
            .vcs
            .commit(root, &self.config.commit_message)
            .await?;
        self.deps
            .vcs
            .push(root, &ctx.workspace.branch_name)
            .await?;

        obs::emit_committed(&ctx.identity.run_id, &commit, files.len());
        Ok(commit)
    }

    /// Post a comment. Returns whether it was posted; failures and panics in
    /// the notifier are only logged.
    async fn notify(&self, run_id: &str, change: &ChangeRef, body: &str) -> bool {
        let posted = AssertUnwindSafe(self.deps.notifier.post_comment(change, body))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(GuardianError::Notify(format!(
                    "notifier panicked: {}",
                    panic_message(&*payload)
                )))
            });
        match posted {
            Ok(()) => true,
            Err(e) => {
                obs::emit_notify_failed(run_id, &e);
                false
            }
        }
    }

    async fn abort(&self, report: &mut RunReport, kind: RunFailure, diagnostic: String) {
        let diagnostic = truncate_diagnostic(&diagnostic);
        error!(stage = kind.as_str(), error = %truncate_for_log(&diagnostic), "run failed");
        report.enter(RunState::FatalError);

        let failure = FailureReport { kind, diagnostic };
        if self
            .notify(&report.run_id, &report.change, &failure_message(&failure))
            .await
        {
            report.enter(RunState::Notified);
        }
        report.failure = Some(failure);

        if let Some(root) = &report.workspace_root {
            info!(path = %root.display(), "workspace kept for inspection");
        }
    }

    async fn finish(&self, workspace: &Workspace) {
        if self.config.release_workspaces {
            if let Err(e) = self.workspaces.release(workspace).await {
                warn!(error = %e, "failed to release workspace");
            }
        }
    }

    fn complete(&self, mut report: RunReport, started: Instant) -> RunReport {
        report.duration_ms = started.elapsed().as_millis() as u64;
        report.enter(RunState::Done);
        obs::emit_run_finished(
            &report.run_id,
            report.duration_ms,
            report.fixed_files.len(),
            report.succeeded(),
        );
        report
    }
}

/// Drop findings that fail payload validation.
fn accept_findings(findings: Vec<Finding>) -> Vec<Finding> {
    findings
        .into_iter()
        .filter(|f| match f.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!(file = %f.file_path, error = %e, "discarding malformed finding");
                false
            }
        })
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn truncate_diagnostic(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= MAX_DIAGNOSTIC_CHARS {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(MAX_DIAGNOSTIC_CHARS).collect();
        format!("{head}\n... (truncated)")
    }
}
