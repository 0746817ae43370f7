//! Python static analysis through the `bandit` CLI.
//!
//! Bandit runs inside the workspace and writes its JSON report to stdout, so
//! concurrent runs never share a report file. Exit code 1 only means that
//! issues were found.

use std::path::Path;

use async_trait::async_trait;
use guardian_core::{Analyzer, Confidence, Finding, GuardianError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{snippet, IntegrationError};
use crate::process::{capture, stderr_of};
use crate::Result;

/// Bandit invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanditConfig {
    /// Executable to run.
    pub program: String,
    /// Extra arguments appended after the defaults (e.g. `--skip B101`).
    pub extra_args: Vec<String>,
    /// Timeout in seconds (0 = none).
    pub timeout_secs: u64,
}

impl Default for BanditConfig {
    fn default() -> Self {
        Self {
            program: "bandit".to_string(),
            extra_args: Vec::new(),
            timeout_secs: 600,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BanditReport {
    #[serde(default)]
    results: Vec<BanditIssue>,
}

#[derive(Debug, Deserialize)]
struct BanditIssue {
    #[serde(default)]
    filename: String,
    #[serde(default)]
    line_number: u32,
    #[serde(default)]
    issue_text: String,
    #[serde(default)]
    code: String,
    #[serde(default)]
    more_info: String,
    #[serde(default)]
    issue_confidence: String,
    #[serde(default)]
    issue_cwe: Option<BanditCwe>,
}

#[derive(Debug, Deserialize)]
struct BanditCwe {
    id: Option<u64>,
}

/// `Analyzer` that shells out to bandit.
#[derive(Debug, Clone, Default)]
pub struct BanditAnalyzer {
    config: BanditConfig,
}

impl BanditAnalyzer {
    pub fn new(config: BanditConfig) -> Self {
        Self { config }
    }

    /// Run bandit over `workspace_root` and return its findings in report order.
    pub async fn scan(&self, workspace_root: &Path) -> Result<Vec<Finding>> {
        let mut args: Vec<&str> = vec!["-r", ".", "-f", "json", "-q"];
        args.extend(self.config.extra_args.iter().map(String::as_str));

        info!(root = %workspace_root.display(), "running bandit");
        let output = capture(
            &self.config.program,
            &args,
            Some(workspace_root),
            self.config.timeout_secs,
        )
        .await?;

        let exit_code = output.status.code().unwrap_or(-1);
        if exit_code != 0 && exit_code != 1 {
            return Err(IntegrationError::CommandFailed {
                command: self.config.program.clone(),
                exit_code,
                stderr: stderr_of(&output),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let findings = parse_report(&stdout, workspace_root)?;
        info!(findings = findings.len(), "bandit finished");
        Ok(findings)
    }
}

#[async_trait]
impl Analyzer for BanditAnalyzer {
    async fn analyze(&self, workspace_root: &Path) -> guardian_core::Result<Vec<Finding>> {
        self.scan(workspace_root)
            .await
            .map_err(|e| GuardianError::Analyzer(e.to_string()))
    }
}

/// Parse a bandit JSON report into findings.
///
/// Paths are made relative to `workspace_root`. Records with an unknown
/// confidence level or missing required fields are dropped. Empty output
/// means nothing was scanned.
pub fn parse_report(json: &str, workspace_root: &Path) -> Result<Vec<Finding>> {
    if json.trim().is_empty() {
        debug!("bandit produced no report");
        return Ok(Vec::new());
    }

    let report: BanditReport = serde_json::from_str(json)
        .map_err(|e| IntegrationError::ReportParse(format!("{e}: {}", snippet(json, 200))))?;

    let mut findings = Vec::with_capacity(report.results.len());
    for issue in report.results {
        let confidence: Confidence = match issue.issue_confidence.parse() {
            Ok(c) => c,
            Err(e) => {
                debug!(file = %issue.filename, error = %e, "dropping finding");
                continue;
            }
        };

        let mut finding = Finding::new(
            relative_to(&issue.filename, workspace_root),
            issue.line_number,
            issue.issue_text,
            confidence,
        )
        .with_excerpt(issue.code)
        .with_reference(issue.more_info);
        if let Some(id) = issue.issue_cwe.and_then(|cwe| cwe.id) {
            finding = finding.with_weakness(format!("CWE-{id}"));
        }

        match finding.validate() {
            Ok(()) => findings.push(finding),
            Err(e) => warn!(file = %finding.file_path, error = %e, "dropping malformed finding"),
        }
    }
    Ok(findings)
}

fn relative_to(filename: &str, root: &Path) -> String {
    let path = Path::new(filename);
    let path = path.strip_prefix(root).unwrap_or(path);
    let path = path.strip_prefix(".").unwrap_or(path);
    path.to_string_lossy().replace('\\', "/")
}
