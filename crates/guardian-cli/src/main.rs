//! Guardian CLI
//!
//! The `guardian` command exposes the pipeline's building blocks for
//! operators.
//!
//! ## Commands
//!
//! - `apply`: Apply a SEARCH/REPLACE suggestion to a file offline
//! - `check`: Run the syntax check the validation gate would run
//! - `trigger`: Send a synthetic pull request event to a running daemon

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use guardian_core::{
    unified_diff, BlockOutcome, PatchApplication, PatchApplier, PullRequestEvent, RepoRef,
    RunRequest, PULL_REQUEST_EVENT,
};
use guardian_pipeline::{GateVerdict, ValidationGate};
use tracing::Level;

#[derive(Parser)]
#[command(name = "guardian")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Guardian automated vulnerability remediation", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a suggestion's SEARCH/REPLACE blocks to a file
    Apply {
        /// File to patch
        #[arg(short, long)]
        file: PathBuf,

        /// Suggestion text (`-` reads stdin)
        #[arg(short, long)]
        patch: PathBuf,

        /// Write the result back instead of printing a diff
        #[arg(short, long)]
        write: bool,
    },

    /// Run the syntax check for a file
    Check {
        file: PathBuf,

        /// Python interpreter
        #[arg(long, env = "GUARDIAN_PYTHON", default_value = "python")]
        python: String,

        /// Timeout in seconds
        #[arg(long, default_value = "60")]
        timeout: u64,
    },

    /// Send a pull request event to a webhook
    Trigger {
        /// Webhook URL
        #[arg(long, default_value = "http://localhost:5000/webhook")]
        url: String,

        /// Repository clone URL
        #[arg(long)]
        repo_url: String,

        /// Repository owner
        #[arg(long)]
        owner: String,

        /// Repository name
        #[arg(long)]
        name: String,

        /// Pull request number
        #[arg(long)]
        number: u64,

        /// Head branch
        #[arg(long)]
        branch: String,

        #[arg(long, default_value = "opened")]
        action: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    guardian_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Apply { file, patch, write } => cmd_apply(&file, &patch, write).await,
        Commands::Check {
            file,
            python,
            timeout,
        } => cmd_check(&file, &python, timeout).await,
        Commands::Trigger {
            url,
            repo_url,
            owner,
            name,
            number,
            branch,
            action,
        } => {
            let request = RunRequest {
                repository: RepoRef {
                    clone_url: repo_url,
                    owner,
                    name,
                },
                change_number: number,
                branch,
            };
            cmd_trigger(&url, &action, &request).await
        }
    }
}

fn read_suggestion(patch: &Path) -> Result<String> {
    if patch == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read suggestion from stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(patch)
            .with_context(|| format!("failed to read suggestion {}", patch.display()))
    }
}

fn describe_block(outcome: &BlockOutcome) -> String {
    match outcome {
        BlockOutcome::Applied { index, occurrences } => {
            format!("  ✓ block {} applied ({} occurrence(s))", index + 1, occurrences)
        }
        BlockOutcome::NotFound { index } => format!("  ✗ block {} not found", index + 1),
        BlockOutcome::EmptySearch { index } => {
            format!("  ✗ block {} has empty search text", index + 1)
        }
    }
}

/// Apply `suggestion` to the file's content; returns the original content and
/// the application report.
async fn apply_to_file(
    file: &Path,
    suggestion: &str,
    write: bool,
) -> Result<(String, PatchApplication)> {
    let original = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let application = PatchApplier::apply_with_report(&original, suggestion);

    if write && application.content != original {
        tokio::fs::write(file, &application.content)
            .await
            .with_context(|| format!("failed to write {}", file.display()))?;
    }
    Ok((original, application))
}

async fn cmd_apply(file: &Path, patch: &Path, write: bool) -> Result<()> {
    let suggestion = read_suggestion(patch)?;
    let (original, application) = apply_to_file(file, &suggestion, write).await?;

    println!(
        "{}: {}/{} block(s) applied",
        file.display(),
        application.applied_count(),
        application.blocks.len()
    );
    for outcome in &application.blocks {
        println!("{}", describe_block(outcome));
    }

    if application.content == original {
        println!("No changes.");
    } else if write {
        println!("Wrote {}", file.display());
    } else {
        print!(
            "{}",
            unified_diff(&file.display().to_string(), &original, &application.content)
        );
    }
    Ok(())
}

async fn run_check(file: &Path, python: &str, timeout: u64) -> GateVerdict {
    ValidationGate::with_defaults(python, timeout)
        .evaluate(file)
        .await
}

async fn cmd_check(file: &Path, python: &str, timeout: u64) -> Result<()> {
    let verdict = run_check(file, python, timeout).await;
    let check = verdict.check.as_deref().unwrap_or("none");
    if verdict.passed {
        println!("✓ {} passed ({})", file.display(), check);
        Ok(())
    } else {
        println!("✗ {} failed ({})", file.display(), check);
        println!("{}", verdict.message);
        anyhow::bail!("syntax check failed for {}", file.display())
    }
}

/// POST a synthetic event; returns the HTTP status and response body.
async fn send_event(url: &str, action: &str, request: &RunRequest) -> Result<(u16, String)> {
    let event = PullRequestEvent::new(action, request);
    let response = reqwest::Client::new()
        .post(url)
        .header("X-Gitea-Event", PULL_REQUEST_EVENT)
        .json(&event)
        .send()
        .await
        .with_context(|| format!("failed to reach {url}"))?;
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Ok((status, body))
}

async fn cmd_trigger(url: &str, action: &str, request: &RunRequest) -> Result<()> {
    println!("Triggering webhook at {url}...");
    let (status, body) = send_event(url, action, request).await?;
    println!("Status: {status}");
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("Response: {}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("Response: {body}"),
    }
    if !(200..300).contains(&status) {
        anyhow::bail!("webhook returned {status}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use guardian_core::{DIVIDER_MARKER, REPLACE_MARKER, SEARCH_MARKER};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn suggestion(search: &str, replace: &str) -> String {
        format!("{SEARCH_MARKER}\n{search}\n{DIVIDER_MARKER}\n{replace}\n{REPLACE_MARKER}\n")
    }

    #[test]
    fn test_cli_parses_trigger() {
        let cli = Cli::try_parse_from([
            "guardian",
            "trigger",
            "--repo-url",
            "http://localhost:3000/admin/repo.git",
            "--owner",
            "admin",
            "--name",
            "repo",
            "--number",
            "7",
            "--branch",
            "feature",
        ])
        .unwrap();
        match cli.command {
            Commands::Trigger {
                url,
                number,
                action,
                ..
            } => {
                assert_eq!(url, "http://localhost:5000/webhook");
                assert_eq!(number, 7);
                assert_eq!(action, "opened");
            }
            _ => panic!("expected trigger"),
        }
    }

    #[tokio::test]
    async fn test_apply_without_write_leaves_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("app.py");
        std::fs::write(&file, "DEBUG = True\n").unwrap();

        let (_, application) =
            apply_to_file(&file, &suggestion("DEBUG = True", "DEBUG = False"), false)
                .await
                .unwrap();
        assert_eq!(application.content, "DEBUG = False\n");
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "DEBUG = True\n");
    }

    #[tokio::test]
    async fn test_apply_with_write_updates_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("app.py");
        let patch = dir.path().join("fix.txt");
        std::fs::write(&file, "DEBUG = True\n").unwrap();
        std::fs::write(&patch, suggestion("DEBUG = True", "DEBUG = False")).unwrap();

        cmd_apply(&file, &patch, true).await.unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "DEBUG = False\n");
    }

    #[test]
    fn test_describe_block() {
        assert_eq!(
            describe_block(&BlockOutcome::Applied {
                index: 0,
                occurrences: 2
            }),
            "  ✓ block 1 applied (2 occurrence(s))"
        );
        assert!(describe_block(&BlockOutcome::NotFound { index: 1 }).contains("block 2 not found"));
    }

    #[tokio::test]
    async fn test_check_rejects_unknown_file_type() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, "hello\n").unwrap();

        let verdict = run_check(&file, "python", 5).await;
        assert!(!verdict.passed);
        assert!(verdict.check.is_none());
        assert!(cmd_check(&file, "python", 5).await.is_err());
    }

    #[tokio::test]
    async fn test_trigger_posts_pull_request_event() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhook"))
            .and(header("X-Gitea-Event", "pull_request"))
            .and(body_partial_json(serde_json::json!({
                "action": "opened",
                "number": 7,
                "pull_request": { "head": { "ref": "feature" } },
                "repository": { "name": "repo", "owner": { "username": "admin" } }
            })))
            .respond_with(
                ResponseTemplate::new(202).set_body_json(serde_json::json!({ "status": "processing" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let request = RunRequest {
            repository: RepoRef {
                clone_url: "http://localhost:3000/admin/repo.git".to_string(),
                owner: "admin".to_string(),
                name: "repo".to_string(),
            },
            change_number: 7,
            branch: "feature".to_string(),
        };
        let url = format!("{}/webhook", server.uri());
        let (status, body) = send_event(&url, "opened", &request).await.unwrap();
        assert_eq!(status, 202);
        assert!(body.contains("processing"));
    }
}
