//! Git transport through the `git` CLI.

use std::path::Path;

use async_trait::async_trait;
use guardian_core::{GuardianError, VcsClient};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::IntegrationError;
use crate::process::{capture, stderr_of};
use crate::Result;

/// Author and committer identity used for published commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitIdentity {
    pub name: String,
    pub email: String,
}

impl Default for GitIdentity {
    fn default() -> Self {
        Self {
            name: "Guardian Agent".to_string(),
            email: "guardian-agent@localhost".to_string(),
        }
    }
}

/// `VcsClient` backed by the git executable.
///
/// Stateless: every call spawns its own git process, so one instance can be
/// shared by any number of concurrent runs.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
    identity: GitIdentity,
    timeout_secs: u64,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new(GitIdentity::default())
    }
}

impl GitCli {
    pub fn new(identity: GitIdentity) -> Self {
        Self {
            program: "git".to_string(),
            identity,
            timeout_secs: 300,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    async fn git(&self, cwd: Option<&Path>, args: &[&str]) -> Result<String> {
        let output = capture(&self.program, args, cwd, self.timeout_secs).await?;
        if !output.status.success() {
            return Err(IntegrationError::CommandFailed {
                command: format!("git {}", subcommand(args)),
                exit_code: output.status.code().unwrap_or(-1),
                stderr: stderr_of(&output),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn head(&self, repo_root: &Path) -> Result<String> {
        let sha = self.git(Some(repo_root), &["rev-parse", "HEAD"]).await?;
        if sha.is_empty() {
            return Err(IntegrationError::EmptyResponse(
                "git rev-parse HEAD returned empty output".to_string(),
            ));
        }
        Ok(sha)
    }

    pub async fn clone_into(&self, repo_url: &str, dest: &Path) -> Result<()> {
        let dest = dest.to_string_lossy();
        info!(url = %repo_url, dest = %dest, "cloning repository");
        self.git(None, &["clone", "--quiet", "--", repo_url, &*dest])
            .await
            .map(|_| ())
    }

    pub async fn checkout_branch(&self, repo_root: &Path, branch: &str) -> Result<String> {
        debug!(branch = %branch, "checking out");
        self.git(Some(repo_root), &["checkout", "--quiet", branch])
            .await?;
        self.head(repo_root).await
    }

    pub async fn add(&self, repo_root: &Path, files: &[String]) -> Result<()> {
        let mut args = vec!["add", "--"];
        args.extend(files.iter().map(String::as_str));
        self.git(Some(repo_root), &args).await.map(|_| ())
    }

    pub async fn commit_staged(&self, repo_root: &Path, message: &str) -> Result<String> {
        let name = format!("user.name={}", self.identity.name);
        let email = format!("user.email={}", self.identity.email);
        self.git(
            Some(repo_root),
            &["-c", name.as_str(), "-c", email.as_str(), "commit", "--quiet", "-m", message],
        )
        .await?;
        self.head(repo_root).await
    }

    pub async fn push_branch(&self, repo_root: &Path, branch: &str) -> Result<()> {
        info!(branch = %branch, "pushing to origin");
        self.git(Some(repo_root), &["push", "--quiet", "origin", branch])
            .await
            .map(|_| ())
    }
}

/// The git subcommand in `args`, skipping `-c key=value` pairs.
fn subcommand<'a>(args: &[&'a str]) -> &'a str {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if *arg == "-c" {
            iter.next();
        } else if !arg.starts_with('-') {
            return arg;
        }
    }
    ""
}

fn vcs_error(err: IntegrationError) -> GuardianError {
    GuardianError::Vcs(err.to_string())
}

#[async_trait]
impl VcsClient for GitCli {
    async fn clone_repo(&self, repo_url: &str, dest: &Path) -> guardian_core::Result<()> {
        self.clone_into(repo_url, dest).await.map_err(vcs_error)
    }

    async fn checkout(&self, repo_root: &Path, branch: &str) -> guardian_core::Result<String> {
        self.checkout_branch(repo_root, branch)
            .await
            .map_err(vcs_error)
    }

    async fn stage(&self, repo_root: &Path, files: &[String]) -> guardian_core::Result<()> {
        self.add(repo_root, files).await.map_err(vcs_error)
    }

    async fn commit(&self, repo_root: &Path, message: &str) -> guardian_core::Result<String> {
        self.commit_staged(repo_root, message)
            .await
            .map_err(vcs_error)
    }

    async fn push(&self, repo_root: &Path, branch: &str) -> guardian_core::Result<()> {
        self.push_branch(repo_root, branch).await.map_err(vcs_error)
    }
}
