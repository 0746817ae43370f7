//! Daemon configuration from flags and environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use guardian_integrations::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use guardian_integrations::{
    BanditAnalyzer, BanditConfig, GeminiConfig, GeminiOracle, GitCli, GitIdentity, GiteaAuth,
    GiteaConfig, GiteaNotifier,
};
use guardian_pipeline::{
    Collaborators, FixOrchestrator, PipelineConfig, ValidationGate, WorkspaceManager,
};

#[derive(Debug, Clone, Parser)]
#[command(name = "guardiand")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Guardian webhook daemon: fixes security findings on pull requests", long_about = None)]
pub struct DaemonConfig {
    /// Address to listen on
    #[arg(long, env = "GUARDIAN_BIND", default_value = "0.0.0.0")]
    pub bind: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Directory holding per-run workspaces
    #[arg(long, env = "GUARDIAN_WORK_DIR", default_value = "./temp_repos")]
    pub work_dir: PathBuf,

    /// Keep workspaces after successful runs
    #[arg(long, env = "GUARDIAN_KEEP_WORKSPACES")]
    pub keep_workspaces: bool,

    /// Gitea base URL
    #[arg(long, env = "GITEA_URL", default_value = "http://localhost:3000")]
    pub gitea_url: String,

    #[arg(long, env = "GITEA_TOKEN", hide_env_values = true)]
    pub gitea_token: Option<String>,

    #[arg(long, env = "GITEA_USER")]
    pub gitea_user: Option<String>,

    #[arg(long, env = "GITEA_PASS", hide_env_values = true)]
    pub gitea_pass: Option<String>,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL)]
    pub gemini_model: String,

    #[arg(long, env = "GEMINI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub gemini_base_url: String,

    /// Bandit executable
    #[arg(long, env = "GUARDIAN_BANDIT", default_value = "bandit")]
    pub bandit: String,

    /// Python interpreter used for syntax checks
    #[arg(long, env = "GUARDIAN_PYTHON", default_value = "python")]
    pub python: String,

    /// Timeout for a single syntax check
    #[arg(long, env = "GUARDIAN_CHECK_TIMEOUT_SECS", default_value_t = 60)]
    pub check_timeout_secs: u64,

    /// Author name on published commits
    #[arg(long, env = "GUARDIAN_GIT_NAME", default_value = "Guardian Agent")]
    pub git_name: String,

    /// Author email on published commits
    #[arg(long, env = "GUARDIAN_GIT_EMAIL", default_value = "guardian-agent@localhost")]
    pub git_email: String,

    #[arg(long, env = "GUARDIAN_COMMIT_MESSAGE", default_value = "chore: Security fixes by Guardian Agent")]
    pub commit_message: String,

    /// Emit JSON-formatted log lines
    #[arg(long, env = "GUARDIAN_LOG_JSON")]
    pub log_json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl DaemonConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.bind, self.port))
    }

    pub fn gitea_config(&self) -> GiteaConfig {
        GiteaConfig::new(
            &self.gitea_url,
            GiteaAuth::resolve(
                self.gitea_token.clone(),
                self.gitea_user.clone(),
                self.gitea_pass.clone(),
            ),
        )
    }

    pub fn gemini_config(&self) -> GeminiConfig {
        let config = GeminiConfig::new(&self.gemini_base_url, &self.gemini_model);
        match self.gemini_api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => config.with_api_key(key),
            None => config,
        }
    }

    pub fn bandit_config(&self) -> BanditConfig {
        BanditConfig {
            program: self.bandit.clone(),
            ..BanditConfig::default()
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            commit_message: self.commit_message.clone(),
            release_workspaces: !self.keep_workspaces,
        }
    }

    pub fn gate(&self) -> ValidationGate {
        ValidationGate::with_defaults(&self.python, self.check_timeout_secs)
    }

    /// Wire the concrete collaborators into an orchestrator.
    pub fn build_orchestrator(&self) -> Result<FixOrchestrator> {
        let oracle = GeminiOracle::new(self.gemini_config()).context("failed to build Gemini client")?;
        let notifier =
            GiteaNotifier::new(self.gitea_config()).context("failed to build Gitea client")?;
        let vcs = GitCli::new(GitIdentity {
            name: self.git_name.clone(),
            email: self.git_email.clone(),
        });

        let deps = Collaborators {
            analyzer: Arc::new(BanditAnalyzer::new(self.bandit_config())),
            oracle: Arc::new(oracle),
            vcs: Arc::new(vcs),
            notifier: Arc::new(notifier),
        };
        Ok(FixOrchestrator::new(
            deps,
            self.gate(),
            WorkspaceManager::new(&self.work_dir),
            self.pipeline_config(),
        ))
    }
}
