//! Guardian Integrations
//!
//! Concrete collaborators for the remediation pipeline:
//! - `BanditAnalyzer`: Python static analysis via the `bandit` CLI
//! - `GeminiOracle`: SEARCH/REPLACE suggestions from the Gemini REST API
//! - `GitCli`: clone / checkout / commit / push through the `git` CLI
//! - `GiteaNotifier`: pull request comments through the Gitea REST API

pub mod bandit;
pub mod error;
pub mod gemini;
pub mod git;
pub mod gitea;
mod process;

pub use bandit::{parse_report, BanditAnalyzer, BanditConfig};
pub use error::IntegrationError;
pub use gemini::{build_prompt, GeminiConfig, GeminiOracle};
pub use git::{GitCli, GitIdentity};
pub use gitea::{GiteaAuth, GiteaConfig, GiteaNotifier};

/// Result type for integration operations
pub type Result<T> = std::result::Result<T, IntegrationError>;
