//! Pull request webhook payloads.
//!
//! Only the fields a run needs are modelled; everything else in the hosting
//! service's payload is ignored.

use serde::{Deserialize, Serialize};

use super::error::PayloadError;
use super::run::{RepoRef, RunRequest};

/// Event category that can start a run.
pub const PULL_REQUEST_EVENT: &str = "pull_request";

/// Actions that start a run. `synchronize` is the GitHub spelling.
pub const ACTIONABLE_ACTIONS: &[&str] = &["opened", "reopened", "synchronized", "synchronize"];

pub fn is_actionable_action(action: &str) -> bool {
    ACTIONABLE_ACTIONS.contains(&action)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    /// Gitea sends `username`; GitHub sends `login`.
    #[serde(alias = "login")]
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub owner: Owner,
    pub clone_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestHead {
    #[serde(rename = "ref")]
    pub branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub head: PullRequestHead,
}

/// A `pull_request` webhook body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestEvent {
    pub action: String,
    pub number: u64,
    pub pull_request: PullRequest,
    pub repository: Repository,
}

impl PullRequestEvent {
    pub fn new(action: &str, request: &RunRequest) -> Self {
        Self {
            action: action.to_string(),
            number: request.change_number,
            pull_request: PullRequest {
                head: PullRequestHead {
                    branch: request.branch.clone(),
                },
            },
            repository: Repository {
                name: request.repository.name.clone(),
                owner: Owner {
                    username: request.repository.owner.clone(),
                },
                clone_url: request.repository.clone_url.clone(),
            },
        }
    }

    pub fn is_actionable(&self) -> bool {
        is_actionable_action(&self.action)
    }

    /// Convert to a run request, rejecting empty identifying fields.
    pub fn into_request(self) -> Result<RunRequest, PayloadError> {
        fn required(value: String, field: &'static str) -> Result<String, PayloadError> {
            if value.trim().is_empty() {
                Err(PayloadError::MissingField { field })
            } else {
                Ok(value)
            }
        }

        if self.number == 0 {
            return Err(PayloadError::MissingField { field: "number" });
        }
        Ok(RunRequest {
            repository: RepoRef {
                clone_url: required(self.repository.clone_url, "repository.clone_url")?,
                owner: required(self.repository.owner.username, "repository.owner.username")?,
                name: required(self.repository.name, "repository.name")?,
            },
            change_number: self.number,
            branch: required(self.pull_request.head.branch, "pull_request.head.ref")?,
        })
    }
}
