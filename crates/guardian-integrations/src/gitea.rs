//! Gitea REST client for pull request comments.

use std::time::Duration;

use async_trait::async_trait;
use guardian_core::{ChangeRef, GuardianError, Notifier};
use serde_json::json;
use tracing::debug;

use crate::error::{snippet, IntegrationError};
use crate::Result;

/// How requests authenticate.
#[derive(Clone, PartialEq, Eq)]
pub enum GiteaAuth {
    /// `Authorization: token <t>`
    Token(String),
    Basic { username: String, password: String },
    Anonymous,
}

impl std::fmt::Debug for GiteaAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GiteaAuth::Token(_) => f.write_str("Token(***)"),
            GiteaAuth::Basic { username, .. } => write!(f, "Basic({username}, ***)"),
            GiteaAuth::Anonymous => f.write_str("Anonymous"),
        }
    }
}

impl GiteaAuth {
    /// Token wins over username/password; either half of a basic pair alone is ignored.
    pub fn resolve(token: Option<String>, username: Option<String>, password: Option<String>) -> Self {
        match (token.filter(|t| !t.is_empty()), username, password) {
            (Some(token), _, _) => GiteaAuth::Token(token),
            (None, Some(username), Some(password)) if !username.is_empty() => {
                GiteaAuth::Basic { username, password }
            }
            _ => GiteaAuth::Anonymous,
        }
    }
}

/// Gitea configuration
#[derive(Debug, Clone)]
pub struct GiteaConfig {
    pub base_url: String,
    pub auth: GiteaAuth,
}

impl Default for GiteaConfig {
    fn default() -> Self {
        GiteaConfig {
            base_url: std::env::var("GITEA_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            auth: GiteaAuth::resolve(
                std::env::var("GITEA_TOKEN").ok(),
                std::env::var("GITEA_USER").ok(),
                std::env::var("GITEA_PASS").ok(),
            ),
        }
    }
}

impl GiteaConfig {
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn new(base_url: &str, auth: GiteaAuth) -> Self {
        GiteaConfig {
            base_url: base_url.to_string(),
            auth,
        }
    }
}

/// `Notifier` posting issue comments on the pull request.
pub struct GiteaNotifier {
    config: GiteaConfig,
    http_client: reqwest::Client,
}

impl GiteaNotifier {
    pub fn new(config: GiteaConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("guardian/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(GiteaNotifier {
            config,
            http_client,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(GiteaConfig::from_env())
    }

    fn comments_url(&self, change: &ChangeRef) -> String {
        format!(
            "{}/api/v1/repos/{}/{}/issues/{}/comments",
            self.config.base_url.trim_end_matches('/'),
            change.owner,
            change.repo,
            change.number
        )
    }

    /// Post `body` as a comment; anything but `201 Created` is an error.
    pub async fn comment(&self, change: &ChangeRef, body: &str) -> Result<()> {
        let url = self.comments_url(change);
        debug!(url = %url, "posting comment");

        let mut request = self.http_client.post(&url).json(&json!({ "body": body }));
        request = match &self.config.auth {
            GiteaAuth::Token(token) => request.header("Authorization", format!("token {token}")),
            GiteaAuth::Basic { username, password } => request.basic_auth(username, Some(password)),
            GiteaAuth::Anonymous => request,
        };

        let response = request.send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::CREATED {
            let text = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), body = %snippet(&text, 200), "comment rejected");
            return Err(IntegrationError::Status {
                status: status.as_u16(),
                body: snippet(&text, 300),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for GiteaNotifier {
    async fn post_comment(&self, change: &ChangeRef, body: &str) -> guardian_core::Result<()> {
        self.comment(change, body)
            .await
            .map_err(|e| GuardianError::Notify(e.to_string()))
    }
}
