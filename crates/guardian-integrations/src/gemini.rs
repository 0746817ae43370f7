//! Gemini `generateContent` client producing SEARCH/REPLACE suggestions.

use std::time::Duration;

use async_trait::async_trait;
use guardian_core::{GuardianError, SuggestionOracle, SuggestionRequest};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::error::{snippet, IntegrationError};
use crate::Result;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key; without one every request fails fast
    pub api_key: Option<String>,
    pub model: String,
    /// Service root, without the `/v1beta` suffix
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        GeminiConfig {
            api_key: std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
            model: std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            timeout_secs: 120,
        }
    }
}

impl GeminiConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific endpoint
    pub fn new(base_url: &str, model: &str) -> Self {
        GeminiConfig {
            api_key: None,
            model: model.to_string(),
            base_url: base_url.to_string(),
            timeout_secs: 120,
        }
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

/// `SuggestionOracle` backed by the Gemini REST API.
pub struct GeminiOracle {
    config: GeminiConfig,
    http_client: reqwest::Client,
}

impl GeminiOracle {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("guardian/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(GeminiOracle {
            config,
            http_client,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(GeminiConfig::from_env())
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Send `prompt` and return the trimmed text of the first candidate.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let key = self
            .config
            .api_key
            .as_deref()
            .ok_or(IntegrationError::NotConfigured("GEMINI_API_KEY"))?;

        info!(model = %self.config.model, "requesting suggestion");
        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-goog-api-key", key)
            .json(&json!({
                "contents": [{ "role": "user", "parts": [{ "text": prompt }] }]
            }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(IntegrationError::Status {
                status: status.as_u16(),
                body: snippet(&body, 300),
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let text = text.trim();
        if text.is_empty() {
            return Err(IntegrationError::EmptyResponse(
                "model returned no candidate text".to_string(),
            ));
        }
        debug!(chars = text.len(), "suggestion received");
        Ok(text.to_string())
    }
}

#[async_trait]
impl SuggestionOracle for GeminiOracle {
    async fn suggest(&self, request: &SuggestionRequest) -> guardian_core::Result<String> {
        self.generate(&build_prompt(request))
            .await
            .map_err(|e| GuardianError::Suggestion(e.to_string()))
    }
}

fn fence_language(file_path: &str) -> &'static str {
    match file_path.rsplit_once('.').map(|(_, ext)| ext) {
        Some("py") => "python",
        Some("js") => "javascript",
        Some("ts") => "typescript",
        Some("rb") => "ruby",
        Some("go") => "go",
        _ => "",
    }
}

/// Prompt asking for surgical SEARCH/REPLACE blocks for one finding.
pub fn build_prompt(request: &SuggestionRequest) -> String {
    let lang = fence_language(&request.file_path);
    format!(
        "You are a Senior Security Engineer.

Vulnerability Report:
{report}

Vulnerable Code ({path}):
```{lang}
{code}
```

Task:
1. Analyze the vulnerability accurately.
2. Propose a SURGICAL fix using SEARCH/REPLACE blocks.
3. PRESERVE as much of the original code, comments and structure as possible.

Format your response as one or more SEARCH/REPLACE blocks:
<<<<<<< SEARCH
[exact original code to be replaced]
=======
[the newly fixed code]
>>>>>>> REPLACE

Rules:
- The SEARCH section must EXACTLY match the original code, including whitespace and indentation.
- Return ONLY the blocks. No explanations.
- Read secrets from the environment (e.g. os.environ.get).
- Run system commands with argument lists, never through a shell string.
",
        report = request.vulnerability_report,
        path = request.file_path,
        lang = lang,
        code = request.file_content,
    )
}
