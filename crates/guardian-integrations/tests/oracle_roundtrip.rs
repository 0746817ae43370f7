//! Gemini suggestions flowing into the patch applier.

use guardian_core::{Confidence, Finding, PatchApplier, SuggestionOracle, SuggestionRequest};
use guardian_integrations::{GeminiConfig, GeminiOracle};
use serde_json::json;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const APP_PY: &str = "def lookup(conn, name):\n    return conn.execute(\"SELECT * FROM t WHERE n = '%s'\" % name)\n";

async fn oracle_returning(text: &str) -> (MockServer, GeminiOracle) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/v1beta/models/[^/]+:generateContent$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        })))
        .mount(&server)
        .await;
    let oracle = GeminiOracle::new(
        GeminiConfig::new(&server.uri(), "gemini-test").with_api_key("k"),
    )
    .unwrap();
    (server, oracle)
}

fn request() -> SuggestionRequest {
    let finding = Finding::new("app.py", 2, "SQL Injection", Confidence::High);
    SuggestionRequest::for_finding(&finding, "app.py", APP_PY)
}

#[tokio::test]
async fn test_fenced_suggestion_applies_cleanly() {
    let reply = "Here is the fix:\n```python\n<<<<<<< SEARCH\n    return conn.execute(\"SELECT * FROM t WHERE n = '%s'\" % name)\n=======\n    return conn.execute(\"SELECT * FROM t WHERE n = ?\", (name,))\n>>>>>>> REPLACE\n```\n";
    let (_server, oracle) = oracle_returning(reply).await;

    let suggestion = oracle.suggest(&request()).await.unwrap();
    let patched = PatchApplier::apply(APP_PY, &suggestion);

    assert_eq!(
        patched,
        "def lookup(conn, name):\n    return conn.execute(\"SELECT * FROM t WHERE n = ?\", (name,))\n"
    );
}

#[tokio::test]
async fn test_prose_only_reply_leaves_content_untouched() {
    let (_server, oracle) = oracle_returning("I could not find a safe fix for this code.").await;

    let suggestion = oracle.suggest(&request()).await.unwrap();
    assert_eq!(PatchApplier::apply(APP_PY, &suggestion), APP_PY);
}
