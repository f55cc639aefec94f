//! Message-idea suggestions via a hosted generative-text API.
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use tracing::warn;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/";

/// Prompt sent for every suggestion request.
const SUGGESTION_PROMPT: &str = "Gere uma mensagem curta e amigável para um cliente de um canil, \
em português do Brasil. A mensagem pode ser sobre um novo filhote, um lembrete de vacina ou \
apenas um 'olá'. Dê apenas a mensagem, sem introduções.";

/// Shown to the operator when the API call fails, in place of an error.
pub const SUGGESTION_FALLBACK: &str =
    "Não foi possível gerar uma ideia de mensagem. Tente novamente mais tarde.";

#[async_trait]
pub trait SuggestionService: Send + Sync {
    /// One short, friendly outreach message for a kennel client.
    async fn message_idea(&self) -> Result<String>;
}

/// Production suggestion client against the Gemini generateContent API.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: Url,
    api_key: String,
    model: String,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Self {
        let base_url = Url::parse(GEMINI_API_BASE).expect("valid default Gemini URL");
        Self::with_base_url(api_key, model, base_url)
    }

    pub fn with_base_url(api_key: String, model: String, base_url: Url) -> Self {
        let http = Client::builder()
            .user_agent("canil-console/0.1")
            .no_proxy()
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            api_key,
            model,
        }
    }

    pub fn build_request(&self) -> Result<reqwest::Request> {
        let endpoint = self
            .base_url
            .join(&format!("v1beta/models/{}:generateContent", self.model))
            .context("invalid Gemini base URL")?;
        let body = json!({
            "contents": [{ "parts": [{ "text": SUGGESTION_PROMPT }] }],
        });
        self.http
            .post(endpoint)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .build()
            .context("failed to build Gemini request")
    }
}

#[async_trait]
impl SuggestionService for GeminiClient {
    async fn message_idea(&self) -> Result<String> {
        if self.api_key.trim().is_empty() {
            return Err(anyhow!("suggest.api_key is not configured"));
        }
        let request = self.build_request()?;
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach the suggestion API")?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            warn!(%status, body, "suggestion API error");
            return Err(anyhow!("suggestion API error {}: {}", status, body));
        }
        let payload: Value = res
            .json()
            .await
            .context("invalid suggestion API response JSON")?;
        extract_idea(&payload).ok_or_else(|| anyhow!("suggestion API returned no candidates"))
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// First non-empty candidate text, trimmed.
pub fn extract_idea(payload: &Value) -> Option<String> {
    let parsed: GenerateContentResponse = serde_json::from_value(payload.clone()).ok()?;
    parsed
        .candidates
        .into_iter()
        .flat_map(|c| c.content.parts)
        .map(|p| p.text.trim().to_string())
        .find(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn build_request_targets_configured_model() {
        let client = GeminiClient::new("key".into(), "gemini-2.5-flash".into());
        let request = client.build_request().unwrap();
        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(
            request.url().path(),
            "/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert_eq!(
            request
                .headers()
                .get("x-goog-api-key")
                .and_then(|h| h.to_str().ok()),
            Some("key")
        );
    }

    #[test]
    fn extract_idea_reads_first_candidate() {
        let payload = json!({
            "candidates": [
                { "content": { "parts": [{ "text": "  Olá! Temos um novo filhote. " }] } }
            ]
        });
        assert_eq!(
            extract_idea(&payload).as_deref(),
            Some("Olá! Temos um novo filhote.")
        );
    }

    #[test]
    fn extract_idea_skips_empty_parts() {
        let payload = json!({
            "candidates": [
                { "content": { "parts": [{ "text": "   " }] } },
                { "content": { "parts": [{ "text": "Olá!" }] } }
            ]
        });
        assert_eq!(extract_idea(&payload).as_deref(), Some("Olá!"));
    }

    #[test]
    fn extract_idea_handles_no_candidates() {
        assert_eq!(extract_idea(&json!({})), None);
    }
}
