use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::CompletionService;
use crate::error::ExchangeError;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

// Every level is optional and may be null: a reply missing any of them
// still parses and yields no text.
#[derive(Deserialize, Default)]
#[serde(default)]
struct GeminiResponse {
    candidates: Option<Vec<Option<GeminiCandidate>>>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct GeminiCandidate {
    content: Option<GeminiReplyContent>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct GeminiReplyContent {
    parts: Option<Vec<Option<GeminiReplyPart>>>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct GeminiReplyPart {
    text: Option<String>,
}

impl GeminiResponse {
    /// `candidates[0].content.parts[0].text`, ignoring empty text
    fn into_text(self) -> Option<String> {
        self.candidates?
            .into_iter()
            .next()??
            .content?
            .parts?
            .into_iter()
            .next()??
            .text
            .filter(|text| !text.is_empty())
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    pub async fn generate(&self, prompt: &str) -> Result<Option<String>, ExchangeError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ExchangeError::ServiceUnavailable("Gemini API key not configured".to_string()))?;

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await
            .map_err(|e| ExchangeError::ServiceUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ExchangeError::ServiceUnavailable(format!(
                "Gemini API error {}: {}",
                status, text
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ExchangeError::ServiceUnavailable(e.to_string()))?;
        let gemini_response: Option<GeminiResponse> = serde_json::from_str(&body)
            .map_err(|e| ExchangeError::MalformedResponse(e.to_string()))?;

        Ok(gemini_response.and_then(GeminiResponse::into_text))
    }
}

#[async_trait]
impl CompletionService for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<Option<String>, ExchangeError> {
        self.generate(prompt).await
    }
}
