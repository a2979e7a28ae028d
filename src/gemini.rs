//! Minimal Gemini `generateContent` client.

use std::fmt;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::LlmConfig;
use crate::error::Error;

const CONNECT_TIMEOUT_SECS: u64 = 30;

pub struct GeminiClient {
    api_key: String,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
    base_url: String,
    client: Client,
}

// keep the key out of debug output
impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Build a client from config. The key comes from `config.api_key`.
    ///
    /// # Errors
    ///
    /// [`Error::MissingApiKey`] when no non-blank key is configured.
    pub fn from_config(config: &LlmConfig) -> Result<Self, Error> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(Error::MissingApiKey)?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Llm {
                message: format!("building HTTP client: {}", e),
            })?;

        Ok(Self {
            api_key: api_key.to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one system instruction plus one user prompt and return the text
    /// of the first candidate.
    pub async fn generate(&self, system: &str, prompt: &str) -> Result<String, Error> {
        let payload = json!({
            "systemInstruction": {"parts": [{"text": system}]},
            "contents": [{"role": "user", "parts": [{"text": prompt}]}],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_output_tokens,
            },
        });

        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        debug!("gemini: sending {} prompt chars to {}", prompt.len(), self.model);

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Llm {
                message: format!("request failed: {}", e.without_url()),
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Llm {
            message: format!("reading response: {}", e.without_url()),
        })?;

        if !status.is_success() {
            return Err(classify_failure(status, &body));
        }

        let json: Value = serde_json::from_str(&body).map_err(|e| Error::Llm {
            message: format!("invalid JSON response: {}", e),
        })?;
        let text = parse_response(&json)?;
        info!("gemini: {} returned {} chars", self.model, text.len());
        Ok(text)
    }
}

/// Map a non-success response onto the error taxonomy.
fn classify_failure(status: StatusCode, body: &str) -> Error {
    let json: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let message = json["error"]["message"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| body.chars().take(200).collect());
    let api_status = json["error"]["status"].as_str().unwrap_or("");

    let invalid_key = body.contains("API_KEY_INVALID");
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN || invalid_key {
        return Error::InvalidApiKey;
    }

    if status == StatusCode::TOO_MANY_REQUESTS
        || api_status == "RESOURCE_EXHAUSTED"
        || message.to_lowercase().contains("quota")
    {
        return Error::RateLimited { message };
    }

    Error::Llm {
        message: format!("HTTP {}: {}", status.as_u16(), message),
    }
}

fn parse_response(json: &Value) -> Result<String, Error> {
    if let Some(reason) = json["promptFeedback"]["blockReason"].as_str() {
        return Err(Error::ResponseBlocked {
            reason: reason.to_string(),
        });
    }

    let candidate = &json["candidates"][0];
    let text: String = candidate["content"]["parts"]
        .as_array()
        .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
        .unwrap_or_default();

    if !text.trim().is_empty() {
        return Ok(text);
    }

    match candidate["finishReason"].as_str() {
        Some(reason) if reason == "SAFETY" || reason.starts_with("BLOCK") => {
            Err(Error::ResponseBlocked {
                reason: reason.to_string(),
            })
        }
        _ => Err(Error::EmptyResponse),
    }
}
