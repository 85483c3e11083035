//! Gemini REST client.
//!
//! Implements [`TextGenerator`] via `models/{model}:generateContent` and [`Embedder`]
//! via `models/{embedding_model}:embedContent`. Calls are never retried here.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::{ApiError, Embedder, GenerationOptions, TextGenerator};
use crate::config::GenerationConfig;

pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    embedding_model: String,
    embedding_dim: usize,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

impl GeminiClient {
    pub fn new(config: &GenerationConfig) -> Result<Self, ApiError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(ApiError::MissingApiKey)?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            embedding_model: config.embedding_model.clone(),
            embedding_dim: config.embedding_dim,
        })
    }

    async fn post(&self, url: &str, body: &Value) -> Result<reqwest::Response, ApiError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// Build a `generateContent` request body.
pub(crate) fn generate_body(prompt: &str, options: &GenerationOptions) -> Value {
    let mut body = json!({
        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
    });
    if let Some(system) = &options.system_instruction {
        body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
    }
    if let Some(temperature) = options.temperature {
        body["generationConfig"] = json!({ "temperature": temperature });
    }
    body
}

/// Concatenate the non-thought text parts of the first candidate.
fn extract_text(response: GenerateResponse) -> Option<String> {
    let content = response.candidates.into_iter().next()?.content?;
    let text: String = content
        .parts
        .into_iter()
        .filter(|p| !p.thought)
        .filter_map(|p| p.text)
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate_text(&self, prompt: &str, options: &GenerationOptions) -> Result<String, ApiError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = generate_body(prompt, options);

        tracing::debug!(model = %self.model, prompt_len = prompt.len(), temperature = ?options.temperature, "generateContent");

        let response: GenerateResponse = self
            .post(&url, &body)
            .await?
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        extract_text(response).ok_or(ApiError::EmptyResponse)
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        let url = format!("{}/models/{}:embedContent", self.base_url, self.embedding_model);
        let body = json!({
            "model": format!("models/{}", self.embedding_model),
            "content": { "parts": [{ "text": text }] },
        });

        tracing::debug!(model = %self.embedding_model, text_len = text.len(), "embedContent");

        let response: EmbedResponse = self
            .post(&url, &body)
            .await?
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        let values = response.embedding.values;
        if values.len() != self.embedding_dim {
            return Err(ApiError::Dimension {
                expected: self.embedding_dim,
                found: values.len(),
            });
        }
        Ok(values)
    }

    fn dimensions(&self) -> usize {
        self.embedding_dim
    }

    fn model_id(&self) -> &str {
        &self.embedding_model
    }
}
