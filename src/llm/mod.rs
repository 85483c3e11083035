//! Hosted generation and embedding API.
//!
//! Provides the [`TextGenerator`] and [`Embedder`] traits consumed by the synthesis
//! and ingestion pipelines, and a Gemini REST implementation created via
//! [`create_client`] from configuration.

pub mod gemini;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Failure of a call to the hosted generation or embedding API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("no API key configured (set GEMINI_API_KEY)")]
    MissingApiKey,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("API returned no text")]
    EmptyResponse,

    #[error("unexpected embedding size: expected {expected}, got {found}")]
    Dimension { expected: usize, found: usize },

    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Per-call knobs for text generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOptions {
    pub system_instruction: Option<String>,
    pub temperature: Option<f32>,
}

impl GenerationOptions {
    pub fn with_temperature(temperature: f32) -> Self {
        Self {
            temperature: Some(temperature),
            ..Default::default()
        }
    }
}

/// Text generation: one prompt in, one completion out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, prompt: &str, options: &GenerationOptions) -> Result<String, ApiError>;
}

/// Text embedding into a fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApiError>;

    /// Number of dimensions this embedder produces.
    fn dimensions(&self) -> usize;

    /// Identifier of the embedding model, recorded alongside stored vectors.
    fn model_id(&self) -> &str;
}

/// Create the hosted API client from config. The same client serves both traits.
pub fn create_client(
    config: &crate::config::GenerationConfig,
) -> Result<(Arc<dyn TextGenerator>, Arc<dyn Embedder>), ApiError> {
    let client = Arc::new(gemini::GeminiClient::new(config)?);
    let generator: Arc<dyn TextGenerator> = client.clone();
    let embedder: Arc<dyn Embedder> = client;
    Ok((generator, embedder))
}
