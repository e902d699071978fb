//! Text generation capability used for ranking, OCR, summaries and tags.

pub mod enrich;
pub mod gemini;
#[cfg(test)]
pub mod mock;

use async_trait::async_trait;

pub use gemini::GeminiClient;

#[derive(thiserror::Error, Debug)]
pub enum AiError {
    #[error("reqwest error: {0:?}")]
    Reqwest(#[from] reqwest::Error),

    #[error("generation service responded with {status}: {message}")]
    Status { status: u16, message: String },

    #[error("generation service returned no text")]
    EmptyAnswer,

    #[error("generation service is not configured (missing api key)")]
    NotConfigured,
}

/// Sampling parameters sent with a single generation request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_k: Option<u32>,
    pub top_p: Option<f32>,
    pub max_output_tokens: u32,
}

impl GenerationParams {
    /// Low randomness, room for a long index list.
    pub const RANKING: GenerationParams = GenerationParams {
        temperature: 0.2,
        top_k: Some(40),
        top_p: Some(0.95),
        max_output_tokens: 2048,
    };

    pub const SUMMARY: GenerationParams = GenerationParams {
        temperature: 0.7,
        top_k: Some(40),
        top_p: Some(0.95),
        max_output_tokens: 1024,
    };

    pub const TAGS: GenerationParams = GenerationParams {
        temperature: 0.5,
        top_k: None,
        top_p: None,
        max_output_tokens: 100,
    };
}

/// Text in, text out. Callers must tolerate prose around the answer.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, params: GenerationParams) -> Result<String, AiError>;

    /// Vision variant: image bytes plus an instruction.
    async fn describe_image(
        &self,
        image: &[u8],
        mime_type: &str,
        instruction: &str,
    ) -> Result<String, AiError>;
}

/// Stand-in when no generation service is configured. Every call fails, so
/// ranking uses the keyword fallback and enrichment uses placeholders.
pub struct Unavailable;

#[async_trait]
impl TextGenerator for Unavailable {
    async fn generate(&self, _prompt: &str, _params: GenerationParams) -> Result<String, AiError> {
        Err(AiError::NotConfigured)
    }

    async fn describe_image(
        &self,
        _image: &[u8],
        _mime_type: &str,
        _instruction: &str,
    ) -> Result<String, AiError> {
        Err(AiError::NotConfigured)
    }
}
