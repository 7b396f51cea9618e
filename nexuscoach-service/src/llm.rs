//! Text generation providers.
//!
//! A [`TextGenerator`] turns a fully rendered prompt into reply text. The
//! service treats every failure as recoverable and falls back to templates.

mod gemini;
mod ollama;

pub use gemini::GeminiGenerator;
pub use ollama::OllamaGenerator;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::{LlmConfig, LlmProvider};
use crate::error::ServiceResult;

/// Sampling settings shared by the providers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl From<&LlmConfig> for Sampling {
    fn from(config: &LlmConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_p: config.top_p,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Provider name for logs and metrics
    fn name(&self) -> &'static str;

    /// Generate reply text. Empty output is an error.
    async fn generate(&self, prompt: &str) -> ServiceResult<String>;
}

/// Build the configured generator. `None` means templates only.
pub fn build_generator(config: &LlmConfig) -> ServiceResult<Option<Arc<dyn TextGenerator>>> {
    match config.provider {
        LlmProvider::Rules => {
            info!("Text generation disabled, using reply templates");
            Ok(None)
        }
        LlmProvider::Gemini => match config.api_key() {
            Some(key) => {
                info!(model = %config.model, "Using Gemini text generation");
                Ok(Some(Arc::new(GeminiGenerator::new(config, key)?)))
            }
            None => {
                warn!("llm.provider = gemini but no api key is set, using reply templates");
                Ok(None)
            }
        },
        LlmProvider::Ollama => {
            info!(model = %config.model, url = %config.base_url(), "Using Ollama text generation");
            Ok(Some(Arc::new(OllamaGenerator::new(config)?)))
        }
    }
}
