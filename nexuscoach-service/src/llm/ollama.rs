use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Sampling, TextGenerator};
use crate::config::LlmConfig;
use crate::error::{ProviderError, ServiceResult};

const PROVIDER: &str = "ollama";

/// Ollama chat API client
pub struct OllamaGenerator {
    client: Client,
    base_url: String,
    model: String,
    sampling: Sampling,
}

impl OllamaGenerator {
    pub fn new(config: &LlmConfig) -> ServiceResult<Self> {
        let base_url = config.base_url();
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ProviderError::Connection {
                url: base_url.clone(),
                source: e,
            })?;

        Ok(Self {
            client,
            base_url,
            model: config.model.clone(),
            sampling: Sampling::from(config),
        })
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn generate(&self, prompt: &str) -> ServiceResult<String> {
        let url = format!("{}/api/chat", self.base_url);

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            stream: false,
            options: ChatOptions {
                temperature: self.sampling.temperature,
                top_p: self.sampling.top_p,
                num_predict: self.sampling.max_output_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Connection {
                url: url.clone(),
                source: e,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Request { status, message }.into());
        }

        let chat: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    provider: PROVIDER,
                    message: e.to_string(),
                })?;

        let text = chat.message.content.trim().to_string();
        if text.is_empty() {
            return Err(ProviderError::EmptyOutput { provider: PROVIDER }.into());
        }
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmProvider;

    #[test]
    fn test_default_base_url() {
        let mut config: LlmConfig = serde_json::from_str("{}").unwrap();
        config.provider = LlmProvider::Ollama;
        let generator = OllamaGenerator::new(&config).unwrap();
        assert_eq!(generator.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_request_options() {
        let request = ChatRequest {
            model: "llama3".to_string(),
            messages: vec![],
            stream: false,
            options: ChatOptions {
                temperature: 0.5,
                top_p: 0.9,
                num_predict: 180,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["options"]["num_predict"], 180);
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_parse_response() {
        let chat: ChatResponse = serde_json::from_str(
            r#"{"model":"llama3","message":{"role":"assistant","content":"Group up."},"done":true}"#,
        )
        .unwrap();
        assert_eq!(chat.message.content, "Group up.");
    }
}
