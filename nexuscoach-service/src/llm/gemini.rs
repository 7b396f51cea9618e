use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Sampling, TextGenerator};
use crate::config::LlmConfig;
use crate::error::{ProviderError, ServiceResult};

const PROVIDER: &str = "gemini";

/// Google Generative Language API client
pub struct GeminiGenerator {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    sampling: Sampling,
}

impl GeminiGenerator {
    pub fn new(config: &LlmConfig, api_key: &str) -> ServiceResult<Self> {
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
            api_key: api_key.to_string(),
            sampling: Sampling::from(config),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn generate(&self, prompt: &str) -> ServiceResult<String> {
        let url = self.endpoint();
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.sampling.temperature,
                top_p: self.sampling.top_p,
                max_output_tokens: self.sampling.max_output_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
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

        let body: GenerateResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    provider: PROVIDER,
                    message: e.to_string(),
                })?;

        let text = body.text();
        if text.is_empty() {
            return Err(ProviderError::EmptyOutput { provider: PROVIDER }.into());
        }
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
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

impl GenerateResponse {
    /// Text of the first candidate, parts joined
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<String>()
            })
            .unwrap_or_default()
            .trim()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: "hi".to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.5,
                top_p: 0.9,
                max_output_tokens: 180,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 180);
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
    }

    #[test]
    fn test_response_text_joins_parts() {
        let body: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":" Buy "},{"text":"armor. "}]}}]}"#,
        )
        .unwrap();
        assert_eq!(body.text(), "Buy armor.");
    }

    #[test]
    fn test_blocked_response_is_empty() {
        let body: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
        assert_eq!(body.text(), "");
        let body: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(body.text(), "");
    }

    #[test]
    fn test_endpoint() {
        let mut config: LlmConfig = serde_json::from_str("{}").unwrap();
        config.provider = crate::config::LlmProvider::Gemini;
        let generator = GeminiGenerator::new(&config, "k").unwrap();
        assert_eq!(
            generator.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }
}
