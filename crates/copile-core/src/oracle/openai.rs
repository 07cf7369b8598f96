//! OpenAI-compatible chat completion client

use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ModelTier, Oracle};
use crate::config::{CopileConfig, ModelsConfig};
use crate::error::{CopileError, Result};

/// Chat-completion client for any OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct OpenAICompatibleOracle {
    api_key: Option<String>,
    base_url: String,
    models: ModelsConfig,
    headers: HashMap<String, String>,
    http_client: reqwest::Client,
}

impl OpenAICompatibleOracle {
    /// Create a client for `base_url`, mapping tiers to model names through `models`
    pub fn new(api_key: Option<String>, base_url: impl Into<String>, models: ModelsConfig) -> Self {
        Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            models,
            headers: HashMap::new(),
            http_client: reqwest::Client::new(),
        }
    }

    /// Build from configuration and the process environment.
    ///
    /// `OPENAI_BASE_URL` overrides the configured endpoint; the key is read
    /// from the variable named in the config.
    pub fn from_config(config: &CopileConfig) -> Self {
        let api_key = std::env::var(&config.oracle.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());
        if api_key.is_none() {
            tracing::warn!("{} is not set; oracle requests will be unauthenticated", config.oracle.api_key_env);
        }
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| config.oracle.base_url.clone());
        Self::new(api_key, base_url, config.models.clone())
    }

    /// Add a header sent with every request
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn request_completion(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f64,
    ) -> anyhow::Result<String> {
        let request = ChatCompletionRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            temperature: Some(temperature),
        };

        let mut builder = self
            .http_client
            .post(self.endpoint())
            .header("Content-Type", "application/json");

        if let Some(api_key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }

        for (key, value) in &self.headers {
            builder = builder.header(key, value);
        }

        let response = builder
            .json(&request)
            .send()
            .await
            .context("Failed to send chat completion request")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Chat completion API error ({}): {}", status, error_text);
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if let Some(tokens) = completion.usage.and_then(|u| u.total_tokens) {
            tracing::debug!("Chat completion used {} tokens on {}", tokens, model);
        }

        Ok(content)
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    total_tokens: Option<u32>,
}

#[async_trait]
impl Oracle for OpenAICompatibleOracle {
    async fn complete(
        &self,
        text: &str,
        instruction: &str,
        tier: ModelTier,
        temperature: f64,
    ) -> Result<String> {
        let model = &self.models.model(tier).name;
        self.request_completion(model, instruction, text, temperature)
            .await
            .map_err(|e| CopileError::Oracle(format!("{:#}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let oracle = OpenAICompatibleOracle::new(None, "http://localhost:8080/v1/", ModelsConfig::default());
        assert_eq!(oracle.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_request_serialization() {
        let request = ChatCompletionRequest {
            model: "gpt-4o".into(),
            messages: vec![ChatMessage {
                role: "system".into(),
                content: "review".into(),
            }],
            temperature: Some(0.0),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["temperature"], 0.0);
    }

    #[test]
    fn test_response_with_null_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
        assert!(parsed.usage.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_oracle_error() {
        let oracle = OpenAICompatibleOracle::new(None, "http://127.0.0.1:9", ModelsConfig::default());
        let err = oracle
            .complete("def f(): ...", "instruction", ModelTier::Fast, 0.0)
            .await
            .unwrap_err();
        assert!(matches!(err, CopileError::Oracle(_)));
    }
}
