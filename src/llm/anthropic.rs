//! Anthropic messages-API generation client.

use crate::backend::ByteStream;
use crate::llm::{GenerationClient, LlmError};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::Client;
use serde_json::{Value, json};

const DEFAULT_API_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

/// Generation client speaking the messages API.
pub struct AnthropicClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicClient {
    /// Construct a client against the hosted API.
    pub fn new(api_key: String, model: String) -> Result<Self, LlmError> {
        Self::with_base_url(DEFAULT_API_URL.to_string(), api_key, model)
    }

    /// Construct a client against a custom endpoint (proxies, tests).
    pub fn with_base_url(
        base_url: String,
        api_key: String,
        model: String,
    ) -> Result<Self, LlmError> {
        let client = Client::builder().user_agent("ragrelay/0.1").build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        })
    }

    async fn post_message(
        &self,
        system: &str,
        prompt: &str,
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        let body = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "system": system,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "stream": stream,
        });

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = LlmError::UnexpectedStatus { status, body };
            tracing::error!(model = %self.model, error = %error, "Anthropic request failed");
            return Err(error);
        }

        Ok(response)
    }
}

#[async_trait]
impl GenerationClient for AnthropicClient {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn generate(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let response = self.post_message(system, prompt, false).await?;
        let payload: Value = response.json().await?;
        payload["content"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| LlmError::MalformedResponse("missing content[0].text".into()))
    }

    async fn generate_stream(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<ByteStream, LlmError> {
        let response = self.post_message(system, prompt, true).await?;
        let stream = response
            .bytes_stream()
            .map_err(|err| Box::new(err) as Box<dyn std::error::Error + Send + Sync>);
        Ok(Box::pin(stream))
    }
}
