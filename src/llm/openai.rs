//! OpenAI chat-completions generation client.

use crate::backend::ByteStream;
use crate::llm::{GenerationClient, LlmError};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::Client;
use serde_json::{Value, json};

const DEFAULT_API_URL: &str = "https://api.openai.com/v1";

/// Generation client speaking the chat-completions API.
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
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

    async fn post_completion(
        &self,
        system: &str,
        prompt: &str,
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt }
            ],
            "stream": stream,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = LlmError::UnexpectedStatus { status, body };
            tracing::error!(model = %self.model, error = %error, "OpenAI request failed");
            return Err(error);
        }

        Ok(response)
    }
}

#[async_trait]
impl GenerationClient for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn generate(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let response = self.post_completion(system, prompt, false).await?;
        let payload: Value = response.json().await?;
        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| LlmError::MalformedResponse("missing choices[0].message.content".into()))
    }

    async fn generate_stream(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<ByteStream, LlmError> {
        let response = self.post_completion(system, prompt, true).await?;
        let stream = response
            .bytes_stream()
            .map_err(|err| Box::new(err) as Box<dyn std::error::Error + Send + Sync>);
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    #[tokio::test]
    async fn generate_extracts_message_content() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .header("authorization", "Bearer sk-test")
                    .json_body_partial(r#"{ "model": "gpt-4o-mini", "stream": false }"#);
                then.status(200).json_body(json!({
                    "choices": [
                        { "message": { "role": "assistant", "content": "Use the plugin API." } }
                    ]
                }));
            })
            .await;

        let client = OpenAiClient::with_base_url(
            server.base_url(),
            "sk-test".into(),
            "gpt-4o-mini".into(),
        )
        .expect("client");
        let answer = client
            .generate("system text", "question")
            .await
            .expect("generation");

        mock.assert();
        assert_eq!(answer, "Use the plugin API.");
    }

    #[tokio::test]
    async fn missing_content_is_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(json!({ "choices": [] }));
            })
            .await;

        let client = OpenAiClient::with_base_url(
            server.base_url(),
            "sk-test".into(),
            "gpt-4o-mini".into(),
        )
        .expect("client");
        let error = client
            .generate("system text", "question")
            .await
            .expect_err("malformed");
        assert!(matches!(error, LlmError::MalformedResponse(_)));
    }
}
