//! External LLM generation providers.
//!
//! When an external provider is configured, retrieval stays on the managed backend and
//! only the generation step moves here. Providers implement [`GenerationClient`] and are
//! selected once at startup by [`build_generation_client`].

mod anthropic;
mod openai;

pub use anthropic::AnthropicClient;
pub use openai::OpenAiClient;

use crate::backend::ByteStream;
use crate::config::{Config, LlmProvider};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use thiserror::Error;

/// Fixed instruction constraining generation to the retrieved context.
pub const SYSTEM_INSTRUCTION: &str = "You are a documentation assistant. Answer using only \
the provided context. If the context does not contain the answer, say that the \
documentation does not cover the question. Do not invent information.";

/// Errors returned while talking to a generation provider.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Provider selected but its API key is missing.
    #[error("Missing API key for LLM provider {0}")]
    MissingCredentials(&'static str),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider responded with an unexpected status code.
    #[error("Unexpected LLM response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from the provider.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Provider response parsed but did not contain generated text.
    #[error("Malformed LLM response: {0}")]
    MalformedResponse(String),
}

/// One-shot text generation against an external provider.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Provider name used in status payloads and logs.
    fn name(&self) -> &'static str;

    /// Generate a complete answer for the prompt under the system instruction.
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, LlmError>;

    /// Generate a streamed answer, returning the provider's event stream verbatim.
    async fn generate_stream(&self, system: &str, prompt: &str)
    -> Result<ByteStream, LlmError>;
}

/// Build the generation client selected by configuration, if any.
pub fn build_generation_client(
    config: &Config,
) -> Result<Option<Arc<dyn GenerationClient>>, LlmError> {
    match config.llm_provider {
        LlmProvider::None => Ok(None),
        LlmProvider::OpenAI => {
            let key = config
                .openai_api_key
                .clone()
                .ok_or(LlmError::MissingCredentials("openai"))?;
            Ok(Some(Arc::new(OpenAiClient::new(
                key,
                config.openai_model.clone(),
            )?)))
        }
        LlmProvider::Anthropic => {
            let key = config
                .anthropic_api_key
                .clone()
                .ok_or(LlmError::MissingCredentials("anthropic"))?;
            Ok(Some(Arc::new(AnthropicClient::new(
                key,
                config.anthropic_model.clone(),
            )?)))
        }
    }
}
