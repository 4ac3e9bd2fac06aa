//! Backend selection and search dispatch.
//!
//! The dispatcher owns the long-lived backend handles and is shared by the plain
//! search endpoint and the tool-protocol adapter. Backend choice follows a fixed
//! table: an injected direct binding beats the REST fallback; a configured external
//! LLM moves the generation step off the retrieval backend, which is then queried in
//! retrieval-only mode.

use crate::backend::{
    AiSearchResult, BackendError, ByteStream, RetrievalBackend, SourceDocument,
};
use crate::llm::{GenerationClient, LlmError, SYSTEM_INSTRUCTION};
use crate::search::SearchInvocation;
use bytes::Bytes;
use serde_json::{Value, json};
use std::sync::Arc;
use thiserror::Error;

/// Fixed answer returned when retrieval finds nothing, without calling the LLM.
pub const NO_RESULTS_ANSWER: &str = "No relevant information found in the documentation.";

/// Errors surfaced by a dispatch attempt.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Retrieval backend call failed.
    #[error("Retrieval backend error: {0}")]
    Backend(#[from] BackendError),
    /// External generation call failed.
    #[error("Generation provider error: {0}")]
    Generation(#[from] LlmError),
    /// Backend returned a result the relay could not decode.
    #[error("Undecodable backend result: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result of a dispatch: a materialized JSON document or an open event stream.
pub enum DispatchOutcome {
    /// Fully materialized result, `{response, data}` shaped.
    Json(Value),
    /// Event-stream bytes forwarded from upstream without buffering.
    Stream(ByteStream),
}

/// Executes canonical invocations against the selected backend path.
pub struct SearchDispatcher {
    binding: Option<Arc<dyn RetrievalBackend>>,
    rest: Arc<dyn RetrievalBackend>,
    generation: Option<Arc<dyn GenerationClient>>,
}

impl SearchDispatcher {
    /// Build a dispatcher over the REST fallback and an optional generation client.
    pub fn new(
        rest: Arc<dyn RetrievalBackend>,
        generation: Option<Arc<dyn GenerationClient>>,
    ) -> Self {
        Self {
            binding: None,
            rest,
            generation,
        }
    }

    /// Clone this dispatcher with a direct binding installed.
    ///
    /// The binding takes precedence over REST for every retrieval call; embedders
    /// inject their in-process client here.
    pub fn rebind(&self, binding: Arc<dyn RetrievalBackend>) -> Self {
        Self {
            binding: Some(binding),
            rest: self.rest.clone(),
            generation: self.generation.clone(),
        }
    }

    /// Whether a direct binding is installed.
    pub fn binding_available(&self) -> bool {
        self.binding.is_some()
    }

    /// Name of the active generation provider, if any.
    pub fn generation_provider(&self) -> Option<&'static str> {
        self.generation.as_ref().map(|client| client.name())
    }

    fn backend(&self) -> &Arc<dyn RetrievalBackend> {
        self.binding.as_ref().unwrap_or(&self.rest)
    }

    /// Execute one invocation, honoring its streaming preference.
    pub async fn dispatch(
        &self,
        invocation: &SearchInvocation,
    ) -> Result<DispatchOutcome, DispatchError> {
        match &self.generation {
            None => self.dispatch_answer_mode(invocation).await,
            Some(generation) => self.dispatch_llm_mode(invocation, generation).await,
        }
    }

    /// Buffered answer regardless of the invocation's streaming preference.
    ///
    /// Used by the tool-protocol adapter, which always returns a materialized result.
    pub async fn answer(
        &self,
        invocation: &SearchInvocation,
    ) -> Result<AiSearchResult, DispatchError> {
        let mut buffered = invocation.clone();
        buffered.wants_stream = false;
        match self.dispatch(&buffered).await? {
            DispatchOutcome::Json(value) => Ok(AiSearchResult::from_value(value)?),
            // Unreachable with wants_stream forced off; kept total for safety.
            DispatchOutcome::Stream(_) => Ok(AiSearchResult {
                response: String::new(),
                data: Vec::new(),
            }),
        }
    }

    /// Answer-generating mode: one backend call, result forwarded verbatim.
    async fn dispatch_answer_mode(
        &self,
        invocation: &SearchInvocation,
    ) -> Result<DispatchOutcome, DispatchError> {
        let backend = self.backend();
        if invocation.wants_stream {
            let stream = backend.ai_search_stream(invocation).await?;
            return Ok(DispatchOutcome::Stream(stream));
        }
        let result = backend.ai_search(invocation).await?;
        Ok(DispatchOutcome::Json(result))
    }

    /// Retrieval-only call followed by one external generation call.
    async fn dispatch_llm_mode(
        &self,
        invocation: &SearchInvocation,
        generation: &Arc<dyn GenerationClient>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let retrieval = self.backend().search(invocation).await?;
        if retrieval.data.is_empty() {
            tracing::debug!("Retrieval returned no documents; skipping generation");
            return Ok(no_results_outcome(invocation.wants_stream));
        }

        let context = build_context_block(&retrieval.data);
        let prompt = format!("Context:\n{context}\nQuestion: {}", invocation.query);

        if invocation.wants_stream {
            let stream = generation
                .generate_stream(SYSTEM_INSTRUCTION, &prompt)
                .await?;
            return Ok(DispatchOutcome::Stream(stream));
        }

        let response = generation.generate(SYSTEM_INSTRUCTION, &prompt).await?;
        tracing::info!(
            provider = generation.name(),
            documents = retrieval.data.len(),
            "Generation completed"
        );
        Ok(DispatchOutcome::Json(json!({
            "response": response,
            "data": retrieval.data,
        })))
    }
}

/// Concatenate retrieved fragments into one context block, tagged per source file.
fn build_context_block(documents: &[SourceDocument]) -> String {
    let mut block = String::new();
    for document in documents {
        block.push_str(&format!("[source: {}]\n", document.filename));
        for fragment in &document.content {
            block.push_str(&fragment.text);
            block.push('\n');
        }
        block.push('\n');
    }
    block
}

fn no_results_outcome(wants_stream: bool) -> DispatchOutcome {
    let payload = json!({ "response": NO_RESULTS_ANSWER, "data": [] });
    if !wants_stream {
        return DispatchOutcome::Json(payload);
    }

    // A one-event stream keeps the response shape consistent with real streams.
    let stream = async_stream::stream! {
        let event = format!("data: {payload}\n\n");
        yield Ok::<_, Box<dyn std::error::Error + Send + Sync>>(Bytes::from(event));
    };
    DispatchOutcome::Stream(Box::pin(stream))
}
