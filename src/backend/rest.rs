//! REST fallback client for the managed retrieval API.

use crate::backend::{BackendError, ByteStream, RetrievalBackend, RetrievalResult};
use crate::config::Config;
use crate::search::SearchInvocation;
use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lightweight HTTP client targeting `.../rags/{name}/{search|ai-search}`.
pub struct RestRetrieval {
    client: Client,
    base_url: String,
    account_id: String,
    instance: String,
    api_token: String,
}

#[derive(Serialize)]
struct QueryBody<'a> {
    query: &'a str,
    rewrite_query: bool,
    max_num_results: u32,
    ranking_options: RankingOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Serialize)]
struct RankingOptions {
    score_threshold: f64,
}

#[derive(Deserialize)]
struct ApiEnvelope<T> {
    result: T,
}

impl RestRetrieval {
    /// Construct a client from the relay configuration.
    pub fn new(config: &Config) -> Result<Self, BackendError> {
        let client = Client::builder().user_agent("ragrelay/0.1").build()?;
        let base_url = normalize_base_url(&config.retrieval_api_url)
            .map_err(BackendError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            instance = %config.retrieval_instance,
            "Initialized retrieval REST client"
        );

        Ok(Self {
            client,
            base_url,
            account_id: config.retrieval_account_id.clone(),
            instance: config.retrieval_instance.clone(),
            api_token: config.retrieval_api_token.clone(),
        })
    }

    /// Fetch the retrieval instance description, used by the status endpoint.
    pub async fn instance_detail(&self) -> Result<Value, BackendError> {
        let response = self.request(Method::GET, "").send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::UnexpectedStatus { status, body });
        }
        let envelope: ApiEnvelope<Value> = response.json().await?;
        Ok(envelope.result)
    }

    fn request(&self, method: Method, operation: &str) -> reqwest::RequestBuilder {
        let url = format!(
            "{}/accounts/{}/autorag/rags/{}/{}",
            self.base_url, self.account_id, self.instance, operation
        );
        let url = url.trim_end_matches('/').to_string();
        self.client.request(method, url).bearer_auth(&self.api_token)
    }

    fn query_body<'a>(invocation: &'a SearchInvocation, stream: Option<bool>) -> QueryBody<'a> {
        QueryBody {
            query: &invocation.query,
            rewrite_query: invocation.rewrite_query,
            max_num_results: invocation.top_k,
            ranking_options: RankingOptions {
                score_threshold: invocation.score_threshold,
            },
            stream,
        }
    }

    async fn post_query(
        &self,
        operation: &str,
        invocation: &SearchInvocation,
        stream: Option<bool>,
    ) -> Result<reqwest::Response, BackendError> {
        let response = self
            .request(Method::POST, operation)
            .json(&Self::query_body(invocation, stream))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = BackendError::UnexpectedStatus { status, body };
            tracing::error!(operation, error = %error, "Retrieval request failed");
            return Err(error);
        }

        Ok(response)
    }
}

#[async_trait]
impl RetrievalBackend for RestRetrieval {
    async fn search(&self, invocation: &SearchInvocation) -> Result<RetrievalResult, BackendError> {
        let response = self.post_query("search", invocation, None).await?;
        let envelope: ApiEnvelope<RetrievalResult> = response.json().await?;
        tracing::debug!(
            documents = envelope.result.data.len(),
            "Retrieval-only query completed"
        );
        Ok(envelope.result)
    }

    async fn ai_search(&self, invocation: &SearchInvocation) -> Result<Value, BackendError> {
        let response = self.post_query("ai-search", invocation, None).await?;
        let envelope: ApiEnvelope<Value> = response.json().await?;
        Ok(envelope.result)
    }

    async fn ai_search_stream(
        &self,
        invocation: &SearchInvocation,
    ) -> Result<ByteStream, BackendError> {
        let response = self
            .post_query("ai-search", invocation, Some(true))
            .await?;
        let stream = response
            .bytes_stream()
            .map_err(|err| Box::new(err) as Box<dyn std::error::Error + Send + Sync>);
        Ok(Box::pin(stream))
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    Ok(parsed.to_string().trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    fn client_for(server: &MockServer) -> RestRetrieval {
        let mut config = test_config();
        config.retrieval_api_url = server.base_url();
        RestRetrieval::new(&config).expect("client")
    }

    #[tokio::test]
    async fn search_emits_expected_request() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/accounts/acct/autorag/rags/docs/search")
                    .header("authorization", "Bearer retrieval-token")
                    .json_body(json!({
                        "query": "How to build a plugin?",
                        "rewrite_query": true,
                        "max_num_results": 6,
                        "ranking_options": { "score_threshold": 0.30 }
                    }));
                then.status(200).json_body(json!({
                    "result": {
                        "data": [
                            {
                                "filename": "plugins.md",
                                "score": 0.82,
                                "content": [{ "text": "Plugins are registered via…" }]
                            }
                        ]
                    }
                }));
            })
            .await;

        let invocation = SearchInvocation {
            query: "How to build a plugin?".into(),
            top_k: 6,
            score_threshold: 0.30,
            rewrite_query: true,
            wants_stream: false,
        };
        let result = client_for(&server)
            .search(&invocation)
            .await
            .expect("search request");

        mock.assert();
        assert_eq!(result.data.len(), 1);
        assert_eq!(result.data[0].filename, "plugins.md");
        assert!((result.data[0].score - 0.82).abs() < 1e-9);
        assert_eq!(result.data[0].content[0].text, "Plugins are registered via…");
    }

    #[tokio::test]
    async fn ai_search_preserves_result_verbatim() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/accounts/acct/autorag/rags/docs/ai-search");
                then.status(200).json_body(json!({
                    "result": {
                        "response": "Use the plugin API.",
                        "data": [],
                        "search_query": "plugin api"
                    }
                }));
            })
            .await;

        let invocation = SearchInvocation {
            query: "plugins".into(),
            top_k: 6,
            score_threshold: 0.30,
            rewrite_query: true,
            wants_stream: false,
        };
        let value = client_for(&server)
            .ai_search(&invocation)
            .await
            .expect("ai-search request");

        // Unknown upstream fields survive the round trip untouched.
        assert_eq!(value["response"], "Use the plugin API.");
        assert_eq!(value["search_query"], "plugin api");
    }

    #[tokio::test]
    async fn non_2xx_surfaces_status_and_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/accounts/acct/autorag/rags/docs/search");
                then.status(503).body("instance warming up");
            })
            .await;

        let invocation = SearchInvocation {
            query: "anything".into(),
            top_k: 6,
            score_threshold: 0.30,
            rewrite_query: true,
            wants_stream: false,
        };
        let error = client_for(&server)
            .search(&invocation)
            .await
            .expect_err("should fail");

        match error {
            BackendError::UnexpectedStatus { status, body } => {
                assert_eq!(status.as_u16(), 503);
                assert_eq!(body, "instance warming up");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
