//! Re-index trigger for the retrieval backend.
//!
//! Sync is best-effort by contract: the trigger never fails the enclosing request.
//! The upstream endpoint enforces its own cooldown window and answers 429 (or 409
//! mid-run) while it is active; both are absorbed into [`SyncOutcome::Skipped`].

use crate::config::Config;
use reqwest::{Client, StatusCode};
use serde::Serialize;

/// Outcome of a re-index attempt, serialized as `{status, detail}`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum SyncOutcome {
    /// Upstream accepted the trigger; carries the response body.
    Triggered(String),
    /// Upstream declined without error (cooldown or already running).
    Skipped(String),
    /// The trigger could not be delivered or was rejected.
    Failed(String),
}

/// Client for the fixed re-index endpoint.
pub struct SyncTrigger {
    client: Client,
    endpoint: String,
    api_token: String,
}

impl SyncTrigger {
    /// Build the trigger from configured account/instance identifiers.
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder().user_agent("ragrelay/0.1").build()?;
        let endpoint = format!(
            "{}/accounts/{}/autorag/rags/{}/sync",
            config.retrieval_api_url.trim_end_matches('/'),
            config.retrieval_account_id,
            config.retrieval_instance
        );
        Ok(Self {
            client,
            endpoint,
            api_token: config.retrieval_api_token.clone(),
        })
    }

    /// Request a re-index. Never raises; every path maps to a [`SyncOutcome`].
    pub async fn trigger(&self) -> SyncOutcome {
        let response = match self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_token)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "Sync trigger could not reach upstream");
                return SyncOutcome::Failed(err.to_string());
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::CONFLICT {
            tracing::debug!(status = %status, "Sync skipped by upstream cooldown");
            return SyncOutcome::Skipped("cooldown".to_string());
        }
        if !status.is_success() {
            tracing::warn!(status = %status, "Sync trigger rejected");
            return SyncOutcome::Failed(body);
        }

        tracing::info!("Re-index triggered");
        SyncOutcome::Triggered(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;
    use httpmock::{Method::POST, MockServer};

    fn trigger_for(server: &MockServer) -> SyncTrigger {
        let mut config = test_config();
        config.retrieval_api_url = server.base_url();
        SyncTrigger::new(&config).expect("trigger")
    }

    #[tokio::test]
    async fn success_returns_triggered_with_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/accounts/acct/autorag/rags/docs/sync")
                    .header("authorization", "Bearer retrieval-token");
                then.status(200).body(r#"{"result":{"job_id":"j-1"}}"#);
            })
            .await;

        let outcome = trigger_for(&server).trigger().await;
        mock.assert();
        assert_eq!(
            outcome,
            SyncOutcome::Triggered(r#"{"result":{"job_id":"j-1"}}"#.to_string())
        );
    }

    #[tokio::test]
    async fn cooldown_and_conflict_are_skipped_not_failed() {
        for status in [429u16, 409] {
            let server = MockServer::start_async().await;
            server
                .mock_async(|when, then| {
                    when.method(POST)
                        .path("/accounts/acct/autorag/rags/docs/sync");
                    then.status(status).body("try again later");
                })
                .await;

            let outcome = trigger_for(&server).trigger().await;
            assert_eq!(outcome, SyncOutcome::Skipped("cooldown".to_string()));
        }
    }

    #[tokio::test]
    async fn other_errors_are_failed_with_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/accounts/acct/autorag/rags/docs/sync");
                then.status(500).body("index corrupted");
            })
            .await;

        let outcome = trigger_for(&server).trigger().await;
        assert_eq!(outcome, SyncOutcome::Failed("index corrupted".to_string()));
    }

    #[tokio::test]
    async fn transport_errors_are_failed_with_message() {
        // Port 1 is never listening; the send itself errors.
        let mut config = test_config();
        config.retrieval_api_url = "http://127.0.0.1:1".to_string();
        let outcome = SyncTrigger::new(&config).expect("trigger").trigger().await;
        assert!(matches!(outcome, SyncOutcome::Failed(_)));
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let skipped = serde_json::to_value(SyncOutcome::Skipped("cooldown".into()))
            .expect("serialize");
        assert_eq!(skipped["status"], "skipped");
        assert_eq!(skipped["detail"], "cooldown");
    }
}
