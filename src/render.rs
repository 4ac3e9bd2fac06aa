//! Headless-rendering service client for render-ingest.

use reqwest::{Client, StatusCode, Url};
use serde_json::json;
use thiserror::Error;

/// Errors returned while rendering a remote page.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The target URL could not be parsed.
    #[error("Invalid render URL: {0}")]
    InvalidUrl(String),
    /// The target host is not in the configured allow-list.
    #[error("Host not allowed for rendering: {0}")]
    HostNotAllowed(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Rendering service responded with an unexpected status code.
    #[error("Unexpected render response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from the rendering service.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Client for the external headless-rendering endpoint.
pub struct RenderClient {
    client: Client,
    endpoint: String,
    allowed_hosts: Option<Vec<String>>,
}

impl RenderClient {
    /// Construct a client with an optional hostname allow-list.
    pub fn new(
        endpoint: String,
        allowed_hosts: Option<Vec<String>>,
    ) -> Result<Self, RenderError> {
        let client = Client::builder().user_agent("ragrelay/0.1").build()?;
        Ok(Self {
            client,
            endpoint,
            allowed_hosts,
        })
    }

    /// Validate the target URL against the allow-list and return its parsed form.
    ///
    /// Validation happens before any network call so disallowed hosts never reach
    /// the rendering service.
    pub fn validate_url(&self, url: &str) -> Result<Url, RenderError> {
        let parsed = Url::parse(url).map_err(|err| RenderError::InvalidUrl(err.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| RenderError::InvalidUrl("missing host".to_string()))?
            .to_lowercase();

        if let Some(allowed) = &self.allowed_hosts
            && !allowed.contains(&host)
        {
            return Err(RenderError::HostNotAllowed(host));
        }

        Ok(parsed)
    }

    /// Render the page at `url` and return its HTML.
    pub async fn render(&self, url: &Url) -> Result<String, RenderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "url": url.as_str() }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = RenderError::UnexpectedStatus { status, body };
            tracing::error!(url = %url, error = %error, "Render request failed");
            return Err(error);
        }

        let html = response.text().await?;
        tracing::info!(url = %url, bytes = html.len(), "Page rendered");
        Ok(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    #[test]
    fn allow_list_rejects_unlisted_hosts_before_any_call() {
        let client = RenderClient::new(
            "http://render.invalid".into(),
            Some(vec!["docs.example.com".into()]),
        )
        .expect("client");

        assert!(client.validate_url("https://docs.example.com/guide").is_ok());
        // Host comparison is case-insensitive.
        assert!(client.validate_url("https://DOCS.example.COM/guide").is_ok());
        let error = client
            .validate_url("https://evil.example/guide")
            .expect_err("unlisted host");
        assert!(matches!(error, RenderError::HostNotAllowed(_)));
    }

    #[test]
    fn any_host_is_allowed_without_a_list() {
        let client = RenderClient::new("http://render.invalid".into(), None).expect("client");
        assert!(client.validate_url("https://anything.example/page").is_ok());
        assert!(client.validate_url("not a url").is_err());
    }

    #[tokio::test]
    async fn render_posts_url_and_returns_html() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/render")
                    .json_body(serde_json::json!({ "url": "https://docs.example.com/guide" }));
                then.status(200).body("<html><body>guide</body></html>");
            })
            .await;

        let client = RenderClient::new(format!("{}/render", server.base_url()), None)
            .expect("client");
        let url = client
            .validate_url("https://docs.example.com/guide")
            .expect("url");
        let html = client.render(&url).await.expect("render");

        mock.assert();
        assert_eq!(html, "<html><body>guide</body></html>");
    }
}
