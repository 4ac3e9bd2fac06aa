use serde::Deserialize;
use std::env;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the relay.
///
/// Loaded once at process start and passed by reference into every handler; nothing
/// reads the environment after construction.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// REST base URL of the managed retrieval API.
    pub retrieval_api_url: String,
    /// Account identifier used in retrieval API paths.
    pub retrieval_account_id: String,
    /// Name of the retrieval instance (rag) queried by this relay.
    pub retrieval_instance: String,
    /// Bearer credential for the retrieval and sync endpoints.
    pub retrieval_api_token: String,
    /// External LLM provider used for the generation step, if any.
    pub llm_provider: LlmProvider,
    /// API key for the OpenAI provider.
    pub openai_api_key: Option<String>,
    /// Model identifier sent to the OpenAI provider.
    pub openai_model: String,
    /// API key for the Anthropic provider.
    pub anthropic_api_key: Option<String>,
    /// Model identifier sent to the Anthropic provider.
    pub anthropic_model: String,
    /// Default number of results requested from the retrieval backend.
    pub search_default_top_k: u32,
    /// Default relevance cutoff applied to retrieval results.
    pub search_default_score_threshold: f64,
    /// Serve search responses as an event stream unless the request says otherwise.
    pub search_stream_by_default: bool,
    /// Comma-separated CORS origin allow-list (`*` allows any origin).
    pub cors_allowed_origins: String,
    /// Bearer secret protecting ingest/sync endpoints; endpoints are open when unset.
    pub ingest_token: Option<String>,
    /// Base URL of the object store holding ingested documents.
    pub object_store_url: Option<String>,
    /// Bucket name within the object store.
    pub object_store_bucket: Option<String>,
    /// Bearer credential for the object store.
    pub object_store_token: Option<String>,
    /// Endpoint of the headless-rendering service; render-ingest is off when unset.
    pub render_endpoint: Option<String>,
    /// Hostname allow-list for render-ingest URLs; any host is allowed when unset.
    pub render_allowed_hosts: Option<Vec<String>>,
    /// Directory holding the pre-built documentation site.
    pub assets_dir: String,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported external generation providers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Generation stays on the retrieval backend (answer-generating mode).
    None,
    /// Hosted OpenAI chat completions API.
    OpenAI,
    /// Hosted Anthropic messages API.
    Anthropic,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let llm_provider = match load_env_optional("LLM_PROVIDER") {
            Some(value) => value
                .parse()
                .map_err(|()| ConfigError::InvalidValue("LLM_PROVIDER".to_string()))?,
            None => LlmProvider::None,
        };

        Ok(Self {
            retrieval_api_url: load_env_optional("RETRIEVAL_API_URL")
                .unwrap_or_else(|| "https://api.cloudflare.com/client/v4".to_string()),
            retrieval_account_id: load_env("RETRIEVAL_ACCOUNT_ID")?,
            retrieval_instance: load_env("RETRIEVAL_INSTANCE")?,
            retrieval_api_token: load_env("RETRIEVAL_API_TOKEN")?,
            llm_provider,
            openai_api_key: load_env_optional("OPENAI_API_KEY"),
            openai_model: load_env_optional("OPENAI_MODEL")
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            anthropic_api_key: load_env_optional("ANTHROPIC_API_KEY"),
            anthropic_model: load_env_optional("ANTHROPIC_MODEL")
                .unwrap_or_else(|| "claude-3-5-haiku-latest".to_string()),
            search_default_top_k: parse_env_or("SEARCH_DEFAULT_TOP_K", 6)?,
            search_default_score_threshold: parse_env_or("SEARCH_DEFAULT_SCORE_THRESHOLD", 0.30)?,
            search_stream_by_default: load_env_optional("SEARCH_STREAM_BY_DEFAULT")
                .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(false),
            cors_allowed_origins: load_env_optional("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|| "*".to_string()),
            ingest_token: load_env_optional("INGEST_TOKEN"),
            object_store_url: load_env_optional("OBJECT_STORE_URL"),
            object_store_bucket: load_env_optional("OBJECT_STORE_BUCKET"),
            object_store_token: load_env_optional("OBJECT_STORE_TOKEN"),
            render_endpoint: load_env_optional("RENDER_ENDPOINT"),
            render_allowed_hosts: load_env_optional("RENDER_ALLOWED_HOSTS").map(|value| {
                value
                    .split(',')
                    .map(|host| host.trim().to_lowercase())
                    .filter(|host| !host.is_empty())
                    .collect()
            }),
            assets_dir: load_env_optional("ASSETS_DIR").unwrap_or_else(|| "public".to_string()),
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }

    /// Whether the object store is configured well enough to accept ingestion.
    pub fn ingestion_enabled(&self) -> bool {
        self.object_store_url.is_some() && self.object_store_bucket.is_some()
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    load_env_optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            _ => Err(()),
        }
    }
}

impl LlmProvider {
    /// Short name used in status payloads and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Baseline configuration used across the crate's unit tests.
    pub(crate) fn test_config() -> Config {
        Config {
            retrieval_api_url: "http://127.0.0.1:0".into(),
            retrieval_account_id: "acct".into(),
            retrieval_instance: "docs".into(),
            retrieval_api_token: "retrieval-token".into(),
            llm_provider: LlmProvider::None,
            openai_api_key: None,
            openai_model: "gpt-4o-mini".into(),
            anthropic_api_key: None,
            anthropic_model: "claude-3-5-haiku-latest".into(),
            search_default_top_k: 6,
            search_default_score_threshold: 0.30,
            search_stream_by_default: false,
            cors_allowed_origins: "*".into(),
            ingest_token: None,
            object_store_url: None,
            object_store_bucket: None,
            object_store_token: None,
            render_endpoint: None,
            render_allowed_hosts: None,
            assets_dir: "public".into(),
            server_port: None,
        }
    }

    #[test]
    fn provider_parses_case_insensitively() {
        assert_eq!("OpenAI".parse::<LlmProvider>(), Ok(LlmProvider::OpenAI));
        assert_eq!(
            "anthropic".parse::<LlmProvider>(),
            Ok(LlmProvider::Anthropic)
        );
        assert_eq!("none".parse::<LlmProvider>(), Ok(LlmProvider::None));
        assert!("gpt".parse::<LlmProvider>().is_err());
    }

    #[test]
    fn ingestion_requires_url_and_bucket() {
        let mut config = test_config();
        assert!(!config.ingestion_enabled());
        config.object_store_url = Some("http://store".into());
        assert!(!config.ingestion_enabled());
        config.object_store_bucket = Some("docs".into());
        assert!(config.ingestion_enabled());
    }
}
