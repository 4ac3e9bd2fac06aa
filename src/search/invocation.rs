//! Request normalization into a canonical search invocation.
//!
//! Search arrives three ways: a GET query string, a POST JSON body, or implicitly via
//! the `Accept` header for streaming. All three collapse into one [`SearchInvocation`]
//! here. Body fields win over query-string fields; scalar fields are coerced leniently
//! (numbers may arrive as strings, booleans as truthy tokens); out-of-range numerics
//! are clamped rather than rejected. Only an empty query is an error.

use crate::config::Config;
use serde::{Deserialize, Deserializer, de};
use std::fmt;
use thiserror::Error;

/// Hard bounds on the requested result count.
const TOP_K_RANGE: (i64, i64) = (1, 50);
/// Tokens treated as `true` for boolean-ish fields, compared case-insensitively.
const TRUTHY_TOKENS: [&str; 4] = ["1", "true", "yes", "on"];
/// Media type that switches a request into streaming mode via `Accept`.
const EVENT_STREAM: &str = "text/event-stream";

/// Canonical search invocation produced by the normalizer.
#[derive(Debug, Clone)]
pub struct SearchInvocation {
    /// Trimmed, non-empty query text.
    pub query: String,
    /// Result count, clamped into `[1, 50]`.
    pub top_k: u32,
    /// Relevance cutoff, clamped into `[0, 1]`.
    pub score_threshold: f64,
    /// Ask the backend to rewrite the query before retrieval.
    pub rewrite_query: bool,
    /// Respond with an event stream instead of a materialized document.
    pub wants_stream: bool,
}

/// The query was empty or whitespace-only after trimming.
#[derive(Debug, Error)]
#[error("`query` must not be empty")]
pub struct EmptyQuery;

/// Raw search parameters as they appear in a query string or JSON body.
///
/// Every field is optional; coercion failures leave the field unset so defaults apply.
#[derive(Debug, Default, Deserialize)]
pub struct AskParams {
    /// Query text.
    #[serde(default)]
    pub query: Option<String>,
    /// Requested result count.
    #[serde(default, alias = "topK", deserialize_with = "lenient_int")]
    pub top_k: Option<i64>,
    /// Requested relevance cutoff.
    #[serde(default, alias = "scoreThreshold", deserialize_with = "lenient_float")]
    pub score_threshold: Option<f64>,
    /// Whether the backend should rewrite the query.
    #[serde(default, alias = "rewriteQuery", deserialize_with = "lenient_bool")]
    pub rewrite_query: Option<bool>,
    /// Explicit streaming request.
    #[serde(default, deserialize_with = "lenient_bool")]
    pub stream: Option<bool>,
}

impl AskParams {
    /// Overlay `self` (higher precedence) on top of `fallback`.
    fn merged_over(self, fallback: AskParams) -> AskParams {
        AskParams {
            query: self.query.or(fallback.query),
            top_k: self.top_k.or(fallback.top_k),
            score_threshold: self.score_threshold.or(fallback.score_threshold),
            rewrite_query: self.rewrite_query.or(fallback.rewrite_query),
            stream: self.stream.or(fallback.stream),
        }
    }
}

/// Collapse query-string and optional body parameters into one invocation.
///
/// `body` is present for POST requests with a JSON payload and takes precedence
/// field-by-field. Streaming is requested by the `stream` field, an `Accept` header
/// containing `text/event-stream`, or the configured default.
pub fn normalize(
    query_params: AskParams,
    body: Option<AskParams>,
    accept: Option<&str>,
    config: &Config,
) -> Result<SearchInvocation, EmptyQuery> {
    let params = match body {
        Some(body) => body.merged_over(query_params),
        None => query_params,
    };

    let query = params
        .query
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    if query.is_empty() {
        return Err(EmptyQuery);
    }

    let top_k = params
        .top_k
        .unwrap_or(i64::from(config.search_default_top_k))
        .clamp(TOP_K_RANGE.0, TOP_K_RANGE.1) as u32;
    let score_threshold = params
        .score_threshold
        .unwrap_or(config.search_default_score_threshold)
        .clamp(0.0, 1.0);

    let accept_stream = accept
        .map(|value| value.contains(EVENT_STREAM))
        .unwrap_or(false);
    let wants_stream =
        params.stream.unwrap_or(false) || accept_stream || config.search_stream_by_default;

    Ok(SearchInvocation {
        query,
        top_k,
        score_threshold,
        rewrite_query: params.rewrite_query.unwrap_or(true),
        wants_stream,
    })
}

/// Whether a textual token counts as `true`.
fn is_truthy(token: &str) -> bool {
    TRUTHY_TOKENS
        .iter()
        .any(|candidate| token.eq_ignore_ascii_case(candidate))
}

fn lenient_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    struct IntVisitor;

    impl<'de> de::Visitor<'de> for IntVisitor {
        type Value = Option<i64>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("an integer, a numeric string, or nothing")
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(i64::try_from(value).ok())
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value as i64))
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value
                .trim()
                .parse::<i64>()
                .ok()
                .or_else(|| value.trim().parse::<f64>().ok().map(|parsed| parsed as i64)))
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(IntVisitor)
}

fn lenient_float<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    struct FloatVisitor;

    impl<'de> de::Visitor<'de> for FloatVisitor {
        type Value = Option<f64>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a number, a numeric string, or nothing")
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value as f64))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value as f64))
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value))
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.trim().parse::<f64>().ok())
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(FloatVisitor)
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    struct BoolVisitor;

    impl<'de> de::Visitor<'de> for BoolVisitor {
        type Value = Option<bool>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a boolean, a truthy token, or nothing")
        }

        fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value != 0))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value != 0))
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(is_truthy(value.trim())))
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(BoolVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;

    fn from_query(query: &str) -> AskParams {
        serde_urlencoded::from_str(query).expect("query params parse")
    }

    fn from_json(body: &str) -> AskParams {
        serde_json::from_str(body).expect("json params parse")
    }

    #[test]
    fn defaults_apply_when_only_query_is_given() {
        let config = test_config();
        let invocation = normalize(from_query("query=how+to+deploy"), None, None, &config)
            .expect("invocation");

        assert_eq!(invocation.query, "how to deploy");
        assert_eq!(invocation.top_k, 6);
        assert!((invocation.score_threshold - 0.30).abs() < 1e-9);
        assert!(invocation.rewrite_query);
        assert!(!invocation.wants_stream);
    }

    #[test]
    fn top_k_is_clamped_not_rejected() {
        let config = test_config();
        let low = normalize(from_query("query=q&top_k=0"), None, None, &config).expect("low");
        assert_eq!(low.top_k, 1);

        let high = normalize(from_query("query=q&top_k=999"), None, None, &config).expect("high");
        assert_eq!(high.top_k, 50);

        let negative =
            normalize(from_json(r#"{"query":"q","top_k":-3}"#), None, None, &config)
                .expect("negative");
        assert_eq!(negative.top_k, 1);
    }

    #[test]
    fn score_threshold_is_clamped() {
        let config = test_config();
        let low = normalize(
            from_json(r#"{"query":"q","score_threshold":-0.5}"#),
            None,
            None,
            &config,
        )
        .expect("low");
        assert_eq!(low.score_threshold, 0.0);

        let high = normalize(
            from_query("query=q&score_threshold=2.0"),
            None,
            None,
            &config,
        )
        .expect("high");
        assert_eq!(high.score_threshold, 1.0);
    }

    #[test]
    fn empty_or_whitespace_query_is_rejected() {
        let config = test_config();
        assert!(normalize(from_query("query=++"), None, None, &config).is_err());
        assert!(normalize(AskParams::default(), None, None, &config).is_err());
    }

    #[test]
    fn body_fields_win_over_query_string() {
        let config = test_config();
        let invocation = normalize(
            from_query("query=from-query&top_k=3"),
            Some(from_json(r#"{"query":"from-body"}"#)),
            None,
            &config,
        )
        .expect("invocation");

        assert_eq!(invocation.query, "from-body");
        // Absent body field falls back to the query string.
        assert_eq!(invocation.top_k, 3);
    }

    #[test]
    fn stream_detection_covers_field_header_and_default() {
        let mut config = test_config();

        let field = normalize(from_query("query=q&stream=YES"), None, None, &config)
            .expect("field");
        assert!(field.wants_stream);

        let header = normalize(
            from_query("query=q"),
            None,
            Some("text/event-stream, application/json"),
            &config,
        )
        .expect("header");
        assert!(header.wants_stream);

        config.search_stream_by_default = true;
        let default = normalize(from_query("query=q"), None, None, &config).expect("default");
        assert!(default.wants_stream);
    }

    #[test]
    fn falsy_tokens_and_unknown_tokens_do_not_stream() {
        let config = test_config();
        for token in ["0", "false", "off", "maybe"] {
            let invocation =
                normalize(from_query(&format!("query=q&stream={token}")), None, None, &config)
                    .expect("invocation");
            assert!(!invocation.wants_stream, "token {token} should be falsy");
        }
    }

    #[test]
    fn numeric_strings_and_camel_case_aliases_parse() {
        let config = test_config();
        let invocation = normalize(
            from_json(r#"{"query":"q","topK":"12","scoreThreshold":"0.7","rewriteQuery":"no"}"#),
            None,
            None,
            &config,
        )
        .expect("invocation");

        assert_eq!(invocation.top_k, 12);
        assert!((invocation.score_threshold - 0.7).abs() < 1e-9);
        assert!(!invocation.rewrite_query);
    }

    #[test]
    fn unparseable_numerics_fall_back_to_defaults() {
        let config = test_config();
        let invocation = normalize(
            from_query("query=q&top_k=abc&score_threshold=high"),
            None,
            None,
            &config,
        )
        .expect("invocation");

        assert_eq!(invocation.top_k, 6);
        assert!((invocation.score_threshold - 0.30).abs() < 1e-9);
    }
}
