//! CORS policy evaluation.
//!
//! The allow-list is a comma-separated origin list from configuration (`*` grants any
//! origin). The evaluator is a pure function from the request's `Origin` header to the
//! response header set; preflight handling lives in the router middleware (`api`).

use axum::http::{HeaderMap, HeaderValue, header};

/// Methods granted to cross-origin callers.
const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";
/// Request headers granted to cross-origin callers.
const ALLOWED_HEADERS: &str = "Content-Type, Authorization, Accept";

/// Compute the CORS response headers for a request.
///
/// The `Access-Control-Allow-Origin` value is `*` when the allow-list contains `*`,
/// the echoed origin when it is listed, and the literal `null` when the origin is
/// absent or not listed.
pub fn cors_headers(origin: Option<&str>, allowed_origins: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let allow_origin = resolve_origin(origin, allowed_origins);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_str(&allow_origin).unwrap_or(HeaderValue::from_static("null")),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    headers
}

fn resolve_origin(origin: Option<&str>, allowed_origins: &str) -> String {
    let allowed: Vec<&str> = allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect();

    if allowed.contains(&"*") {
        return "*".to_string();
    }

    match origin {
        Some(origin) if allowed.contains(&origin) => origin.to_string(),
        _ => "null".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allow_origin(origin: Option<&str>, list: &str) -> String {
        cors_headers(origin, list)[axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN]
            .to_str()
            .expect("header value")
            .to_string()
    }

    #[test]
    fn wildcard_list_grants_any_origin() {
        assert_eq!(allow_origin(Some("https://evil.example"), "*"), "*");
        assert_eq!(allow_origin(None, "*"), "*");
    }

    #[test]
    fn listed_origin_is_echoed() {
        let list = "https://docs.example.com, https://staging.example.com";
        assert_eq!(
            allow_origin(Some("https://docs.example.com"), list),
            "https://docs.example.com"
        );
        assert_eq!(
            allow_origin(Some("https://staging.example.com"), list),
            "https://staging.example.com"
        );
    }

    #[test]
    fn unlisted_or_absent_origin_yields_null() {
        let list = "https://docs.example.com";
        assert_eq!(allow_origin(Some("https://other.example"), list), "null");
        assert_eq!(allow_origin(None, list), "null");
    }

    #[test]
    fn method_and_header_grants_are_constant() {
        let headers = cors_headers(None, "*");
        assert_eq!(
            headers[axum::http::header::ACCESS_CONTROL_ALLOW_METHODS],
            "GET, POST, OPTIONS"
        );
        assert_eq!(
            headers[axum::http::header::ACCESS_CONTROL_ALLOW_HEADERS],
            "Content-Type, Authorization, Accept"
        );
    }
}
