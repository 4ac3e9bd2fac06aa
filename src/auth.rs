//! Bearer-token gate applied to ingest and sync endpoints.

use axum::http::{HeaderMap, header};

/// Check the `Authorization` header against the configured secret.
///
/// When no secret is configured the gate is a no-op: the operator has chosen to run
/// the mutating endpoints open. A missing header, wrong scheme, or mismatched token
/// all produce the same `Err(())` so callers cannot learn which check failed.
pub fn check_bearer(headers: &HeaderMap, expected: Option<&str>) -> Result<(), ()> {
    let Some(expected) = expected else {
        return Ok(());
    };

    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match provided {
        Some(token) if token == expected => Ok(()),
        _ => Err(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = value {
            headers.insert(
                header::AUTHORIZATION,
                HeaderValue::from_str(value).expect("header value"),
            );
        }
        headers
    }

    #[test]
    fn open_gate_accepts_anything() {
        assert!(check_bearer(&headers_with(None), None).is_ok());
        assert!(check_bearer(&headers_with(Some("Bearer whatever")), None).is_ok());
        assert!(check_bearer(&headers_with(Some("garbage")), None).is_ok());
    }

    #[test]
    fn matching_token_passes() {
        let headers = headers_with(Some("Bearer s3cret"));
        assert!(check_bearer(&headers, Some("s3cret")).is_ok());
    }

    #[test]
    fn missing_wrong_scheme_and_mismatch_all_fail_alike() {
        assert!(check_bearer(&headers_with(None), Some("s3cret")).is_err());
        assert!(check_bearer(&headers_with(Some("Basic s3cret")), Some("s3cret")).is_err());
        assert!(check_bearer(&headers_with(Some("Bearer wrong")), Some("s3cret")).is_err());
    }
}
