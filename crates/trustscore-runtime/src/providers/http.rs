//! HTTP plumbing shared by the built-in providers.
//!
//! Both APIs take a JSON body and report failures as
//! `{"error": {"message": ...}}`, so sending, status mapping and error
//! extraction live here once.

use reqwest::header::HeaderMap;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::time::Duration;

use super::{ProviderError, ProviderKind};
use super::secrets::ApiCredential;

/// POST `body` and decode a successful reply as `R`.
pub(crate) async fn post_json<B, R>(
    request: RequestBuilder,
    body: &B,
    timeout: Duration,
) -> Result<R, ProviderError>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let response = request
        .timeout(timeout)
        .json(body)
        .send()
        .await
        .map_err(|e| transport_error(e, timeout))?;

    let status = response.status();
    let retry_after = retry_after(response.headers());
    let text = response
        .text()
        .await
        .map_err(|e| transport_error(e, timeout))?;

    if !status.is_success() {
        return Err(status_error(status, retry_after, &text));
    }

    serde_json::from_str(&text).map_err(|e| ProviderError::ParseError(e.to_string()))
}

fn transport_error(err: reqwest::Error, timeout: Duration) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(timeout)
    } else {
        ProviderError::HttpError(err.to_string())
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Map a non-success status and body to a provider error.
pub(crate) fn status_error(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> ProviderError {
    match status.as_u16() {
        429 => ProviderError::RateLimited { retry_after },
        401 | 403 => ProviderError::AuthError,
        code => ProviderError::ApiError {
            status: code,
            message: error_message(body),
        },
    }
}

/// `error.message` from a JSON error body, or the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<JsonValue>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Validate the JSON config accepted by every built-in factory.
///
/// Requires a key for `kind` (in `api_key` or its environment variable) and,
/// when present, an http(s) `base_url`.
pub(crate) fn validate_endpoint_config(
    kind: ProviderKind,
    config: &JsonValue,
) -> Result<(), ProviderError> {
    if !ApiCredential::is_available(config, kind) {
        return Err(ProviderError::NotConfigured(format!(
            "{} required: set 'api_key' in config or {}",
            kind.credential_label(),
            kind.env_var()
        )));
    }

    match config["base_url"].as_str() {
        Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => Err(
            ProviderError::NotConfigured(format!("base_url must be http(s), got '{}'", url)),
        ),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, Some(Duration::from_secs(3)), ""),
            ProviderError::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(3)
        ));
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, None, ""),
            ProviderError::AuthError
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, None, ""),
            ProviderError::AuthError
        ));
    }

    #[test]
    fn test_api_error_message_extraction() {
        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        match status_error(StatusCode::SERVICE_UNAVAILABLE, None, body) {
            ProviderError::ApiError { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "Overloaded");
            }
            other => panic!("Expected ApiError, got {:?}", other),
        }

        match status_error(StatusCode::BAD_GATEWAY, None, " upstream down \n") {
            ProviderError::ApiError { message, .. } => assert_eq!(message, "upstream down"),
            other => panic!("Expected ApiError, got {:?}", other),
        }
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);

        headers.insert("retry-after", "12".parse().unwrap());
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(12)));

        // HTTP-date form is not interpreted
        headers.insert("retry-after", "Wed, 21 Oct 2015 07:28:00 GMT".parse().unwrap());
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn test_endpoint_config_validation() {
        let config = serde_json::json!({ "api_key": "k", "base_url": "ftp://example.com" });
        let err = validate_endpoint_config(ProviderKind::OpenAi, &config).unwrap_err();
        assert!(err.to_string().contains("ftp://example.com"));

        let config = serde_json::json!({ "api_key": "k", "base_url": "http://localhost:8080" });
        assert!(validate_endpoint_config(ProviderKind::Anthropic, &config).is_ok());
    }
}
