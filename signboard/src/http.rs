//! Plumbing shared by the outbound translation and speech clients.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};

use crate::error::{Result, SignboardError};

/// The variant a client reports its failures as, e.g. `SignboardError::Translation`.
pub(crate) type ErrorKind = fn(String) -> SignboardError;

pub(crate) fn build_client(timeout_secs: u64, kind: ErrorKind) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| kind(format!("Failed to create HTTP client: {e}")))
}

/// Configured base URL, or `default`, without a trailing slash.
pub(crate) fn base_url(configured: Option<&str>, default: &str) -> String {
    configured
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

pub(crate) fn map_send_error(kind: ErrorKind, e: reqwest::Error) -> SignboardError {
    if e.is_timeout() {
        kind("Request timeout".to_string())
    } else {
        kind(format!("Request failed: {e}"))
    }
}

pub(crate) fn map_http_error(
    kind: ErrorKind,
    service: &str,
    status: StatusCode,
    error_body: &str,
) -> SignboardError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => kind(format!(
            "{service} rejected the request ({status}): {error_body}"
        )),
        StatusCode::TOO_MANY_REQUESTS => kind(format!(
            "{service} rate limit exceeded (429): {error_body}"
        )),
        _ => kind(format!("{service} error ({status}): {error_body}")),
    }
}

pub(crate) async fn error_body(response: Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error response".to_string())
}
