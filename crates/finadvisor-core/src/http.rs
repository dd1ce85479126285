//! Response helpers shared by every HTTP client in the crate

use crate::error::TransportError;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Fail with the status and body text when the response is not 2xx.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    endpoint: &str,
) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Status {
        endpoint: endpoint.to_string(),
        status,
        body,
    })
}

/// Check the status, then decode a JSON body. Empty bodies are an error of
/// their own so callers can tell them apart from garbage.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    endpoint: &str,
) -> Result<T, TransportError> {
    let response = ensure_success(response, endpoint).await?;
    let text = response.text().await?;
    debug!("{} responded with {} bytes", endpoint, text.len());
    if text.trim().is_empty() {
        return Err(TransportError::EmptyResponse(endpoint.to_string()));
    }
    serde_json::from_str(&text).map_err(|e| TransportError::invalid(endpoint, e))
}

/// Join a base URL and a path without doubling the slash.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
