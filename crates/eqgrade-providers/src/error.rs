//! Provider error types.

use thiserror::Error;

/// Errors that can occur when calling a model provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (missing or invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested model was not found.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The response was well-formed HTTP but unusable.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Classify a transport failure from `reqwest`.
    pub(crate) fn from_send(e: reqwest::Error, timeout_secs: u64) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout(timeout_secs)
        } else {
            ProviderError::NetworkError(e.to_string())
        }
    }
}

/// Map non-success HTTP statuses to [`ProviderError`], passing successful
/// responses through.
pub(crate) async fn check_status(
    response: reqwest::Response,
    model: &str,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status().as_u16();
    if status < 400 {
        return Ok(response);
    }

    if status == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(5)
            .saturating_mul(1000);
        return Err(ProviderError::RateLimited {
            retry_after_ms: retry_after,
        });
    }

    let body = response.text().await.unwrap_or_default();
    Err(match status {
        401 | 403 => ProviderError::AuthenticationFailed(body),
        404 => ProviderError::ModelNotFound(model.to_string()),
        _ => ProviderError::ApiError {
            status,
            message: body,
        },
    })
}

/// Wrap a JSON decoding failure of a successful response.
pub(crate) fn parse_failure(e: reqwest::Error) -> ProviderError {
    ProviderError::ApiError {
        status: 0,
        message: format!("failed to parse response: {e}"),
    }
}
