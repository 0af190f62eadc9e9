use thiserror::Error;

/// Errors returned by the `ShipStation` API client.
#[derive(Debug, Error)]
pub enum ShipstationError {
    /// Network or TLS failure from the underlying HTTP client, or a non-2xx
    /// status other than 429.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP 429 — the API asked us to back off.
    #[error("rate limited by ShipStation (Retry-After: {retry_after_secs:?})")]
    RateLimited { retry_after_secs: Option<u64> },

    /// The configured base URL could not be parsed.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}
