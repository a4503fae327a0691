use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },

    #[error("request timed out")]
    Timeout,

    #[error("server error (status {status})")]
    Server { status: u16 },

    #[error("authentication rejected (status {status})")]
    Auth { status: u16 },

    #[error("bad request (status {status}): {message}")]
    BadRequest { status: u16, message: String },

    #[error("empty response from {provider}")]
    EmptyResponse { provider: String },

    #[error("embedding not supported by {provider}")]
    EmbedUnsupported { provider: String },

    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// Whether the failure may succeed when the same request is sent again.
    ///
    /// Timeouts, refused or reset connections, rate limits and 5xx responses are transient.
    /// Authentication and malformed-request errors are not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            Self::RateLimited { .. } | Self::Timeout | Self::Server { .. } => true,
            _ => false,
        }
    }

    /// Map a non-success HTTP status to an error variant.
    #[must_use]
    pub fn from_status(status: reqwest::StatusCode, body: &str, retry_after: Option<Duration>) -> Self {
        let code = status.as_u16();
        match code {
            429 => Self::RateLimited { retry_after },
            401 | 403 => Self::Auth { status: code },
            408 => Self::Timeout,
            400..=499 => Self::BadRequest {
                status: code,
                message: body.chars().take(200).collect(),
            },
            500..=599 => Self::Server { status: code },
            _ => Self::Other(format!("unexpected status {code}")),
        }
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;
