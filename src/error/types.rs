//! Core error types

use reqwest::header::HeaderMap;
use thiserror::Error;

/// Library error type shared by adapters, the model cache and the orchestrator.
#[derive(Debug, Clone, Error)]
pub enum RelayError {
    /// No usable configuration, or a configuration that cannot be used.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A provider answered with a non-success HTTP status.
    #[error("API error {code}: {message}")]
    ApiError {
        code: u16,
        message: String,
        details: Option<serde_json::Value>,
    },

    /// HTTP 429 from a provider.
    #[error("Rate limit exceeded: {0}")]
    RateLimitError(String),

    /// Transport failure before any HTTP status was received.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Asynchronous task still unfinished at the poll ceiling.
    ///
    /// Per-call HTTP timeouts are transport failures and map to `HttpError`.
    #[error("Timeout: {0}")]
    TimeoutError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Error decoded from a provider-specific business code.
    #[error("{provider} error {code}: {message}")]
    ProviderError {
        provider: String,
        code: i64,
        message: String,
        retryable: bool,
    },

    /// Asynchronous task reached a terminal failure status.
    #[error("Task {task_id} ended with status {status}")]
    TaskFailed { task_id: String, status: String },

    /// Every attempted configuration failed; carries the formatted summary.
    #[error("{0}")]
    Exhausted(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Coarse error category used for presentation and retry hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Authentication,
    RateLimit,
    Client,
    Server,
    Network,
    Timeout,
    Parsing,
    Validation,
    Unsupported,
    Provider,
    Unknown,
}

impl RelayError {
    pub fn api_error(code: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn api_error_with_details(
        code: u16,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self::ApiError {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedOperation(message.into())
    }

    /// HTTP status carried by this error, if it came from an HTTP response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ApiError { code, .. } => Some(*code),
            Self::RateLimitError(_) => Some(429),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigurationError(_) => ErrorCategory::Configuration,
            Self::ApiError { code, .. } => match code {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                400..=499 => ErrorCategory::Client,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Unknown,
            },
            Self::RateLimitError(_) => ErrorCategory::RateLimit,
            Self::HttpError(_) => ErrorCategory::Network,
            Self::TimeoutError(_) => ErrorCategory::Timeout,
            Self::ParseError(_) => ErrorCategory::Parsing,
            Self::InvalidParameter(_) => ErrorCategory::Validation,
            Self::UnsupportedOperation(_) => ErrorCategory::Unsupported,
            Self::ProviderError { .. } | Self::TaskFailed { .. } => ErrorCategory::Provider,
            Self::Exhausted(_) | Self::InternalError(_) => ErrorCategory::Unknown,
        }
    }

    /// Provider-level retry hint.
    ///
    /// This reflects the provider's own retryability table and coarse error
    /// categories. The per-configuration backoff loop does not consult it;
    /// see [`crate::retry::should_retry`].
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ProviderError { retryable, .. } => *retryable,
            Self::TaskFailed { .. }
            | Self::UnsupportedOperation(_)
            | Self::ConfigurationError(_)
            | Self::InvalidParameter(_) => false,
            other => matches!(
                other.category(),
                ErrorCategory::RateLimit
                    | ErrorCategory::Server
                    | ErrorCategory::Network
                    | ErrorCategory::Timeout
            ),
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::HttpError(format!("request timed out: {err}"))
        } else if let Some(status) = err.status() {
            Self::api_error(status.as_u16(), err.to_string())
        } else if err.is_decode() {
            Self::ParseError(err.to_string())
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

/// Classify a non-success HTTP response into a `RelayError`.
///
/// The OpenAI error envelope (`{"error": {"message": ...}}`) is unwrapped when
/// present; otherwise a short body sample is used as the message.
pub fn classify_http_error(
    provider_id: &str,
    status: u16,
    body_text: &str,
    headers: &HeaderMap,
) -> RelayError {
    let parsed = serde_json::from_str::<serde_json::Value>(body_text).ok();
    let envelope_message = parsed.as_ref().and_then(|json| {
        json.pointer("/error/message")
            .or_else(|| json.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
    });
    let body_sample: String = body_text.chars().take(200).collect();
    let message = envelope_message.unwrap_or_else(|| {
        if body_sample.trim().is_empty() {
            "empty response body".to_string()
        } else {
            body_sample.clone()
        }
    });

    if status == 429 {
        let retry_after = headers
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        return RelayError::RateLimitError(format!(
            "provider={provider_id} retry_after={retry_after} {message}"
        ));
    }

    let details = match parsed {
        Some(json) => serde_json::json!({ "provider": provider_id, "response": json }),
        None => serde_json::json!({ "provider": provider_id, "raw": body_sample }),
    };
    RelayError::api_error_with_details(status, message, details)
}
