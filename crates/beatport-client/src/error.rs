//! Error types for the storefront client.

use crate::session::Stage;

/// Longest excerpt of a response body or page kept in an error message.
const SNIPPET_LEN: usize = 160;

/// Why an establishment (or an established session) was refused.
#[derive(thiserror::Error, Debug)]
pub enum LoginFailure {
    /// The storefront rejected the credentials or the resumed cookie.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The storefront could not be reached or answered with a server error.
    #[error("unavailable: {0}")]
    Unavailable(#[source] Box<Error>),
}

/// All errors that can occur while talking to the storefront.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("transport error for {uri}: {source}")]
    Transport {
        uri: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {uri} timed out")]
    Timeout { uri: String },

    #[error("{uri} answered with HTTP {status}")]
    Status { uri: String, status: u16 },

    #[error("invalid JSON from {uri} ({source}): {snippet}")]
    Json {
        uri: String,
        #[source]
        source: serde_json::Error,
        snippet: String,
    },

    #[error("login failed at stage {stage}: {cause}")]
    LoginFailed { stage: Stage, cause: LoginFailure },

    #[error("marker {marker:?} not found near: {context}")]
    MarkerNotFound { marker: String, context: String },

    #[error("malformed embedded payload ({source}): {}", snippet(.payload))]
    MalformedPayload {
        payload: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cart {cart_id} lookup failed: {source}")]
    AggregationFailed {
        cart_id: u64,
        #[source]
        source: Box<Error>,
    },

    #[error("response from {uri} has no field {field:?}")]
    MissingField { uri: String, field: String },

    #[error("invalid page {number} (size {size}): pages are 1-based and non-empty")]
    InvalidPage { number: u32, size: u32 },

    #[error("invalid URI {uri:?}: {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap a reqwest failure, keeping timeouts distinguishable.
    pub(crate) fn transport(uri: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Error::Timeout {
                uri: uri.to_string(),
            }
        } else {
            Error::Transport {
                uri: uri.to_string(),
                source,
            }
        }
    }

    pub(crate) fn json(uri: &str, source: serde_json::Error, body: &str) -> Self {
        Error::Json {
            uri: uri.to_string(),
            source,
            snippet: snippet(body),
        }
    }

    pub(crate) fn missing_field(uri: &str, field: &str) -> Self {
        Error::MissingField {
            uri: uri.to_string(),
            field: field.to_string(),
        }
    }

    pub(crate) fn rejected(stage: Stage, reason: impl Into<String>) -> Self {
        Error::LoginFailed {
            stage,
            cause: LoginFailure::Rejected(reason.into()),
        }
    }

    /// Whether the caller may retry the same request unchanged.
    ///
    /// Only connectivity problems qualify; a rejected login or a changed page
    /// layout will fail again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport { .. } | Error::Timeout { .. } => true,
            Error::Status { status, .. } => *status >= 500 || *status == 429,
            Error::LoginFailed {
                cause: LoginFailure::Unavailable(inner),
                ..
            } => inner.is_retryable(),
            Error::AggregationFailed { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Whether this error means the session must be established again.
    pub fn requires_login(&self) -> bool {
        match self {
            Error::LoginFailed { .. } => true,
            Error::AggregationFailed { source, .. } => source.requires_login(),
            _ => false,
        }
    }
}

/// Shorten `text` for display, on a char boundary.
pub(crate) fn snippet(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(SNIPPET_LEN) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;
