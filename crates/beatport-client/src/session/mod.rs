//! Authenticated sessions against the storefront.
//!
//! A session owns a cookie jar and a CSRF token. It starts out
//! unauthenticated, goes through either a fresh login or a resumption from a
//! saved cookie, and is only handed to callers as an [`Established`] session
//! after a verification round-trip has succeeded.

pub mod establish;
pub mod http;

pub use establish::{connect, establish, resume, Credentials, ResumeToken};
pub use http::HttpSession;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use serde_json::Value;
use std::fmt;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Upper bound on the buffer reserved up front from `Content-Length`.
const MAX_PREALLOC: u64 = 8 << 20;

/// Streamed body of a binary download.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Verb-level requests carrying the session's cookies and CSRF token.
///
/// Every method applies the cookie jar automatically; state-changing verbs
/// also send the CSRF token. Implementations report a rejected session as
/// [`Error::LoginFailed`], never as a plain status error.
#[async_trait]
pub trait SessionPrimitive: Send + Sync {
    /// GET a JSON endpoint.
    async fn get_json(&self, uri: &str) -> Result<Value>;
    /// GET an HTML/JS page as text.
    async fn get_raw(&self, uri: &str) -> Result<String>;
    /// POST a JSON body and parse the JSON answer.
    async fn post_json(&self, uri: &str, body: &Value) -> Result<Value>;
    /// DELETE with a JSON body and parse the JSON answer.
    async fn delete_json(&self, uri: &str, body: &Value) -> Result<Value>;
    /// GET a binary resource as a byte stream.
    async fn get_binary(&self, uri: &str) -> Result<Download>;
}

/// Where an establishment attempt is in the login handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Unauthenticated,
    CookieSeeded,
    TokenObtained,
    Submitted,
    Verifying,
    Established,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Unauthenticated => "unauthenticated",
            Stage::CookieSeeded => "cookie-seeded",
            Stage::TokenObtained => "token-obtained",
            Stage::Submitted => "submitted",
            Stage::Verifying => "verifying",
            Stage::Established => "established",
        };
        f.write_str(name)
    }
}

/// A session that passed verification.
///
/// This is the only value a [`crate::Beatport`] facade can be built from.
pub struct Established<P> {
    primitive: P,
    config: ClientConfig,
    account: Value,
}

impl<P: SessionPrimitive> Established<P> {
    /// Verify a freshly logged-in or resumed session with one authenticated
    /// "who am I" request.
    ///
    /// Any failure, including a 200 answer carrying an authentication error,
    /// yields [`Error::LoginFailed`] and drops the session.
    pub async fn verify(primitive: P, config: ClientConfig) -> Result<Self> {
        let uri = config.whoami_uri();
        tracing::debug!(stage = %Stage::Verifying, "verifying session via {uri}");

        let account = match primitive.get_json(&uri).await {
            Ok(account) => account,
            Err(e) => {
                let err = establish::login_failure(Stage::Verifying, e);
                tracing::warn!("session verification failed: {err}");
                return Err(err);
            }
        };

        if let Some(reason) = auth_failure(&account) {
            tracing::warn!("session verification rejected: {reason}");
            return Err(Error::rejected(Stage::Verifying, reason));
        }

        tracing::info!(stage = %Stage::Established, "session established with {}", config.base_url);
        Ok(Self {
            primitive,
            config,
            account,
        })
    }

    pub fn primitive(&self) -> &P {
        &self.primitive
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The account payload returned by the verification request.
    pub fn account(&self) -> &Value {
        &self.account
    }
}

impl<P> fmt::Debug for Established<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Established")
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

/// Detect an authentication failure reported inside a successful response.
pub fn auth_failure(payload: &Value) -> Option<String> {
    let obj = payload.as_object()?;

    if let Some(err) = obj.get("error").filter(|v| !v.is_null()) {
        return Some(match err {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
    }
    if let Some(errors) = obj.get("errors") {
        let empty = match errors {
            Value::Array(a) => a.is_empty(),
            Value::Object(o) => o.is_empty(),
            Value::Null => true,
            _ => false,
        };
        if !empty {
            return Some(errors.to_string());
        }
    }
    if obj.get("authenticated") == Some(&Value::Bool(false)) {
        return Some("not authenticated".to_string());
    }
    None
}

/// A binary resource being downloaded.
pub struct Download {
    /// URI the bytes are read from.
    pub uri: String,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    stream: ByteStream,
}

impl Download {
    pub fn new(
        uri: impl Into<String>,
        content_type: Option<String>,
        content_length: Option<u64>,
        stream: ByteStream,
    ) -> Self {
        Self {
            uri: uri.into(),
            content_type,
            content_length,
            stream,
        }
    }

    pub fn into_stream(self) -> ByteStream {
        self.stream
    }

    /// Collect the whole body in memory.
    pub async fn bytes(mut self) -> Result<Vec<u8>> {
        let reserve = self.content_length.map_or(0, |n| n.min(MAX_PREALLOC));
        let mut out = Vec::with_capacity(reserve as usize);
        while let Some(chunk) = self.stream.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }

    /// Stream the body into `writer`, returning the number of bytes written.
    pub async fn write_to<W: AsyncWrite + Unpin>(mut self, writer: &mut W) -> Result<u64> {
        let mut written = 0u64;
        while let Some(chunk) = self.stream.next().await {
            let chunk = chunk?;
            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        writer.flush().await?;
        Ok(written)
    }
}

impl fmt::Debug for Download {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Download")
            .field("uri", &self.uri)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_auth_failure_payloads() {
        assert_eq!(
            auth_failure(&json!({"error": "Authentication required"})).as_deref(),
            Some("Authentication required")
        );
        assert!(auth_failure(&json!({"errors": ["expired"]})).is_some());
        assert!(auth_failure(&json!({"authenticated": false})).is_some());
    }

    #[test]
    fn test_auth_success_payloads() {
        assert!(auth_failure(&json!({"id": 1, "username": "dj"})).is_none());
        assert!(auth_failure(&json!({"error": null, "errors": []})).is_none());
        assert!(auth_failure(&json!([1, 2])).is_none());
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::TokenObtained.to_string(), "token-obtained");
    }

    #[tokio::test]
    async fn test_download_write_to() {
        let chunks = vec![
            Ok(Bytes::from_static(b"ID3")),
            Ok(Bytes::from_static(b"\x00\x01")),
        ];
        let download = Download::new(
            "https://files.test/a.mp3",
            Some("audio/mpeg".into()),
            Some(5),
            futures::stream::iter(chunks).boxed(),
        );
        let mut sink: Vec<u8> = Vec::new();
        let written = download.write_to(&mut sink).await.unwrap();
        assert_eq!(written, 5);
        assert_eq!(sink, b"ID3\x00\x01");
    }

    #[tokio::test]
    async fn test_download_bytes_ignores_bogus_content_length() {
        let download = Download::new(
            "https://files.test/a.mp3",
            None,
            Some(u64::MAX),
            futures::stream::iter(vec![Ok(Bytes::from_static(b"abc"))]).boxed(),
        );
        assert_eq!(download.bytes().await.unwrap(), b"abc");
    }

    #[test]
    fn test_download_stream_error_propagates() {
        let chunks = vec![
            Ok(Bytes::from_static(b"abc")),
            Err(Error::Timeout {
                uri: "https://files.test/a.mp3".into(),
            }),
        ];
        let download = Download::new(
            "https://files.test/a.mp3",
            None,
            None,
            futures::stream::iter(chunks).boxed(),
        );
        let collected = tokio_test::block_on(download.bytes());
        tokio_test::assert_err!(&collected);
        assert!(matches!(collected, Err(Error::Timeout { .. })));
    }
}
