//! Session primitive backed by `reqwest` with an in-memory cookie jar.

use super::{Download, ResumeToken, SessionPrimitive, Stage};
use crate::config::{ClientConfig, LOGIN_PATH};
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::stream::StreamExt;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Header carrying the anti-forgery token on state-changing requests.
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// HTTP session holding the cookie jar and CSRF token.
pub struct HttpSession {
    client: reqwest::Client,
    jar: Arc<Jar>,
    config: ClientConfig,
    base: Url,
    timeout: Duration,
    csrf_token: Option<String>,
}

impl HttpSession {
    /// Create an unauthenticated session with an empty cookie jar.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let base = config.base()?;
        let jar = Arc::new(Jar::default());
        let timeout = Duration::from_millis(config.timeout_ms);

        // Whole-request deadlines are set per request; binary bodies only
        // get the per-read bound so long downloads are not cut off.
        let client = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| Error::transport(&config.base_url, e))?;

        Ok(Self {
            client,
            jar,
            config,
            base,
            timeout,
            csrf_token: None,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn csrf_token(&self) -> Option<&str> {
        self.csrf_token.as_deref()
    }

    pub(crate) fn set_csrf_token(&mut self, token: String) {
        self.csrf_token = Some(token);
    }

    /// Value of a cookie the jar would send to the storefront origin.
    pub fn cookie(&self, name: &str) -> Option<String> {
        let header = self.jar.cookies(&self.base)?;
        let header = header.to_str().ok()?;
        header.split(';').find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
    }

    /// Put a cookie into the jar for the storefront origin.
    pub(crate) fn seed_cookie(&self, name: &str, value: &str) {
        self.jar
            .add_cookie_str(&format!("{name}={value}; Path=/"), &self.base);
    }

    /// The cookie/token pair needed to resume this session later.
    pub fn resume_token(&self) -> Option<ResumeToken> {
        Some(ResumeToken {
            session_cookie: self.cookie(&self.config.session_cookie)?,
            csrf_token: self.csrf_token.clone()?,
        })
    }

    /// GET a page as text during the login handshake.
    pub(crate) async fn get_page(&self, uri: &str) -> Result<String> {
        let builder = self.bounded(self.client.get(uri)).header(ACCEPT, "text/html");
        let resp = self.send(builder, uri).await?;
        read_text(resp, uri).await
    }

    /// POST an url-encoded form, sending the CSRF token as a header too.
    pub(crate) async fn post_form(&self, uri: &str, fields: &[(&str, &str)]) -> Result<String> {
        let builder = self.with_csrf(self.bounded(self.client.post(uri))).form(fields);
        let resp = self.send(builder, uri).await?;
        read_text(resp, uri).await
    }

    fn with_csrf(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.csrf_token {
            Some(token) => builder.header(CSRF_HEADER, token.as_str()),
            None => builder,
        }
    }

    fn bounded(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.timeout(self.timeout)
    }

    /// Binary bodies can take long; only connect and per-read timeouts apply.
    fn binary_request(&self, uri: &str) -> RequestBuilder {
        self.client.get(uri)
    }

    fn json_request(&self, builder: RequestBuilder) -> RequestBuilder {
        self.bounded(builder)
            .header(ACCEPT, "application/json")
            .header("X-Requested-With", "XMLHttpRequest")
    }

    /// Send a request and turn non-success answers into typed errors.
    ///
    /// 401/403 and redirects onto the login page mean the storefront no
    /// longer accepts the session.
    async fn send(&self, builder: RequestBuilder, uri: &str) -> Result<Response> {
        tracing::debug!("request {uri}");
        let resp = builder.send().await.map_err(|e| Error::transport(uri, e))?;
        let status = resp.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::rejected(
                Stage::Established,
                format!("{uri} answered with HTTP {}", status.as_u16()),
            ));
        }
        if !status.is_success() {
            return Err(Error::Status {
                uri: uri.to_string(),
                status: status.as_u16(),
            });
        }
        if resp.url().path() == LOGIN_PATH && !uri.contains(LOGIN_PATH) {
            return Err(Error::rejected(
                Stage::Established,
                format!("{uri} redirected to the login page"),
            ));
        }
        Ok(resp)
    }

    async fn read_json(&self, resp: Response, uri: &str) -> Result<Value> {
        let body = read_text(resp, uri).await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| Error::json(uri, e, &body))
    }
}

async fn read_text(resp: Response, uri: &str) -> Result<String> {
    resp.text().await.map_err(|e| Error::transport(uri, e))
}

#[async_trait]
impl SessionPrimitive for HttpSession {
    async fn get_json(&self, uri: &str) -> Result<Value> {
        let resp = self.send(self.json_request(self.client.get(uri)), uri).await?;
        self.read_json(resp, uri).await
    }

    async fn get_raw(&self, uri: &str) -> Result<String> {
        self.get_page(uri).await
    }

    async fn post_json(&self, uri: &str, body: &Value) -> Result<Value> {
        let builder = self.with_csrf(self.json_request(self.client.post(uri))).json(body);
        let resp = self.send(builder, uri).await?;
        self.read_json(resp, uri).await
    }

    async fn delete_json(&self, uri: &str, body: &Value) -> Result<Value> {
        let builder = self.with_csrf(self.json_request(self.client.delete(uri))).json(body);
        let resp = self.send(builder, uri).await?;
        self.read_json(resp, uri).await
    }

    async fn get_binary(&self, uri: &str) -> Result<Download> {
        let resp = self.send(self.binary_request(uri), uri).await?;
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_length = resp.content_length();

        let owned = uri.to_string();
        let stream = resp
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| Error::transport(&owned, e)))
            .boxed();

        Ok(Download::new(uri, content_type, content_length, stream))
    }
}
