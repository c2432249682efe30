//! Client configuration.
//!
//! Values are layered: built-in defaults, then an optional JSON file, then
//! `BEATPORT_*` environment variables.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Connection and endpoint settings shared by every part of the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Storefront origin, e.g. `https://www.beatport.com`.
    pub base_url: String,
    /// Origin of the embed player endpoints.
    pub embed_url: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    pub user_agent: String,
    /// Default page size for listing operations.
    pub page_size: u32,
    /// Upper bound on concurrent requests during a fan-out.
    pub max_concurrent_requests: usize,
    /// Name of the authenticated session cookie.
    pub session_cookie: String,
    /// Name of the CSRF cookie and login form field.
    pub csrf_cookie: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.beatport.com".to_string(),
            embed_url: "https://embed.beatport.com".to_string(),
            timeout_ms: 30_000,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                         AppleWebKit/537.36 (KHTML, like Gecko) \
                         Chrome/131.0.0.0 Safari/537.36"
                .to_string(),
            page_size: 50,
            max_concurrent_requests: 8,
            session_cookie: "session".to_string(),
            csrf_cookie: "_csrf_token".to_string(),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by the environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load a JSON config file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `BEATPORT_*` overrides in place.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = var("BEATPORT_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = var("BEATPORT_EMBED_URL") {
            self.embed_url = v;
        }
        if let Some(v) = var("BEATPORT_TIMEOUT_MS") {
            self.timeout_ms = parse_number("BEATPORT_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var("BEATPORT_USER_AGENT") {
            self.user_agent = v;
        }
        if let Some(v) = var("BEATPORT_PAGE_SIZE") {
            self.page_size = parse_number("BEATPORT_PAGE_SIZE", &v)?;
        }
        if let Some(v) = var("BEATPORT_MAX_CONCURRENT_REQUESTS") {
            self.max_concurrent_requests = parse_number("BEATPORT_MAX_CONCURRENT_REQUESTS", &v)?;
        }
        self.validate()
    }

    /// Check that URLs parse and limits are usable.
    pub fn validate(&self) -> Result<()> {
        self.base()?;
        parse_url(&self.embed_url)?;
        if self.timeout_ms == 0 {
            return Err(Error::Config("timeout_ms must be positive".into()));
        }
        if self.page_size == 0 {
            return Err(Error::Config("page_size must be positive".into()));
        }
        if self.max_concurrent_requests == 0 {
            return Err(Error::Config(
                "max_concurrent_requests must be positive".into(),
            ));
        }
        Ok(())
    }

    /// The storefront origin as a parsed URL.
    pub fn base(&self) -> Result<Url> {
        parse_url(&self.base_url)
    }

    /// Absolute URI on the storefront origin.
    pub fn uri(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Absolute URI on the embed origin.
    pub fn embed_uri(&self, path: &str) -> String {
        format!("{}{}", self.embed_url.trim_end_matches('/'), path)
    }

    pub fn cookie_seed_uri(&self) -> String {
        self.uri("/")
    }

    pub fn login_uri(&self) -> String {
        self.uri(LOGIN_PATH)
    }

    /// The low-cost "who am I" endpoint used to verify a session.
    pub fn whoami_uri(&self) -> String {
        self.uri("/api/my-beatport")
    }
}

/// Path of the login page and form target.
pub const LOGIN_PATH: &str = "/account/login";

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|source| Error::InvalidUri {
        uri: raw.to_string(),
        source,
    })
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key} must be a number, got {value:?}")))
}
