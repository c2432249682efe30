//! Login and resumption handshakes.
//!
//! Fresh login walks `Unauthenticated → CookieSeeded → TokenObtained →
//! Submitted`; resumption seeds the jar directly. Both end in the same
//! verification step, see [`Established::verify`].

use super::{Established, HttpSession, Stage};
use crate::config::ClientConfig;
use crate::error::{Error, LoginFailure, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A saved session cookie and CSRF token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeToken {
    pub session_cookie: String,
    pub csrf_token: String,
}

impl fmt::Debug for ResumeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResumeToken")
            .field("session_cookie", &"<redacted>")
            .field("csrf_token", &"<redacted>")
            .finish()
    }
}

/// What a session is established from.
#[derive(Clone)]
pub enum Credentials {
    Password { username: String, password: String },
    Resume(ResumeToken),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::Resume(token) => f.debug_tuple("Resume").field(token).finish(),
        }
    }
}

/// Establish a session from either kind of credentials.
pub async fn connect(
    config: ClientConfig,
    credentials: &Credentials,
) -> Result<Established<HttpSession>> {
    match credentials {
        Credentials::Password { username, password } => {
            establish(config, username, password).await
        }
        Credentials::Resume(token) => {
            resume(config, &token.session_cookie, &token.csrf_token).await
        }
    }
}

/// Log in with a username and password, then verify the session.
pub async fn establish(
    config: ClientConfig,
    username: &str,
    password: &str,
) -> Result<Established<HttpSession>> {
    let session = HttpSession::new(config.clone())?;
    let session = login(session, username, password).await?;
    Established::verify(session, config).await
}

/// Resume from a saved session cookie and CSRF token, then verify it exactly
/// like a fresh login.
pub async fn resume(
    config: ClientConfig,
    session_cookie: &str,
    csrf_token: &str,
) -> Result<Established<HttpSession>> {
    check_cookie_value(&config.session_cookie, session_cookie)?;
    check_cookie_value(&config.csrf_cookie, csrf_token)?;

    let mut session = HttpSession::new(config.clone())?;
    session.seed_cookie(&config.session_cookie, session_cookie);
    session.seed_cookie(&config.csrf_cookie, csrf_token);
    session.set_csrf_token(csrf_token.to_string());
    tracing::debug!(stage = %Stage::Submitted, "resuming saved session");
    Established::verify(session, config).await
}

/// Reject values the jar would truncate or reinterpret as cookie attributes.
fn check_cookie_value(name: &str, value: &str) -> Result<()> {
    let invalid =
        |c: char| c.is_whitespace() || c.is_control() || matches!(c, ';' | ',' | '"' | '\\');
    if value.is_empty() || value.contains(invalid) {
        return Err(Error::Config(format!("invalid value for cookie {name}")));
    }
    Ok(())
}

/// Run the three-request login handshake.
async fn login(mut session: HttpSession, username: &str, password: &str) -> Result<HttpSession> {
    let csrf_name = session.config().csrf_cookie.clone();

    let seed_uri = session.config().cookie_seed_uri();
    session
        .get_page(&seed_uri)
        .await
        .map_err(|e| login_failure(Stage::Unauthenticated, e))?;
    tracing::debug!(stage = %Stage::CookieSeeded, "cookie jar seeded from {seed_uri}");

    let login_uri = session.config().login_uri();
    let page = session
        .get_page(&login_uri)
        .await
        .map_err(|e| login_failure(Stage::CookieSeeded, e))?;

    let token = match scrape_csrf_token(&page, &csrf_name) {
        Some(token) => token,
        None => session.cookie(&csrf_name).ok_or_else(|| {
            login_failure(
                Stage::CookieSeeded,
                Error::MarkerNotFound {
                    marker: format!("name=\"{csrf_name}\""),
                    context: crate::error::snippet(&page),
                },
            )
        })?,
    };
    session.set_csrf_token(token.clone());
    tracing::debug!(stage = %Stage::TokenObtained, "CSRF token obtained from {login_uri}");

    session
        .post_form(
            &login_uri,
            &[
                ("username", username),
                ("password", password),
                (csrf_name.as_str(), token.as_str()),
            ],
        )
        .await
        .map_err(|e| login_failure(Stage::TokenObtained, e))?;

    if session.cookie(&session.config().session_cookie).is_none() {
        tracing::debug!("login answer set no session cookie; verification will decide");
    }
    tracing::debug!(stage = %Stage::Submitted, "credentials submitted");
    Ok(session)
}

/// Find the CSRF token in the login form's hidden input.
pub fn scrape_csrf_token(html: &str, field: &str) -> Option<String> {
    let name = regex::escape(field);
    let input = Regex::new(&format!(r#"<input[^>]*name\s*=\s*["']{name}["'][^>]*>"#)).ok()?;
    let value = Regex::new(r#"value\s*=\s*["']([^"']*)["']"#).ok()?;

    let tag = input.find(html)?;
    let token = value.captures(tag.as_str())?.get(1)?.as_str();
    (!token.is_empty()).then(|| token.to_string())
}

/// Classify an error raised during establishment as a login failure at
/// `stage`, keeping rejected credentials apart from an unreachable service.
pub(crate) fn login_failure(stage: Stage, err: Error) -> Error {
    match err {
        Error::LoginFailed { cause, .. } => Error::LoginFailed { stage, cause },
        Error::Json { uri, .. } if stage == Stage::Verifying => {
            Error::rejected(stage, format!("{uri} did not answer with account data"))
        }
        other => Error::LoginFailed {
            stage,
            cause: LoginFailure::Unavailable(Box::new(other)),
        },
    }
}
