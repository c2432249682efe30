//! Configuration loading and resolution.

use anyhow::{bail, Context, Result};
use beatport_client::{ClientConfig, Credentials, ResumeToken};
use std::path::PathBuf;

/// Resolve the config file path.
///
/// Order: explicit flag, `BEATPORT_CONFIG`, `./beatport.json`, then
/// `~/.config/beatport/config.json`. Returns `None` when no file exists.
pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }

    if let Ok(env_path) = std::env::var("BEATPORT_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    let cwd_config = PathBuf::from("beatport.json");
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    let home_config = dirs::config_dir()?.join("beatport").join("config.json");
    home_config.exists().then_some(home_config)
}

/// Defaults, then the config file if any, then `BEATPORT_*` variables.
pub fn load_config(explicit: Option<&str>) -> Result<ClientConfig> {
    let mut config = match resolve_config_path(explicit) {
        Some(path) => {
            tracing::debug!("loading config from {}", path.display());
            ClientConfig::from_file(&path)
                .with_context(|| format!("failed to load config {}", path.display()))?
        }
        None => ClientConfig::default(),
    };
    config
        .apply_env()
        .context("invalid BEATPORT_* environment override")?;
    Ok(config)
}

/// Credentials from the environment.
///
/// A saved session (`BEATPORT_SESSION` + `BEATPORT_CSRF_TOKEN`) wins over
/// `BEATPORT_USERNAME` + `BEATPORT_PASSWORD`.
pub fn credentials_from_env() -> Result<Credentials> {
    credentials_from(|key| std::env::var(key).ok())
}

fn credentials_from(var: impl Fn(&str) -> Option<String>) -> Result<Credentials> {
    if let (Some(session_cookie), Some(csrf_token)) =
        (var("BEATPORT_SESSION"), var("BEATPORT_CSRF_TOKEN"))
    {
        return Ok(Credentials::Resume(ResumeToken {
            session_cookie,
            csrf_token,
        }));
    }
    match (var("BEATPORT_USERNAME"), var("BEATPORT_PASSWORD")) {
        (Some(username), Some(password)) => Ok(Credentials::Password { username, password }),
        _ => bail!(
            "no credentials: set BEATPORT_USERNAME and BEATPORT_PASSWORD, \
             or BEATPORT_SESSION and BEATPORT_CSRF_TOKEN"
        ),
    }
}
