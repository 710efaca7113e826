// src/config.rs
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::identity::cache::default_cache_path;
use crate::retry::RetryPolicy;
use crate::timeline::budget::DEFAULT_WINDOW_BUDGET;
use crate::timeline::twitter::DEFAULT_API_BASE;

pub const ENV_BEARER_TOKEN: &str = "TWITTER_BEARER_TOKEN";
pub const ENV_API_BASE: &str = "TWITTER_API_BASE";
pub const ENV_CACHE_PATH: &str = "TWEET_NOTIFIER_CACHE_PATH";
pub const ENV_POLL_INTERVAL: &str = "POLL_INTERVAL_SECS";
pub const ENV_KEYWORD_DELIMITER: &str = "KEYWORD_DELIMITER";
pub const ENV_MAX_RETRIES: &str = "FETCH_MAX_RETRIES";
pub const ENV_BACKOFF: &str = "FETCH_BACKOFF_SECS";
pub const ENV_RATE_LIMIT: &str = "RATE_LIMIT_REQUESTS";
pub const ENV_METRICS_ADDR: &str = "METRICS_ADDR";

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_KEYWORD_DELIMITER: &str = ",";

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bearer_token: String,
    pub api_base: String,
    pub cache_path: PathBuf,
    pub poll_interval: Duration,
    pub keyword_delimiter: String,
    pub retry: RetryPolicy,
    pub rate_limit_requests: u32,
    pub metrics_addr: Option<SocketAddr>,
    pub smtp: Option<SmtpConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bearer_token = std::env::var(ENV_BEARER_TOKEN)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingCredential(ENV_BEARER_TOKEN))?;

        let api_base = env_or(ENV_API_BASE, DEFAULT_API_BASE.to_string());
        let cache_path = std::env::var(ENV_CACHE_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_cache_path());

        let poll_interval = Duration::from_secs(parse_env(ENV_POLL_INTERVAL, DEFAULT_POLL_INTERVAL_SECS)?);
        let keyword_delimiter = std::env::var(ENV_KEYWORD_DELIMITER)
            .ok()
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| DEFAULT_KEYWORD_DELIMITER.to_string());

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_retries: parse_env(ENV_MAX_RETRIES, defaults.max_retries)?,
            backoff: Duration::from_secs(parse_env(ENV_BACKOFF, defaults.backoff.as_secs())?),
        };

        let rate_limit_requests = parse_env(ENV_RATE_LIMIT, DEFAULT_WINDOW_BUDGET)?;
        let metrics_addr = match std::env::var(ENV_METRICS_ADDR) {
            Ok(v) if !v.trim().is_empty() => Some(parse_value(ENV_METRICS_ADDR, &v)?),
            _ => None,
        };

        Ok(Self {
            bearer_token,
            api_base,
            cache_path,
            poll_interval,
            keyword_delimiter,
            retry,
            rate_limit_requests,
            metrics_addr,
            smtp: SmtpConfig::from_env()?,
        })
    }
}

/// SMTP relay settings for email delivery.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub receivers: Vec<String>,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from", &self.from)
            .field("receivers", &self.receivers)
            .finish()
    }
}

impl SmtpConfig {
    /// `Ok(None)` when no SMTP variable is set at all; an error when only some are.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        const REQUIRED: [&str; 4] = ["SMTP_HOST", "SMTP_USERNAME", "SMTP_PASSWORD", "NOTIFY_EMAIL_TO"];

        let values: Vec<Option<String>> = REQUIRED
            .iter()
            .map(|k| std::env::var(k).ok().filter(|v| !v.trim().is_empty()))
            .collect();
        if values.iter().all(Option::is_none) {
            return Ok(None);
        }
        let missing: Vec<&'static str> = REQUIRED
            .iter()
            .zip(&values)
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| *k)
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::IncompleteSmtp(missing));
        }

        let mut it = values.into_iter().flatten();
        let (host, username, password, to) = match (it.next(), it.next(), it.next(), it.next()) {
            (Some(h), Some(u), Some(p), Some(t)) => (h, u, p, t),
            _ => return Err(ConfigError::IncompleteSmtp(REQUIRED.to_vec())),
        };

        let receivers: Vec<String> = to
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect();
        if receivers.is_empty() {
            return Err(ConfigError::IncompleteSmtp(vec!["NOTIFY_EMAIL_TO"]));
        }
        let from = std::env::var("NOTIFY_EMAIL_FROM")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| username.clone());

        Ok(Some(Self {
            host,
            port: parse_env("SMTP_PORT", 465)?,
            username,
            password,
            from,
            receivers,
        }))
    }
}

fn env_or(var: &str, default: String) -> String {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(default)
}

fn parse_env<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => parse_value(var, &v),
        _ => Ok(default),
    }
}

fn parse_value<T: FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_value_reports_variable() {
        let err = parse_value::<u64>(ENV_POLL_INTERVAL, "soon").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { var: ENV_POLL_INTERVAL, .. }
        ));
        assert_eq!(parse_value::<u64>(ENV_POLL_INTERVAL, " 60 ").unwrap(), 60);
    }
}
