// src/accounts.rs
//! Account request list: which handles to follow and their keyword strings.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::identity::normalize_handle;
use crate::tracking::AccountRequest;

pub const ENV_ACCOUNTS_PATH: &str = "TWEET_NOTIFIER_ACCOUNTS";

#[derive(Debug, Deserialize)]
struct Row {
    #[serde(default)]
    handle: Option<String>,
    /// Profile URL, e.g. `https://twitter.com/alice`.
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    keywords: String,
}

#[derive(Debug, Deserialize)]
struct TomlAccounts {
    accounts: Vec<Row>,
}

/// Handle from a profile link: last non-empty path segment, query dropped.
pub fn handle_from_link(link: &str) -> String {
    let no_query = link.split(['?', '#']).next().unwrap_or_default();
    let last = no_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    normalize_handle(last)
}

/// Load the account list from an explicit path. Supports TOML or JSON.
pub fn load_accounts_from(path: &Path) -> Result<Vec<AccountRequest>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_accounts(&content, &ext).ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))
}

/// Load the account list using env var + fallbacks:
/// 1) $TWEET_NOTIFIER_ACCOUNTS
/// 2) config/accounts.toml
/// 3) config/accounts.json
pub fn load_accounts_default() -> Result<Vec<AccountRequest>, ConfigError> {
    if let Ok(p) = std::env::var(ENV_ACCOUNTS_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(ConfigError::AccountsNotFound(vec![pb]));
        }
        return load_accounts_from(&pb);
    }
    let candidates = [
        PathBuf::from("config/accounts.toml"),
        PathBuf::from("config/accounts.json"),
    ];
    for p in &candidates {
        if p.exists() {
            return load_accounts_from(p);
        }
    }
    Err(ConfigError::AccountsNotFound(candidates.to_vec()))
}

fn parse_accounts(s: &str, hint_ext: &str) -> Option<Vec<AccountRequest>> {
    // Try TOML first if hinted or content looks like toml.
    let try_toml = hint_ext == "toml" || s.contains("[[accounts]]");
    if try_toml {
        if let Some(v) = parse_toml(s) {
            return Some(v);
        }
    }
    if let Some(v) = parse_json(s) {
        return Some(v);
    }
    if !try_toml {
        return parse_toml(s);
    }
    None
}

fn parse_toml(s: &str) -> Option<Vec<AccountRequest>> {
    let v: TomlAccounts = toml::from_str(s).ok()?;
    Some(clean_rows(v.accounts))
}

fn parse_json(s: &str) -> Option<Vec<AccountRequest>> {
    let v: Vec<Row> = serde_json::from_str(s).ok()?;
    Some(clean_rows(v))
}

fn clean_rows(rows: Vec<Row>) -> Vec<AccountRequest> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let handle = match (&row.handle, &row.link) {
            (Some(h), _) if !h.trim().is_empty() => normalize_handle(h),
            (_, Some(link)) => handle_from_link(link),
            _ => String::new(),
        };
        if handle.is_empty() {
            tracing::warn!(target: "accounts", ?row, "dropping account row without a handle");
            continue;
        }
        out.push(AccountRequest::new(handle, row.keywords));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_is_last_link_segment() {
        assert_eq!(handle_from_link("https://twitter.com/Alice"), "alice");
        assert_eq!(handle_from_link("https://twitter.com/bob/"), "bob");
        assert_eq!(handle_from_link("https://x.com/carol?lang=en"), "carol");
        assert_eq!(handle_from_link("@dave"), "dave");
    }

    #[test]
    fn toml_and_json_rows_parse() {
        let toml = r#"
[[accounts]]
link = "https://twitter.com/Alice"
keywords = "launch, release"

[[accounts]]
handle = "bob"
keywords = "rates"

[[accounts]]
keywords = "orphan"
"#;
        let rows = parse_toml(toml).unwrap();
        assert_eq!(
            rows,
            vec![
                AccountRequest::new("alice", "launch, release"),
                AccountRequest::new("bob", "rates"),
            ]
        );

        let json = r#"[{"handle": "@Carol", "keywords": "x"}]"#;
        assert_eq!(
            parse_json(json).unwrap(),
            vec![AccountRequest::new("carol", "x")]
        );
    }

    #[test]
    fn garbage_is_unsupported() {
        assert!(parse_accounts("not = [valid", "toml").is_none());
    }
}
