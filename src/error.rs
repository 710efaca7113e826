// src/error.rs
//! Typed failures at the core seams. Binary glue wraps these in `anyhow`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Startup configuration problems. All of them abort before the loop starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing API credential (the auth-config failure).
    #[error("credential not found in environment: {0}")]
    MissingCredential(&'static str),

    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },

    #[error("incomplete SMTP configuration, missing {0:?}")]
    IncompleteSmtp(Vec<&'static str>),

    #[error("account list not found (looked at {0:?})")]
    AccountsNotFound(Vec<PathBuf>),

    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported account list format in {0}")]
    UnsupportedFormat(PathBuf),
}

/// Failure of a timeline or lookup request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Rate limited or temporarily unavailable; worth retrying.
    #[error("transient fetch failure: {reason}")]
    Transient {
        reason: String,
        retry_after: Option<Duration>,
    },

    /// Authentication, permission or malformed-response failure; never retried.
    #[error("fatal fetch failure ({status:?}): {reason}")]
    Fatal { status: Option<u16>, reason: String },
}

impl FetchError {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient {
            reason: reason.into(),
            retry_after: None,
        }
    }

    pub fn fatal(status: Option<u16>, reason: impl Into<String>) -> Self {
        Self::Fatal {
            status,
            reason: reason.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transient { .. } => "transient",
            Self::Fatal { .. } => "fatal",
        }
    }
}

/// Handle lookup failed; the batch is never partially applied.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("lookup failed for batch {handles:?}: {source}")]
    Lookup {
        handles: Vec<String>,
        #[source]
        source: FetchError,
    },

    #[error("lookup returned no identifier for {0:?}")]
    Unresolved(Vec<String>),
}

/// A requested handle has no identity; the resolver must run first.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("no identifier resolved for handle @{handle}")]
pub struct MissingIdentityError {
    pub handle: String,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("building message for @{handle}: {reason}")]
    Compose { handle: String, reason: String },

    #[error("sending to {receiver}: {reason}")]
    Send { receiver: String, reason: String },
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("identity cache io at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("identity cache decode at {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("identity cache encode: {0}")]
    Encode(#[source] serde_json::Error),
}
