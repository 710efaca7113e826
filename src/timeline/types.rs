// src/timeline/types.rs
use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// Stable platform identity of an account (numeric, kept as a string).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Post id. Ids are decimal strings that grow with recency, so they are
/// ordered by length first and then lexically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub String);

impl Ord for PostId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for PostId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PostId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub text: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Page metadata as reported by the timeline endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineMeta {
    #[serde(default)]
    pub result_count: u32,
    #[serde(default)]
    pub newest_id: Option<PostId>,
    #[serde(default)]
    pub oldest_id: Option<PostId>,
    #[serde(default)]
    pub next_token: Option<String>,
    #[serde(default)]
    pub previous_token: Option<String>,
}

impl TimelineMeta {
    /// Fold the metadata of the following page into this one.
    /// `newest_id` stays with the first page; the rest tracks the latest page.
    pub fn absorb(&mut self, next: TimelineMeta) {
        if next.oldest_id.is_some() {
            self.oldest_id = next.oldest_id;
        }
        if self.newest_id.is_none() {
            self.newest_id = next.newest_id;
        }
        self.result_count += next.result_count;
        self.previous_token = next.previous_token;
        self.next_token = next.next_token;
    }
}

/// One response page from the timeline endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimelinePage {
    pub meta: TimelineMeta,
    pub posts: Vec<Post>,
}

/// Parameters of one timeline request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest<'a> {
    pub user_id: &'a UserId,
    pub since: Option<&'a PostId>,
    pub page_size: u32,
    pub pagination_token: Option<&'a str>,
}

/// Handle -> identifier pair returned by a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedUser {
    pub id: UserId,
    pub username: String,
}

/// Upper bound on handles per `lookup_users` call.
pub const LOOKUP_BATCH_SIZE: usize = 100;

/// Remote platform capabilities consumed by the core.
#[async_trait::async_trait]
pub trait TimelineApi: Send + Sync {
    /// Resolve at most [`LOOKUP_BATCH_SIZE`] handles.
    async fn lookup_users(&self, handles: &[String]) -> Result<Vec<ResolvedUser>, FetchError>;

    /// Fetch a single page of an account's timeline.
    async fn fetch_page(&self, req: &PageRequest<'_>) -> Result<TimelinePage, FetchError>;

    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_ids_order_numerically() {
        assert!(PostId::from("905") > PostId::from("900"));
        assert!(PostId::from("1000") > PostId::from("999"));
        assert_eq!(
            PostId::from("42").cmp(&PostId::from("42")),
            Ordering::Equal
        );
    }

    #[test]
    fn absorb_accumulates_counts_and_keeps_newest() {
        let mut meta = TimelineMeta {
            result_count: 5,
            newest_id: Some("20".into()),
            oldest_id: Some("16".into()),
            next_token: Some("p2".into()),
            previous_token: None,
        };
        meta.absorb(TimelineMeta {
            result_count: 3,
            newest_id: Some("15".into()),
            oldest_id: Some("13".into()),
            next_token: None,
            previous_token: Some("p1".into()),
        });
        assert_eq!(meta.result_count, 8);
        assert_eq!(meta.newest_id, Some("20".into()));
        assert_eq!(meta.oldest_id, Some("13".into()));
        assert_eq!(meta.next_token, None);
        assert_eq!(meta.previous_token.as_deref(), Some("p1"));
    }
}
