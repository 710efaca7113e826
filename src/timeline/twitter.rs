// src/timeline/twitter.rs
//! Twitter API v2 client for user lookup and user timelines.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

use crate::error::FetchError;
use crate::timeline::budget::RATE_WINDOW;
use crate::timeline::types::{
    PageRequest, Post, ResolvedUser, TimelineApi, TimelineMeta, TimelinePage,
};

pub const DEFAULT_API_BASE: &str = "https://api.twitter.com";

pub const USER_AGENT: &str = "tweet-notifier/0.1";

#[derive(Debug, Deserialize)]
struct UsersResponse {
    #[serde(default)]
    data: Vec<ResolvedUser>,
}

#[derive(Debug, Deserialize)]
struct TweetsResponse {
    #[serde(default)]
    data: Option<Vec<Post>>,
    #[serde(default)]
    meta: TimelineMeta,
}

pub struct TwitterClient {
    http: Client,
    base: String,
    bearer_token: String,
}

impl TwitterClient {
    /// Fails only when the HTTP client cannot be built (e.g. no TLS backend).
    pub fn new(
        base: impl Into<String>,
        bearer_token: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .build()?;
        Ok(Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
            bearer_token: bearer_token.into(),
        })
    }

    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Response, FetchError> {
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.bearer_token)
            .query(query)
            .send()
            .await
            .map_err(|e| FetchError::transient(format!("request to {url} failed: {e}")))?;

        if resp.status().is_success() {
            return Ok(resp);
        }
        Err(classify_failure(resp).await)
    }
}

/// Map a non-2xx response onto the transient/fatal split.
async fn classify_failure(resp: Response) -> FetchError {
    let status = resp.status();
    let reset = resp
        .headers()
        .get("x-rate-limit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok());
    let body = resp.text().await.unwrap_or_default();
    let reason = format!("{status}: {}", body.trim());

    match status {
        StatusCode::TOO_MANY_REQUESTS => FetchError::Transient {
            reason,
            retry_after: reset.map(retry_after_from_reset),
        },
        StatusCode::INTERNAL_SERVER_ERROR
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => FetchError::transient(reason),
        other => FetchError::fatal(Some(other.as_u16()), reason),
    }
}

/// Seconds until the epoch `reset`, clamped to one rate-limit window.
fn retry_after_from_reset(reset: i64) -> Duration {
    let secs = (reset - Utc::now().timestamp()).max(1) as u64;
    Duration::from_secs(secs).min(RATE_WINDOW)
}

#[async_trait]
impl TimelineApi for TwitterClient {
    async fn lookup_users(&self, handles: &[String]) -> Result<Vec<ResolvedUser>, FetchError> {
        let url = format!("{}/2/users/by", self.base);
        let query = [
            ("usernames", handles.join(",")),
            ("user.fields", "id".to_string()),
        ];
        let resp = self.get(&url, &query).await?;
        let body: UsersResponse = resp
            .json()
            .await
            .map_err(|e| FetchError::fatal(None, format!("decoding users/by: {e}")))?;
        Ok(body.data)
    }

    async fn fetch_page(&self, req: &PageRequest<'_>) -> Result<TimelinePage, FetchError> {
        let url = format!("{}/2/users/{}/tweets", self.base, req.user_id);
        let mut query = vec![
            ("max_results", req.page_size.to_string()),
            ("tweet.fields", "created_at".to_string()),
        ];
        if let Some(since) = req.since {
            query.push(("since_id", since.0.clone()));
        }
        if let Some(token) = req.pagination_token {
            query.push(("pagination_token", token.to_string()));
        }

        let resp = self.get(&url, &query).await?;
        let body: TweetsResponse = resp
            .json()
            .await
            .map_err(|e| FetchError::fatal(None, format!("decoding user tweets: {e}")))?;

        // `data` is omitted when the page is empty.
        Ok(TimelinePage {
            meta: body.meta,
            posts: body.data.unwrap_or_default(),
        })
    }

    fn name(&self) -> &'static str {
        "twitter-v2"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_in_past_waits_at_least_a_second() {
        let past = Utc::now().timestamp() - 100;
        assert_eq!(retry_after_from_reset(past), Duration::from_secs(1));
    }

    #[test]
    fn reset_far_ahead_is_clamped_to_window() {
        let future = Utc::now().timestamp() + 10 * 3600;
        assert_eq!(retry_after_from_reset(future), RATE_WINDOW);
    }

    #[test]
    fn empty_timeline_body_decodes() {
        let raw = r#"{"meta":{"result_count":0}}"#;
        let body: TweetsResponse = serde_json::from_str(raw).unwrap();
        assert!(body.data.is_none());
        assert_eq!(body.meta.result_count, 0);
        assert!(body.meta.newest_id.is_none());
    }
}
