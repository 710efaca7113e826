// src/timeline/mod.rs
pub mod budget;
pub mod twitter;
pub mod types;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::Mutex;

use crate::error::FetchError;
use crate::timeline::budget::RequestBudget;
use crate::timeline::types::{PageRequest, Post, PostId, TimelineApi, TimelineMeta, UserId};

/// Posts requested when an account has no cursor yet.
pub const PRIMING_PAGE_SIZE: u32 = 5;

/// Posts requested per page when catching up from a cursor.
pub const CATCH_UP_PAGE_SIZE: u32 = 100;

/// Hard stop on continuation pages followed in one fetch.
pub const MAX_CATCH_UP_PAGES: u32 = 50;

/// Consolidated result of one fetch, possibly spanning several pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    pub meta: TimelineMeta,
    pub posts: Vec<Post>,
}

impl Timeline {
    /// Cursor candidate: the reported newest id, else the newest post present.
    pub fn newest_id(&self) -> Option<&PostId> {
        self.meta
            .newest_id
            .as_ref()
            .or_else(|| self.posts.iter().map(|p| &p.id).max())
    }
}

/// Incremental timeline reader over a [`TimelineApi`], metered by a [`RequestBudget`].
pub struct TimelineFetcher {
    api: Arc<dyn TimelineApi>,
    budget: Mutex<RequestBudget>,
    priming_page_size: u32,
    page_size: u32,
}

impl TimelineFetcher {
    pub fn new(api: Arc<dyn TimelineApi>, budget: RequestBudget) -> Self {
        Self {
            api,
            budget: Mutex::new(budget),
            priming_page_size: PRIMING_PAGE_SIZE,
            page_size: CATCH_UP_PAGE_SIZE,
        }
    }

    pub fn with_page_sizes(mut self, priming: u32, catch_up: u32) -> Self {
        self.priming_page_size = priming;
        self.page_size = catch_up;
        self
    }

    /// Shortest sweep interval that keeps `accounts` fetches inside the budget.
    pub async fn min_sweep_interval(&self, accounts: usize) -> Duration {
        self.budget.lock().await.min_sweep_interval(accounts)
    }

    /// Fetch posts newer than `since`.
    ///
    /// Without a cursor only the most recent small page is read, which sets
    /// the baseline. With a cursor every continuation page is followed and
    /// the batches are concatenated in the order the API returned them.
    pub async fn fetch(
        &self,
        user_id: &UserId,
        since: Option<&PostId>,
    ) -> Result<Timeline, FetchError> {
        let page_size = if since.is_some() {
            self.page_size
        } else {
            self.priming_page_size
        };

        self.budget.lock().await.acquire().await;
        let first = self
            .api
            .fetch_page(&PageRequest {
                user_id,
                since,
                page_size,
                pagination_token: None,
            })
            .await?;

        let mut out = Timeline {
            meta: first.meta,
            posts: first.posts,
        };

        if since.is_none() {
            return Ok(out);
        }

        let mut pages = 1u32;
        let mut seen_tokens = HashSet::new();
        while let Some(token) = out.meta.next_token.clone() {
            if pages >= MAX_CATCH_UP_PAGES || !seen_tokens.insert(token.clone()) {
                tracing::warn!(
                    target: "timeline",
                    %user_id,
                    pages,
                    token = %token,
                    "pagination stopped early (page cap or repeated token)"
                );
                break;
            }
            self.budget.lock().await.acquire().await;
            let next = self
                .api
                .fetch_page(&PageRequest {
                    user_id,
                    since,
                    page_size,
                    pagination_token: Some(&token),
                })
                .await?;
            pages += 1;
            out.meta.absorb(next.meta);
            out.posts.extend(next.posts);
        }

        if let Some(cursor) = since {
            out.posts.retain(|p| &p.id > cursor);
        }

        counter!("poll_pages_fetched_total").increment(u64::from(pages));
        tracing::debug!(
            target: "timeline",
            %user_id,
            pages,
            result_count = out.meta.result_count,
            "consolidated timeline pages"
        );
        Ok(out)
    }
}
