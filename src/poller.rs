// src/poller.rs
//! The polling loop: fetch, filter, deliver, advance cursor, sleep, repeat.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};

use crate::config::DEFAULT_POLL_INTERVAL_SECS;
use crate::error::FetchError;
use crate::filter::filter_posts;
use crate::notify::Notifier;
use crate::retry::{retry_transient, RetryPolicy};
use crate::timeline::types::UserId;
use crate::timeline::TimelineFetcher;
use crate::tracking::{TrackedAccount, TrackingTable};

/// Run-level state. The first sweep only establishes baseline cursors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Priming,
    Steady,
}

/// What happened to one account during a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountOutcome {
    /// Baseline cursor recorded; nothing delivered.
    Primed,
    NoNewPosts,
    NoMatches { fetched: usize },
    Delivered { fetched: usize, matched: usize },
    /// Delivery failed; cursor held back so the batch is retried next sweep.
    DeliveryFailed { matched: usize },
    /// Transient failures outlasted the retry budget; retried next sweep.
    SkippedTransient,
    /// Fatal failure; the account is dropped for the rest of the run.
    Disabled,
    /// Disabled in an earlier sweep.
    Inactive,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub outcomes: Vec<(UserId, AccountOutcome)>,
}

impl CycleReport {
    pub fn outcome(&self, id: &UserId) -> Option<&AccountOutcome> {
        self.outcomes
            .iter()
            .find(|(uid, _)| uid == id)
            .map(|(_, o)| o)
    }

    pub fn delivered(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, AccountOutcome::Delivered { .. }))
            .count()
    }
}

pub struct Poller {
    table: TrackingTable,
    fetcher: TimelineFetcher,
    notifier: Arc<dyn Notifier>,
    retry: RetryPolicy,
    interval: Duration,
    phase: Phase,
    cycles: u64,
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("table", &self.table)
            .field("retry", &self.retry)
            .field("interval", &self.interval)
            .field("phase", &self.phase)
            .field("cycles", &self.cycles)
            .finish_non_exhaustive()
    }
}

impl Poller {
    pub fn new(table: TrackingTable, fetcher: TimelineFetcher, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            table,
            fetcher,
            notifier,
            retry: RetryPolicy::default(),
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            phase: Phase::Priming,
            cycles: 0,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn table(&self) -> &TrackingTable {
        &self.table
    }

    pub fn account(&self, id: &UserId) -> Option<&TrackedAccount> {
        self.table.get(id)
    }

    /// One sweep over every tracked account, in table order. A failure on one
    /// account never stops the others.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let phase = self.phase;
        let mut report = CycleReport::default();

        for (id, acc) in self.table.iter_mut() {
            let outcome =
                poll_account(&self.fetcher, self.notifier.as_ref(), self.retry, acc).await;
            tracing::debug!(
                target: "poller",
                handle = %acc.handle,
                cursor = ?acc.cursor,
                ?outcome,
                "account polled"
            );
            report.outcomes.push((id.clone(), outcome));
        }

        self.cycles += 1;
        if phase == Phase::Priming {
            self.phase = Phase::Steady;
            tracing::info!(target: "poller", "priming sweep finished, delivery enabled");
        }

        let active = self.active_accounts();
        counter!("poll_cycles_total").increment(1);
        gauge!("poll_tracked_accounts").set(active as f64);
        gauge!("poll_last_cycle_ts").set(chrono::Utc::now().timestamp() as f64);
        tracing::info!(
            target: "poller",
            cycle = self.cycles,
            ?phase,
            accounts = report.outcomes.len(),
            active,
            delivered = report.delivered(),
            "sweep finished"
        );
        report
    }

    fn active_accounts(&self) -> usize {
        self.table.values().filter(|a| !a.disabled).count()
    }

    /// Configured interval, raised when needed so a sweep stays inside the request budget.
    pub async fn effective_interval(&self) -> Duration {
        let floor = self.fetcher.min_sweep_interval(self.active_accounts()).await;
        if floor > self.interval {
            tracing::warn!(
                target: "poller",
                configured_secs = self.interval.as_secs(),
                floor_secs = floor.as_secs(),
                "poll interval raised to stay within the rate limit"
            );
            floor
        } else {
            self.interval
        }
    }

    /// Sweep, sleep, repeat. `shutdown` is only observed while sleeping,
    /// so a sweep is never interrupted between fetch and cursor update.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            self.run_cycle().await;
            let wait = self.effective_interval().await;
            tracing::info!(target: "poller", wait_secs = wait.as_secs(), "sleeping until next sweep");
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = &mut shutdown => {
                    tracing::info!(target: "poller", cycles = self.cycles, "shutdown requested, stopping");
                    return;
                }
            }
        }
    }
}

async fn poll_account(
    fetcher: &TimelineFetcher,
    notifier: &dyn Notifier,
    retry: RetryPolicy,
    acc: &mut TrackedAccount,
) -> AccountOutcome {
    if acc.disabled {
        return AccountOutcome::Inactive;
    }

    // Unprimed accounts always take the baseline path, whatever the cursor.
    let since = if acc.primed { acc.cursor.clone() } else { None };
    let user_id = acc.user_id.clone();
    let label = format!("timeline @{}", acc.handle);

    let fetched = retry_transient(retry, &label, || fetcher.fetch(&user_id, since.as_ref())).await;
    let timeline = match fetched {
        Ok(t) => t,
        Err(e @ FetchError::Transient { .. }) => {
            counter!("poll_fetch_errors_total", "kind" => e.kind()).increment(1);
            tracing::warn!(
                target: "poller",
                handle = %acc.handle,
                error = %e,
                "fetch still failing after retries, skipping account this sweep"
            );
            return AccountOutcome::SkippedTransient;
        }
        Err(e @ FetchError::Fatal { .. }) => {
            counter!("poll_fetch_errors_total", "kind" => e.kind()).increment(1);
            tracing::error!(
                target: "poller",
                handle = %acc.handle,
                error = %e,
                "fatal fetch failure, account disabled for this run"
            );
            acc.disabled = true;
            return AccountOutcome::Disabled;
        }
    };

    if !acc.primed {
        acc.advance_cursor(timeline.newest_id());
        acc.primed = true;
        tracing::info!(
            target: "poller",
            handle = %acc.handle,
            cursor = ?acc.cursor,
            "baseline cursor recorded"
        );
        return AccountOutcome::Primed;
    }

    if timeline.posts.is_empty() {
        acc.advance_cursor(timeline.newest_id());
        tracing::debug!(target: "poller", handle = %acc.handle, "no new posts");
        return AccountOutcome::NoNewPosts;
    }

    let fetched = timeline.posts.len();
    counter!("poll_posts_fetched_total").increment(fetched as u64);
    let matched = filter_posts(&timeline.posts, &acc.keywords);
    if matched.is_empty() {
        acc.advance_cursor(timeline.newest_id());
        tracing::debug!(target: "poller", handle = %acc.handle, fetched, "no keyword matches");
        return AccountOutcome::NoMatches { fetched };
    }

    counter!("poll_matches_total").increment(matched.len() as u64);
    match notifier.deliver(&acc.handle, &matched).await {
        Ok(()) => {
            counter!("poll_deliveries_total").increment(1);
            acc.advance_cursor(timeline.newest_id());
            tracing::info!(
                target: "poller",
                handle = %acc.handle,
                fetched,
                matched = matched.len(),
                cursor = ?acc.cursor,
                notifier = notifier.name(),
                "matches delivered"
            );
            AccountOutcome::Delivered {
                fetched,
                matched: matched.len(),
            }
        }
        Err(e) => {
            counter!("poll_delivery_errors_total").increment(1);
            tracing::warn!(
                target: "poller",
                handle = %acc.handle,
                error = %e,
                cursor = ?acc.cursor,
                "delivery failed, cursor held for retry next sweep"
            );
            AccountOutcome::DeliveryFailed {
                matched: matched.len(),
            }
        }
    }
}
