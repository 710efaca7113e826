// src/context.rs
use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::AppConfig;
use crate::identity::cache::{IdentityStore, JsonFileStore};
use crate::identity::IdentityResolver;
use crate::notify::email::EmailNotifier;
use crate::notify::{LogNotifier, Notifier};
use crate::poller::Poller;
use crate::retry::RetryPolicy;
use crate::timeline::budget::{RequestBudget, RATE_WINDOW};
use crate::timeline::twitter::TwitterClient;
use crate::timeline::types::TimelineApi;
use crate::timeline::TimelineFetcher;
use crate::tracking::{build_table, AccountRequest};

/// Everything the run needs, built once at startup and passed down explicitly.
pub struct AppContext {
    pub api: Arc<dyn TimelineApi>,
    pub notifier: Arc<dyn Notifier>,
    pub store: Box<dyn IdentityStore>,
    pub retry: RetryPolicy,
    pub budget: RequestBudget,
    pub poll_interval: std::time::Duration,
    pub keyword_delimiter: String,
}

impl AppContext {
    /// Production wiring: HTTP client, SMTP (or log) notifier, JSON cache file.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let client = TwitterClient::new(&cfg.api_base, &cfg.bearer_token)
            .context("building HTTP client")?;
        let api: Arc<dyn TimelineApi> = Arc::new(client);

        let notifier: Arc<dyn Notifier> = match &cfg.smtp {
            Some(smtp) => Arc::new(EmailNotifier::from_config(smtp).context("email notifier")?),
            None => {
                tracing::warn!("SMTP not configured; matches will only be logged");
                Arc::new(LogNotifier)
            }
        };

        Ok(Self {
            api,
            notifier,
            store: Box::new(JsonFileStore::new(&cfg.cache_path)),
            retry: cfg.retry,
            budget: RequestBudget::new(cfg.rate_limit_requests, RATE_WINDOW),
            poll_interval: cfg.poll_interval,
            keyword_delimiter: cfg.keyword_delimiter.clone(),
        })
    }

    /// Resolve identities, persist the cache, and build a ready poller.
    /// Any unresolved handle aborts: there is no partial tracking table.
    pub async fn bootstrap(self, requests: &[AccountRequest]) -> Result<Poller> {
        let cache = self.store.load().context("loading identity cache")?;
        let mut resolver = IdentityResolver::new(self.api.clone(), cache).with_retry(self.retry);

        let handles: BTreeSet<String> = requests.iter().map(|r| r.handle.clone()).collect();
        let identities = resolver
            .resolve(&handles)
            .await
            .context("resolving account handles")?;
        resolver
            .persist(self.store.as_ref())
            .context("persisting identity cache")?;

        let table = build_table(requests, &identities, &self.keyword_delimiter)
            .context("building tracking table")?;
        tracing::info!(accounts = table.len(), "tracking table ready");

        let fetcher = TimelineFetcher::new(self.api, self.budget);
        Ok(Poller::new(table, fetcher, self.notifier)
            .with_retry(self.retry)
            .with_interval(self.poll_interval))
    }
}
