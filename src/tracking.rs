// src/tracking.rs
use std::collections::BTreeMap;

use crate::error::MissingIdentityError;
use crate::filter::KeywordSet;
use crate::identity::cache::IdentityMap;
use crate::identity::normalize_handle;
use crate::timeline::types::{PostId, UserId};

/// One requested (handle, keyword string) row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRequest {
    pub handle: String,
    pub keywords: String,
}

impl AccountRequest {
    pub fn new(handle: impl Into<String>, keywords: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            keywords: keywords.into(),
        }
    }
}

/// Per-account polling state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedAccount {
    pub user_id: UserId,
    pub handle: String,
    pub keywords: KeywordSet,
    /// Newest post id already processed. `None` until a post has been seen.
    pub cursor: Option<PostId>,
    /// Set once the baseline fetch for this account has succeeded.
    pub primed: bool,
    /// Set after a fatal fetch failure; the account is skipped for the rest of the run.
    pub disabled: bool,
}

impl TrackedAccount {
    pub fn new(user_id: UserId, handle: impl Into<String>, keywords: KeywordSet) -> Self {
        Self {
            user_id,
            handle: handle.into(),
            keywords,
            cursor: None,
            primed: false,
            disabled: false,
        }
    }

    /// Move the cursor to `candidate` if it is strictly newer. Returns whether it moved.
    pub fn advance_cursor(&mut self, candidate: Option<&PostId>) -> bool {
        match (candidate, self.cursor.as_ref()) {
            (Some(new), Some(old)) if new <= old => false,
            (Some(new), _) => {
                self.cursor = Some(new.clone());
                true
            }
            (None, _) => false,
        }
    }
}

/// Tracking state keyed by identifier, iterated in identifier order.
pub type TrackingTable = BTreeMap<UserId, TrackedAccount>;

/// Build the tracking table from requested rows and resolved identities.
///
/// Rows naming the same account (same handle, or handles resolving to the
/// same identifier) have their keyword sets merged.
pub fn build_table(
    requests: &[AccountRequest],
    identities: &IdentityMap,
    delimiter: &str,
) -> Result<TrackingTable, MissingIdentityError> {
    let mut table = TrackingTable::new();
    for req in requests {
        let handle = normalize_handle(&req.handle);
        let user_id = identities
            .get(&handle)
            .cloned()
            .ok_or_else(|| MissingIdentityError {
                handle: handle.clone(),
            })?;
        let keywords = KeywordSet::parse(&req.keywords, delimiter);

        table
            .entry(user_id.clone())
            .and_modify(|acc| acc.keywords.merge(keywords.clone()))
            .or_insert_with(|| TrackedAccount::new(user_id, handle, keywords));
    }

    for acc in table.values().filter(|a| a.keywords.is_empty()) {
        tracing::warn!(
            target: "tracking",
            handle = %acc.handle,
            "account has no keywords; it will be polled but never notify"
        );
    }
    Ok(table)
}
