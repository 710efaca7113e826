// src/mock.rs
//! In-memory doubles for the external capabilities, shared by tests and local runs.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::error::{CacheError, DeliveryError, FetchError};
use crate::identity::cache::{IdentityMap, IdentityStore};
use crate::notify::Notifier;
use crate::timeline::types::{
    PageRequest, Post, PostId, ResolvedUser, TimelineApi, TimelineMeta, TimelinePage, UserId,
};

/// Build a post with the given id and text.
pub fn post(id: &str, text: &str) -> Post {
    Post {
        id: PostId::from(id),
        text: text.to_string(),
        created_at: None,
    }
}

/// A page whose metadata matches its posts (newest first), with an optional continuation.
pub fn page(posts: Vec<Post>, next_token: Option<&str>) -> TimelinePage {
    let meta = TimelineMeta {
        result_count: posts.len() as u32,
        newest_id: posts.iter().map(|p| p.id.clone()).max(),
        oldest_id: posts.iter().map(|p| p.id.clone()).min(),
        next_token: next_token.map(str::to_string),
        previous_token: None,
    };
    TimelinePage { meta, posts }
}

/// A recorded timeline request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub user_id: UserId,
    pub since: Option<PostId>,
    pub page_size: u32,
    pub pagination_token: Option<String>,
}

/// Scripted API: each user has a queue of page results consumed in order.
/// An exhausted queue answers with an empty page.
#[derive(Default)]
pub struct ScriptedApi {
    users: Mutex<HashMap<String, UserId>>,
    lookup_failures: Mutex<VecDeque<FetchError>>,
    pages: Mutex<HashMap<UserId, VecDeque<Result<TimelinePage, FetchError>>>>,
    pub lookups: Mutex<Vec<Vec<String>>>,
    pub requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, handle: &str, id: &str) -> Self {
        self.users
            .lock()
            .unwrap()
            .insert(handle.to_lowercase(), UserId::from(id));
        self
    }

    pub fn fail_next_lookup(&self, err: FetchError) {
        self.lookup_failures.lock().unwrap().push_back(err);
    }

    pub fn push_page(&self, id: &str, result: Result<TimelinePage, FetchError>) {
        self.pages
            .lock()
            .unwrap()
            .entry(UserId::from(id))
            .or_default()
            .push_back(result);
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookups.lock().unwrap().len()
    }

    pub fn requests_for(&self, id: &str) -> Vec<RecordedRequest> {
        let uid = UserId::from(id);
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == uid)
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl TimelineApi for ScriptedApi {
    async fn lookup_users(&self, handles: &[String]) -> Result<Vec<ResolvedUser>, FetchError> {
        self.lookups.lock().unwrap().push(handles.to_vec());
        if let Some(err) = self.lookup_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        let users = self.users.lock().unwrap();
        Ok(handles
            .iter()
            .filter_map(|h| {
                users.get(&h.to_lowercase()).map(|id| ResolvedUser {
                    id: id.clone(),
                    username: h.clone(),
                })
            })
            .collect())
    }

    async fn fetch_page(&self, req: &PageRequest<'_>) -> Result<TimelinePage, FetchError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            user_id: req.user_id.clone(),
            since: req.since.cloned(),
            page_size: req.page_size,
            pagination_token: req.pagination_token.map(str::to_string),
        });
        self.pages
            .lock()
            .unwrap()
            .get_mut(req.user_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(TimelinePage::default()))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Records every delivery; can be told to fail the next N calls.
#[derive(Default)]
pub struct RecordingNotifier {
    pub deliveries: Mutex<Vec<(String, Vec<Post>)>>,
    failures_left: Mutex<u32>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, n: u32) {
        *self.failures_left.lock().unwrap() = n;
    }

    pub fn delivered(&self) -> Vec<(String, Vec<Post>)> {
        self.deliveries.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, handle: &str, posts: &[Post]) -> Result<(), DeliveryError> {
        {
            let mut left = self.failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(DeliveryError::Send {
                    receiver: "mock".into(),
                    reason: "scripted failure".into(),
                });
            }
        }
        self.deliveries
            .lock()
            .unwrap()
            .push((handle.to_string(), posts.to_vec()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Identity store kept in memory.
#[derive(Default)]
pub struct MemoryStore {
    pub map: Mutex<IdentityMap>,
    pub persists: Mutex<u32>,
}

impl MemoryStore {
    pub fn with_entries(entries: &[(&str, &str)]) -> Self {
        let map = entries
            .iter()
            .map(|(h, id)| (h.to_string(), UserId::from(*id)))
            .collect();
        Self {
            map: Mutex::new(map),
            persists: Mutex::new(0),
        }
    }
}

impl IdentityStore for MemoryStore {
    fn load(&self) -> Result<IdentityMap, CacheError> {
        Ok(self.map.lock().unwrap().clone())
    }

    fn persist(&self, map: &IdentityMap) -> Result<(), CacheError> {
        *self.map.lock().unwrap() = map.clone();
        *self.persists.lock().unwrap() += 1;
        Ok(())
    }
}
