// src/notify/mod.rs
pub mod email;

use crate::error::DeliveryError;
use crate::timeline::types::Post;

/// Sink for matched posts. Called at most once per account per cycle;
/// repeating a batch must not corrupt anything on the caller's side.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, handle: &str, posts: &[Post]) -> Result<(), DeliveryError>;
    fn name(&self) -> &'static str;
}

/// Logs matches instead of sending them. Used when SMTP is not configured.
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, handle: &str, posts: &[Post]) -> Result<(), DeliveryError> {
        for p in posts {
            tracing::info!(
                target: "notify",
                handle,
                post_id = %p.id,
                url = %permalink(handle, p),
                "matched post (email disabled)"
            );
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

pub fn permalink(handle: &str, post: &Post) -> String {
    format!("https://twitter.com/{handle}/status/{}", post.id)
}
