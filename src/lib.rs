// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod accounts;
pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod identity;
pub mod mock;
pub mod notify;
pub mod poller;
pub mod retry;
pub mod telemetry;
pub mod timeline;
pub mod tracking;

// ---- Re-exports for stable public API ----
pub use crate::context::AppContext;
pub use crate::error::{DeliveryError, FetchError, MissingIdentityError, ResolutionError};
pub use crate::poller::{AccountOutcome, Phase, Poller};
pub use crate::timeline::types::{Post, PostId, UserId};
