//! # Outdial
//!
//! Multi-tenant outbound dialer: a position-ordered dispatch queue that
//! hands leads to an external calling provider exactly once, tracks each
//! item through a call lifecycle driven by asynchronous status callbacks,
//! and supports both strictly sequential ("power") and bounded-concurrency
//! ("parallel") dialing without double-dispatching.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            HTTP API (axum)              │
//! │  dispatch ops │ voice docs │ webhooks   │
//! ├─────────────────────────────────────────┤
//! │            DialerEngine                 │
//! │   claim-then-call orchestration         │
//! ├──────────────────────┬──────────────────┤
//! │   DatabaseManager    │  CallProvider    │
//! │   (sqlx / SQLite)    │  (REST client)   │
//! └──────────────────────┴──────────────────┘
//! ```
//!
//! The queue store is the only shared mutable state. Claims are atomic
//! single-statement updates, so concurrent dispatchers partition the head
//! of the queue instead of contending for it, and call placement never
//! happens inside a claim transaction. Provider status and assignment
//! webhooks are reconciled idempotently and always acknowledged.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use outdial::config::DialerConfig;
//! use outdial::orchestrator::DialerEngine;
//! use outdial::provider::HttpCallProvider;
//!
//! # async fn example() -> outdial::Result<()> {
//! let mut config = DialerConfig::default();
//! config.general.public_base_url = "https://dialer.example.com".to_string();
//!
//! let provider = Arc::new(HttpCallProvider::new(None));
//! let engine = Arc::new(DialerEngine::new(config, provider).await?);
//!
//! engine.enqueue("tenant-1", "campaign-1", &["lead-1".to_string()]).await?;
//! if let Some(dispatched) = engine.dispatch_next_and_call("tenant-1", "campaign-1").await? {
//!     println!("dialing {} (call {})", dispatched.item.phone_e164, dispatched.call_sid);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod orchestrator;
pub mod provider;
pub mod reconciler;
pub mod routing;
pub mod server;
pub mod types;

pub use config::DialerConfig;
pub use database::DatabaseManager;
pub use error::{DialerError, Result};
pub use orchestrator::{DialerEngine, DispatchedCall, ParallelRunReport};
pub use provider::{CallProvider, DialCredentials, HttpCallProvider, PlaceCallRequest};
pub use reconciler::StatusEvent;
pub use routing::{AssignmentEvent, AssignmentReply, TaskCorrelation};
pub use types::{CallOutcome, ClaimedItem, DialMode, ParallelRun, QueueItem, QueueState};

/// Commonly used imports
pub mod prelude {
    pub use crate::config::DialerConfig;
    pub use crate::database::DatabaseManager;
    pub use crate::error::{DialerError, Result};
    pub use crate::orchestrator::{DialerEngine, DispatchedCall, ParallelRunReport};
    pub use crate::provider::{CallProvider, DialCredentials, PlaceCallRequest};
    pub use crate::reconciler::StatusEvent;
    pub use crate::routing::{AssignmentEvent, AssignmentReply, TaskCorrelation};
    pub use crate::types::{CallOutcome, ClaimedItem, DialMode, QueueItem, QueueState};
}
