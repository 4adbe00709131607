//! Result types returned by dispatch operations.

use serde::Serialize;

use crate::types::ClaimedItem;

/// A sequential dispatch that placed a call
#[derive(Debug, Clone, Serialize)]
pub struct DispatchedCall {
    pub item: ClaimedItem,
    pub call_sid: String,
}

/// Outcome of one bounded-concurrency dispatch invocation.
///
/// `picked` counts items claimed; `launched` counts calls actually placed.
/// The difference is accounted for in `errors`, one entry per item whose
/// placement failed (those items were compensated to `done`/`failed`).
#[derive(Debug, Clone, Serialize)]
pub struct ParallelRunReport {
    pub run_id: String,
    pub picked: u64,
    pub launched: u64,
    pub errors: Vec<ItemError>,
}

/// Per-item placement failure within a parallel run
#[derive(Debug, Clone, Serialize)]
pub struct ItemError {
    pub queue_id: String,
    pub error: String,
}
