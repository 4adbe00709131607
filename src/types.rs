//! Core domain types for the dispatch queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate a new opaque identifier
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Queue item lifecycle state.
///
/// `queued -> in_progress -> done`; `done` is terminal. The administrative
/// reset back to `queued` is a distinct audited override, not a transition
/// of this state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    Queued,
    InProgress,
    Done,
}

impl QueueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "in_progress" => Some(Self::InProgress),
            "done" => Some(Self::Done),
            _ => None,
        }
    }
}

/// Dispatch strategy that claimed an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialMode {
    /// Strictly sequential dispatch, one lead at a time
    Power,
    /// Bounded-concurrency dispatch grouped by a parallel run
    Parallel,
}

impl DialMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Power => "power",
            Self::Parallel => "parallel",
        }
    }
}

/// Terminal call outcome. Once set it never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallOutcome {
    Completed,
    Busy,
    Failed,
    NoAnswer,
    Canceled,
}

impl CallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Busy => "busy",
            Self::Failed => "failed",
            Self::NoAnswer => "no-answer",
            Self::Canceled => "canceled",
        }
    }
}

/// One lead's pending/in-flight/completed dial attempt within a campaign.
///
/// Full row shape of `dialer_queue`; lifecycle columns are kept as raw
/// strings at this layer, with typed accessors for callers that need them.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct QueueItem {
    pub id: String,
    pub tenant_id: String,
    pub campaign_id: String,
    pub lead_id: String,
    pub position: i64,
    pub state: String,
    pub attempts: i64,
    pub dial_mode: Option<String>,
    pub parallel_run_id: Option<String>,
    pub call_sid: Option<String>,
    pub task_sid: Option<String>,
    pub reservation_sid: Option<String>,
    pub worker_sid: Option<String>,
    pub outcome: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub waiting_started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueueItem {
    pub fn queue_state(&self) -> Option<QueueState> {
        QueueState::parse(&self.state)
    }
}

/// A queue item freshly claimed by a dispatcher, joined with the lead's
/// dial target so the orchestrator never re-queries inside the dispatch path.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct ClaimedItem {
    #[sqlx(rename = "id")]
    #[serde(rename = "queue_id")]
    pub queue_id: String,
    pub lead_id: String,
    pub position: i64,
    pub attempts: i64,
    pub phone_e164: String,
    pub full_name: Option<String>,
}

/// One invocation of the bounded-concurrency strategy
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct ParallelRun {
    pub id: String,
    pub tenant_id: String,
    pub campaign_id: String,
    pub concurrency: i64,
    pub dial_ratio: f64,
    pub status: String,
    pub started_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_state_round_trips() {
        for state in [QueueState::Queued, QueueState::InProgress, QueueState::Done] {
            assert_eq!(QueueState::parse(state.as_str()), Some(state));
        }
        assert_eq!(QueueState::parse("ringing"), None);
    }

    #[test]
    fn outcome_strings_match_provider_vocabulary() {
        assert_eq!(CallOutcome::NoAnswer.as_str(), "no-answer");
        assert_eq!(CallOutcome::Completed.as_str(), "completed");
    }
}
