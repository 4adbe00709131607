//! Callback reconciliation: folds asynchronous provider status events onto
//! queue items.
//!
//! Provider status webhooks are at-least-once and possibly out of order, so
//! everything here is expressed as an idempotent interpretation of one raw
//! status string: what outcome it maps to (if terminal) and whether it marks
//! the answer instant. The actual row update lives in
//! [`crate::database::DatabaseManager::apply_status_event`] and is a single
//! first-write-wins statement.

use serde::Deserialize;

use crate::types::CallOutcome;

/// Raw statuses the provider reports over the status callback.
/// Vocabulary: initiated | ringing | answered | in-progress | completed |
/// busy | failed | no-answer | canceled.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusEvent {
    /// Queue item the callback URL was parameterized with
    pub queue_item_id: String,
    /// Provider call identifier, recorded only if not already set
    pub call_sid: Option<String>,
    /// Raw provider status string
    pub raw_status: String,
}

/// What a raw status means for the queue item's lifecycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusInterpretation {
    /// Terminal outcome, if this status ends the call
    pub outcome: Option<CallOutcome>,
    /// Whether this status confirms the call is connecting (answer instant)
    pub answered: bool,
}

impl StatusInterpretation {
    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some()
    }
}

/// Map the provider's raw status vocabulary onto the closed outcome set.
///
/// Unknown statuses are treated as non-terminal no-ops; the provider is free
/// to grow its vocabulary without breaking reconciliation.
pub fn interpret_status(raw: &str) -> StatusInterpretation {
    let outcome = match raw {
        "completed" => Some(CallOutcome::Completed),
        "busy" => Some(CallOutcome::Busy),
        "failed" => Some(CallOutcome::Failed),
        "no-answer" => Some(CallOutcome::NoAnswer),
        "canceled" => Some(CallOutcome::Canceled),
        _ => None,
    };
    let answered = matches!(raw, "answered" | "in-progress");
    StatusInterpretation { outcome, answered }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_map_to_outcomes() {
        assert_eq!(interpret_status("completed").outcome, Some(CallOutcome::Completed));
        assert_eq!(interpret_status("busy").outcome, Some(CallOutcome::Busy));
        assert_eq!(interpret_status("failed").outcome, Some(CallOutcome::Failed));
        assert_eq!(interpret_status("no-answer").outcome, Some(CallOutcome::NoAnswer));
        assert_eq!(interpret_status("canceled").outcome, Some(CallOutcome::Canceled));
    }

    #[test]
    fn ringing_and_initiated_are_non_terminal() {
        for raw in ["initiated", "ringing", "queued", ""] {
            let interp = interpret_status(raw);
            assert!(!interp.is_terminal());
            assert!(!interp.answered);
        }
    }

    #[test]
    fn answer_statuses_mark_the_answer_instant() {
        assert!(interpret_status("answered").answered);
        assert!(interpret_status("in-progress").answered);
        assert!(!interpret_status("in-progress").is_terminal());
    }
}
