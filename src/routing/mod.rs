//! Routing bridge: hands answered parallel-mode calls to the external
//! task-routing workflow and folds assignment callbacks back onto the queue.
//!
//! Cross-callback correlation travels as a typed payload serialized into the
//! routing task's attributes, and is schema-validated on the way back in.
//! A malformed or missing payload is a recoverable routing error answered
//! with a `reject` instruction, never a crash.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Correlation payload attached to every routing task we create.
///
/// `channel` is fixed to `"voice"` today; it travels so the routing
/// workflow can partition tasks if other channels are added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCorrelation {
    pub tenant_id: String,
    pub campaign_id: String,
    pub queue_item_id: String,
    pub channel: String,
}

impl TaskCorrelation {
    pub fn voice(tenant_id: &str, campaign_id: &str, queue_item_id: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            campaign_id: campaign_id.to_string(),
            queue_item_id: queue_item_id.to_string(),
            channel: "voice".to_string(),
        }
    }

    /// Serialize for embedding in the routing task's attribute bag
    pub fn to_attributes(&self) -> String {
        // Serialization of a plain struct of strings cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parse and validate correlation attributes from an assignment callback.
    ///
    /// Returns `None` for absent, malformed, or incomplete payloads; the
    /// caller answers with a reject instruction in that case.
    pub fn from_attributes(raw: &str) -> Option<Self> {
        let parsed: TaskCorrelation = match serde_json::from_str(raw) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "unparseable task attributes on assignment callback");
                return None;
            }
        };
        if parsed.tenant_id.is_empty()
            || parsed.campaign_id.is_empty()
            || parsed.queue_item_id.is_empty()
        {
            warn!("incomplete task correlation on assignment callback");
            return None;
        }
        Some(parsed)
    }
}

/// Assignment callback payload from the routing provider
#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentEvent {
    pub task_sid: String,
    pub assignment_sid: String,
    pub worker_sid: String,
    /// Opaque attribute bag carrying the serialized [`TaskCorrelation`]
    pub task_attributes: String,
}

/// Instruction returned to the routing provider for an assignment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentReply {
    pub instruction: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_work_activity_sid: Option<String>,
}

impl AssignmentReply {
    /// Connect the call to the assigned worker
    pub fn dequeue(from: Option<String>, post_work_activity_sid: Option<String>) -> Self {
        Self { instruction: "dequeue", from, post_work_activity_sid }
    }

    /// Correlation failed; do not leave the call hanging on a dead reservation
    pub fn reject() -> Self {
        Self { instruction: "reject", from: None, post_work_activity_sid: None }
    }
}

/// Call-control document for a sequential ("power") call: bridge to the
/// agent's number when known, otherwise announce and hang up.
pub fn power_voice_document(dial_to: Option<&str>, message: Option<&str>) -> String {
    match dial_to {
        Some(to) => format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Response>\n  <Dial>{}</Dial>\n</Response>",
            xml_escape(to)
        ),
        None => {
            let say = message.unwrap_or("Please hold while we connect you.");
            format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Response>\n  <Say>{}</Say>\n  <Hangup/>\n</Response>",
                xml_escape(say)
            )
        }
    }
}

/// Call-control document for a parallel-mode call: enqueue the answered lead
/// into the routing workflow, attaching the correlation payload.
pub fn parallel_voice_document(
    workflow_sid: &str,
    correlation: &TaskCorrelation,
    waiting_message: Option<&str>,
) -> String {
    let say = match waiting_message {
        Some(msg) => format!("  <Say>{}</Say>\n", xml_escape(msg)),
        None => String::new(),
    };
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Response>\n{}  <Enqueue workflowSid=\"{}\">\n    <Task>{}</Task>\n  </Enqueue>\n</Response>",
        say,
        xml_escape(workflow_sid),
        xml_escape(&correlation.to_attributes())
    )
}

/// Fallback document when rendering fails: hang up rather than stall the call
pub fn hangup_document() -> String {
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Response><Hangup/></Response>".to_string()
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_round_trips_through_attributes() {
        let corr = TaskCorrelation::voice("t-1", "c-1", "q-1");
        let raw = corr.to_attributes();
        assert_eq!(TaskCorrelation::from_attributes(&raw), Some(corr));
    }

    #[test]
    fn malformed_attributes_are_rejected_not_fatal() {
        assert_eq!(TaskCorrelation::from_attributes("not json"), None);
        assert_eq!(TaskCorrelation::from_attributes("{}"), None);
        assert_eq!(
            TaskCorrelation::from_attributes(r#"{"tenant_id":"","campaign_id":"c","queue_item_id":"q","channel":"voice"}"#),
            None
        );
    }

    #[test]
    fn parallel_document_embeds_workflow_and_correlation() {
        let corr = TaskCorrelation::voice("t-1", "c-1", "q-1");
        let doc = parallel_voice_document("WF123", &corr, Some("One moment"));
        assert!(doc.contains("workflowSid=\"WF123\""));
        assert!(doc.contains("<Say>One moment</Say>"));
        assert!(doc.contains("q-1"));
    }

    #[test]
    fn power_document_dials_when_target_known() {
        let doc = power_voice_document(Some("+15551230000"), None);
        assert!(doc.contains("<Dial>+15551230000</Dial>"));
        let doc = power_voice_document(None, None);
        assert!(doc.contains("<Hangup/>"));
    }

    #[test]
    fn reply_serialization_omits_unset_fields() {
        let reply = AssignmentReply::reject();
        let json = serde_json::to_string(&reply).unwrap();
        assert_eq!(json, r#"{"instruction":"reject"}"#);
    }
}
