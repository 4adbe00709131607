//! HTTP surface for the dialer engine.
//!
//! Two kinds of routes live here with very different error contracts:
//!
//! - **Dispatch API** (`/dialer/*`): structured JSON envelopes mirroring the
//!   operator tooling, `{ ok: true, ... }` on success and `{ ok: false,
//!   error }` with a meaningful status on failure.
//! - **Provider webhooks** (`/voice/status`, `/routing/assignment`): always
//!   acknowledged successfully. Surfacing an error to the provider would
//!   trigger duplicate-delivery retries that compound rather than resolve
//!   the problem, so internal failures are logged and swallowed.
//!
//! Session auth is an external collaborator; tenant identity arrives in the
//! request payload.

use std::sync::Arc;

use axum::extract::{Form, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::error::Result;
use crate::orchestrator::DialerEngine;
use crate::reconciler::StatusEvent;
use crate::routing::{self, AssignmentEvent, AssignmentReply};

/// Build the API router over a shared engine
pub fn router(engine: Arc<DialerEngine>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/dialer/enqueue", post(enqueue))
        .route("/dialer/next", post(dispatch_next))
        .route("/dialer/next_and_call", post(dispatch_next_and_call))
        .route("/dialer/parallel/start", post(parallel_start))
        .route("/dialer/reset", post(reset_in_progress))
        .route("/voice/twiml", get(power_twiml))
        .route("/voice/parallel/twiml", get(parallel_twiml))
        .route("/voice/status", post(voice_status))
        .route("/routing/assignment", post(routing_assignment))
        .with_state(engine)
}

/// Bind and serve until the task is aborted
pub async fn serve(engine: Arc<DialerEngine>, listen_addr: &str) -> Result<()> {
    let app = router(engine);
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .map_err(|e| crate::error::DialerError::configuration(format!("bind {listen_addr}: {e}")))?;
    info!("📞 dialer API listening on {listen_addr}");
    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::DialerError::configuration(format!("server error: {e}")))?;
    Ok(())
}

// ---- dispatch API ----------------------------------------------------------

#[derive(Debug, Deserialize)]
struct EnqueueRequest {
    tenant_id: String,
    campaign_id: String,
    #[serde(default)]
    lead_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DispatchRequest {
    tenant_id: String,
    campaign_id: String,
}

#[derive(Debug, Deserialize)]
struct ParallelStartRequest {
    tenant_id: String,
    campaign_id: String,
    concurrency: Option<u32>,
    dial_ratio: Option<f64>,
    started_by: Option<String>,
}

async fn health(State(engine): State<Arc<DialerEngine>>) -> Result<Json<serde_json::Value>> {
    engine.database().ping().await?;
    Ok(Json(json!({ "ok": true })))
}

async fn enqueue(
    State(engine): State<Arc<DialerEngine>>,
    Json(req): Json<EnqueueRequest>,
) -> Result<Json<serde_json::Value>> {
    let inserted = engine
        .enqueue(&req.tenant_id, &req.campaign_id, &req.lead_ids)
        .await?;
    Ok(Json(json!({ "ok": true, "inserted": inserted })))
}

async fn dispatch_next(
    State(engine): State<Arc<DialerEngine>>,
    Json(req): Json<DispatchRequest>,
) -> Result<Json<serde_json::Value>> {
    let next = engine.dispatch_next(&req.tenant_id, &req.campaign_id).await?;
    Ok(Json(json!({ "ok": true, "next": next })))
}

async fn dispatch_next_and_call(
    State(engine): State<Arc<DialerEngine>>,
    Json(req): Json<DispatchRequest>,
) -> Result<Json<serde_json::Value>> {
    match engine
        .dispatch_next_and_call(&req.tenant_id, &req.campaign_id)
        .await?
    {
        Some(dispatched) => Ok(Json(json!({
            "ok": true,
            "next": dispatched.item,
            "call_sid": dispatched.call_sid,
        }))),
        None => Ok(Json(json!({ "ok": true, "next": null }))),
    }
}

async fn parallel_start(
    State(engine): State<Arc<DialerEngine>>,
    Json(req): Json<ParallelStartRequest>,
) -> Result<Json<serde_json::Value>> {
    let report = engine
        .start_parallel_run(
            &req.tenant_id,
            &req.campaign_id,
            req.concurrency,
            req.dial_ratio,
            req.started_by.as_deref(),
        )
        .await?;
    Ok(Json(json!({
        "ok": true,
        "run_id": report.run_id,
        "picked": report.picked,
        "launched": report.launched,
        "errors": report.errors,
    })))
}

async fn reset_in_progress(
    State(engine): State<Arc<DialerEngine>>,
    Json(req): Json<DispatchRequest>,
) -> Result<Json<serde_json::Value>> {
    let reset = engine
        .reset_in_progress(&req.tenant_id, &req.campaign_id)
        .await?;
    Ok(Json(json!({ "ok": true, "reset": reset })))
}

// ---- voice documents -------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PowerTwimlQuery {
    #[serde(rename = "To", default)]
    to: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ParallelTwimlQuery {
    #[serde(default)]
    tenant_id: String,
    #[serde(default)]
    campaign_id: String,
    #[serde(default)]
    queue_id: String,
}

fn xml(body: String) -> Response {
    ([(header::CONTENT_TYPE, "text/xml")], body).into_response()
}

async fn power_twiml(query: Option<Query<PowerTwimlQuery>>) -> Response {
    let to = query.as_ref().and_then(|q| q.to.as_deref());
    xml(routing::power_voice_document(to, None))
}

async fn parallel_twiml(
    State(engine): State<Arc<DialerEngine>>,
    query: Option<Query<ParallelTwimlQuery>>,
) -> Response {
    let Some(Query(q)) = query else {
        return xml(routing::hangup_document());
    };
    match engine
        .parallel_voice_document(&q.tenant_id, &q.campaign_id, &q.queue_id)
        .await
    {
        Ok(doc) => xml(doc),
        Err(e) => {
            // Degrade to a hangup rather than stalling the answered call
            error!(error = %e, "parallel voice document failed");
            xml(routing::hangup_document())
        }
    }
}

// ---- provider webhooks -----------------------------------------------------

#[derive(Debug, Deserialize)]
struct StatusQuery {
    #[serde(default)]
    queue_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct StatusForm {
    #[serde(rename = "CallSid", default)]
    call_sid: Option<String>,
    #[serde(rename = "CallStatus", default)]
    call_status: Option<String>,
}

/// Provider status callback. Acknowledges unconditionally: the provider
/// retries on non-2xx, and duplicate deliveries have billing-relevant side
/// effects upstream.
async fn voice_status(
    State(engine): State<Arc<DialerEngine>>,
    query: Option<Query<StatusQuery>>,
    form: Option<Form<StatusForm>>,
) -> Json<serde_json::Value> {
    let queue_id = query.map(|Query(q)| q.queue_id).unwrap_or_default();
    let form = form.map(|Form(f)| f).unwrap_or_default();

    if queue_id.is_empty() {
        error!("status callback without queue_id");
        return Json(json!({ "ok": false }));
    }

    let event = StatusEvent {
        queue_item_id: queue_id,
        call_sid: form.call_sid,
        raw_status: form.call_status.unwrap_or_default(),
    };

    match engine.record_call_status(&event).await {
        Ok(()) => Json(json!({ "ok": true })),
        Err(e) => {
            error!(queue_id = %event.queue_item_id, error = %e, "status reconciliation failed");
            Json(json!({ "ok": false }))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct AssignmentForm {
    #[serde(rename = "TaskSid", default)]
    task_sid: Option<String>,
    #[serde(rename = "ReservationSid", default)]
    reservation_sid: Option<String>,
    #[serde(rename = "WorkerSid", default)]
    worker_sid: Option<String>,
    #[serde(rename = "TaskAttributes", default)]
    task_attributes: Option<String>,
}

/// Routing assignment callback. Always 200; a failed correlation answers
/// with a reject instruction instead of an error.
async fn routing_assignment(
    State(engine): State<Arc<DialerEngine>>,
    form: Option<Form<AssignmentForm>>,
) -> Json<AssignmentReply> {
    let Some(Form(form)) = form else {
        return Json(AssignmentReply::reject());
    };
    let (Some(task_sid), Some(reservation_sid), Some(worker_sid)) =
        (form.task_sid, form.reservation_sid, form.worker_sid)
    else {
        return Json(AssignmentReply::reject());
    };

    let event = AssignmentEvent {
        task_sid,
        assignment_sid: reservation_sid,
        worker_sid,
        task_attributes: form.task_attributes.unwrap_or_default(),
    };
    Json(engine.handle_assignment(&event).await)
}
