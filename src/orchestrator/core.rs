//! The dialer engine: claim-then-call orchestration over the queue store.
//!
//! Two dispatch strategies share the same discipline: the claim is a short
//! database operation that commits first, call placement happens outside it,
//! and any failure after a claim compensates the affected item to
//! `done`/`failed` so nothing is silently lost. Handlers are stateless per
//! request; the only shared mutable state is the queue table itself.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::DialerConfig;
use crate::database::DatabaseManager;
use crate::error::{DialerError, Result};
use crate::provider::{CallProvider, DialCredentials, PlaceCallRequest};
use crate::reconciler::StatusEvent;
use crate::routing::{
    self, AssignmentEvent, AssignmentReply, TaskCorrelation,
};
use crate::types::{ClaimedItem, QueueItem};

use super::types::{DispatchedCall, ItemError, ParallelRunReport};

/// Central coordinator for enqueue, dispatch, and reconciliation
pub struct DialerEngine {
    config: DialerConfig,
    db: DatabaseManager,
    provider: Arc<dyn CallProvider>,
}

impl DialerEngine {
    /// Create an engine over a fresh database connection
    pub async fn new(config: DialerConfig, provider: Arc<dyn CallProvider>) -> Result<Self> {
        config.validate()?;
        let db = DatabaseManager::new(
            &config.database.database_url,
            config.database.max_connections,
        )
        .await?;
        info!("✅ dialer engine initialized");
        Ok(Self { config, db, provider })
    }

    /// Engine over an existing database (tests, embedding)
    pub fn with_database(
        config: DialerConfig,
        db: DatabaseManager,
        provider: Arc<dyn CallProvider>,
    ) -> Self {
        Self { config, db, provider }
    }

    pub fn config(&self) -> &DialerConfig {
        &self.config
    }

    pub fn database(&self) -> &DatabaseManager {
        &self.db
    }

    /// Enqueue leads for a campaign; duplicates are skipped, not errors.
    pub async fn enqueue(
        &self,
        tenant_id: &str,
        campaign_id: &str,
        lead_ids: &[String],
    ) -> Result<u64> {
        require("tenant_id", tenant_id)?;
        require("campaign_id", campaign_id)?;
        if lead_ids.is_empty() {
            return Err(DialerError::validation("missing_lead_ids"));
        }
        self.db.enqueue(tenant_id, campaign_id, lead_ids).await
    }

    /// Claim the next queued lead without placing a call (agent-driven flow).
    /// `Ok(None)` means the queue is empty, not an error.
    pub async fn dispatch_next(
        &self,
        tenant_id: &str,
        campaign_id: &str,
    ) -> Result<Option<ClaimedItem>> {
        require("tenant_id", tenant_id)?;
        require("campaign_id", campaign_id)?;
        self.db.claim_next(tenant_id, campaign_id).await
    }

    /// Sequential strategy: claim the next lead and place the call.
    ///
    /// The claim commits before placement. If placement fails, the item is
    /// compensated to `done`/`failed` and the placement error is surfaced;
    /// compensation failures are logged, never allowed to mask the original
    /// error.
    pub async fn dispatch_next_and_call(
        &self,
        tenant_id: &str,
        campaign_id: &str,
    ) -> Result<Option<DispatchedCall>> {
        require("tenant_id", tenant_id)?;
        require("campaign_id", campaign_id)?;
        // Detectable config problems reject before anything is claimed
        self.config.callback_base_url()?;

        let Some(item) = self.db.claim_next(tenant_id, campaign_id).await? else {
            return Ok(None);
        };

        match self.place_power_call(tenant_id, &item).await {
            Ok(call_sid) => {
                if let Err(e) = self.db.record_call_sid(&item.queue_id, &call_sid).await {
                    self.compensate(tenant_id, &item.queue_id).await;
                    return Err(e);
                }
                info!(queue_id = %item.queue_id, call_sid = %call_sid, "📞 call launched");
                Ok(Some(DispatchedCall { item, call_sid }))
            }
            Err(e) => {
                self.compensate(tenant_id, &item.queue_id).await;
                Err(e)
            }
        }
    }

    /// Parallel strategy: claim a batch sized by `ceil(concurrency * ratio)`
    /// and place calls for each claimed item.
    ///
    /// One item's placement failure compensates that item and continues; a
    /// credential failure before any call compensates the whole batch.
    pub async fn start_parallel_run(
        &self,
        tenant_id: &str,
        campaign_id: &str,
        concurrency: Option<u32>,
        dial_ratio: Option<f64>,
        started_by: Option<&str>,
    ) -> Result<ParallelRunReport> {
        require("tenant_id", tenant_id)?;
        require("campaign_id", campaign_id)?;
        self.config.callback_base_url()?;

        let settings = self
            .db
            .campaign_dial_settings(tenant_id, campaign_id)
            .await?
            .ok_or_else(|| DialerError::CampaignNotFound(campaign_id.to_string()))?;

        let concurrency = concurrency
            .filter(|&c| c > 0)
            .or_else(|| u32::try_from(settings.parallel_concurrency).ok().filter(|&c| c > 0))
            .unwrap_or(self.config.dialing.default_concurrency);
        let ratio = dial_ratio
            .filter(|r| *r > 0.0)
            .unwrap_or(if settings.parallel_dial_ratio > 0.0 {
                settings.parallel_dial_ratio
            } else {
                self.config.dialing.default_dial_ratio
            });
        let want = ((concurrency as f64 * ratio).ceil() as u32).max(1);

        let (run_id, picked) = self
            .db
            .begin_parallel_run(tenant_id, campaign_id, concurrency, ratio, want, started_by)
            .await?;
        let items = self.db.run_items(&run_id).await?;

        // Credentials and caller id resolve once for the whole batch; if
        // either is missing, no item can proceed and all of them are
        // compensated.
        let (credentials, from) = match self.resolve_dialing_credentials(tenant_id).await {
            Ok(resolved) => resolved,
            Err(e) => {
                for item in &items {
                    self.compensate(tenant_id, &item.queue_id).await;
                }
                return Err(e);
            }
        };

        let base = self.config.callback_base_url()?.to_string();
        let mut launched = 0u64;
        let mut errors = Vec::new();

        for item in &items {
            // Correlation travels in the voice URL; the document built on
            // answer embeds the typed payload for the routing workflow.
            let request = PlaceCallRequest {
                to: item.phone_e164.clone(),
                from: from.clone(),
                voice_url: format!(
                    "{base}/voice/parallel/twiml?tenant_id={tenant_id}&campaign_id={campaign_id}&queue_id={}",
                    item.queue_id
                ),
                status_callback_url: format!("{base}/voice/status?queue_id={}", item.queue_id),
            };

            match self.provider.place_call(&credentials, &request).await {
                // Recording the handle is part of the per-item attempt too:
                // its failure compensates this item and the run goes on.
                Ok(call_sid) => match self.db.record_call_sid(&item.queue_id, &call_sid).await {
                    Ok(()) => launched += 1,
                    Err(e) => {
                        warn!(queue_id = %item.queue_id, error = %e, "failed to record call handle, compensating item");
                        self.compensate(tenant_id, &item.queue_id).await;
                        errors.push(ItemError {
                            queue_id: item.queue_id.clone(),
                            error: e.to_string(),
                        });
                    }
                },
                Err(e) => {
                    warn!(queue_id = %item.queue_id, error = %e, "placement failed, compensating item");
                    self.compensate(tenant_id, &item.queue_id).await;
                    errors.push(ItemError {
                        queue_id: item.queue_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            run_id = %run_id,
            picked,
            launched,
            failed = errors.len(),
            "parallel run dispatched"
        );
        Ok(ParallelRunReport { run_id, picked, launched, errors })
    }

    /// Administrative override: requeue every `in_progress` item. Audited;
    /// never part of normal dispatch or retry flow.
    pub async fn reset_in_progress(&self, tenant_id: &str, campaign_id: &str) -> Result<u64> {
        require("tenant_id", tenant_id)?;
        require("campaign_id", campaign_id)?;
        let reset = self.db.reset_in_progress(tenant_id, campaign_id).await?;
        warn!(tenant_id, campaign_id, reset, "in_progress items reset to queued");
        Ok(reset)
    }

    /// Reconcile one provider status event. Idempotent; the HTTP surface
    /// acknowledges regardless of this result.
    pub async fn record_call_status(&self, event: &StatusEvent) -> Result<()> {
        self.db.apply_status_event(event).await
    }

    /// Handle a routing assignment callback. Infallible by contract: any
    /// internal failure degrades to a `reject` instruction so the provider
    /// does not leave the call hanging on a dead reservation.
    pub async fn handle_assignment(&self, event: &AssignmentEvent) -> AssignmentReply {
        let Some(correlation) = TaskCorrelation::from_attributes(&event.task_attributes) else {
            return AssignmentReply::reject();
        };

        if let Err(e) = self
            .db
            .apply_assignment(
                &correlation,
                &event.task_sid,
                &event.assignment_sid,
                &event.worker_sid,
            )
            .await
        {
            error!(
                queue_id = %correlation.queue_item_id,
                error = %e,
                "failed to persist assignment handles"
            );
            return AssignmentReply::reject();
        }

        let from = match self.db.dial_credentials(&correlation.tenant_id).await {
            Ok(creds) => creds.and_then(|c| c.default_from_number),
            Err(e) => {
                warn!(error = %e, "credential lookup failed during assignment");
                None
            }
        };
        let post_work = match self.db.routing_config(&correlation.tenant_id).await {
            Ok(cfg) => cfg.and_then(|c| c.wrapup_activity_sid),
            Err(e) => {
                warn!(error = %e, "routing config lookup failed during assignment");
                None
            }
        };

        AssignmentReply::dequeue(from, post_work)
    }

    /// Render the call-control document for a parallel-mode call: enqueue
    /// the answered lead into the tenant's routing workflow.
    pub async fn parallel_voice_document(
        &self,
        tenant_id: &str,
        campaign_id: &str,
        queue_item_id: &str,
    ) -> Result<String> {
        let cfg = self
            .db
            .routing_config(tenant_id)
            .await?
            .ok_or_else(|| DialerError::configuration("routing_config_missing"))?;
        let waiting_message = self
            .db
            .campaign_dial_settings(tenant_id, campaign_id)
            .await?
            .and_then(|s| s.waiting_message);

        let correlation = TaskCorrelation::voice(tenant_id, campaign_id, queue_item_id);
        Ok(routing::parallel_voice_document(
            &cfg.workflow_sid,
            &correlation,
            waiting_message.as_deref(),
        ))
    }

    /// Fetch one queue item (inspection endpoints, tests)
    pub async fn get_item(&self, queue_id: &str) -> Result<Option<QueueItem>> {
        self.db.get_item(queue_id).await
    }

    async fn place_power_call(&self, tenant_id: &str, item: &ClaimedItem) -> Result<String> {
        let (credentials, from) = self.resolve_dialing_credentials(tenant_id).await?;
        let base = self.config.callback_base_url()?;

        let request = PlaceCallRequest {
            to: item.phone_e164.clone(),
            from,
            voice_url: format!("{base}/voice/twiml?queue_id={}", item.queue_id),
            status_callback_url: format!("{base}/voice/status?queue_id={}", item.queue_id),
        };
        self.provider.place_call(&credentials, &request).await
    }

    /// Tenant credentials plus the caller id; both are required before any
    /// call can be placed, so they resolve together.
    async fn resolve_dialing_credentials(
        &self,
        tenant_id: &str,
    ) -> Result<(DialCredentials, String)> {
        let credentials = self
            .db
            .dial_credentials(tenant_id)
            .await?
            .ok_or_else(|| DialerError::configuration("dial_config_missing"))?;
        let from = credentials
            .default_from_number
            .clone()
            .ok_or_else(|| DialerError::configuration("default_from_number_missing"))?;
        Ok((credentials, from))
    }

    /// Best-effort compensation: its own failure is logged, never surfaced,
    /// so it cannot mask the error that triggered it.
    async fn compensate(&self, tenant_id: &str, queue_id: &str) {
        if let Err(e) = self.db.mark_failed(tenant_id, queue_id).await {
            error!(queue_id, error = %e, "compensation failed; item may be stuck in_progress");
        }
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DialerError::validation(format!("missing_{field}")));
    }
    Ok(())
}
