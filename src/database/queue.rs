//! Queue store and lease manager operations.
//!
//! Claiming is the core concurrency contract: a claim is one atomic
//! `UPDATE ... RETURNING` whose subselect picks the lowest-position `queued`
//! row(s), so two simultaneous claimants can never receive the same item and
//! neither blocks on the other's in-flight claim. This is the SQLite
//! rendition of the `FOR UPDATE SKIP LOCKED` read the schema was designed
//! around: already-claimed rows simply stop matching `state = 'queued'`.
//!
//! Claim transactions stay short by construction. Call placement is a slow,
//! failable network operation and always happens after the claim commits.

use chrono::Utc;
use serde_json::json;
use tracing::debug;

use super::DatabaseManager;
use crate::error::Result;
use crate::reconciler::{interpret_status, StatusEvent};
use crate::routing::TaskCorrelation;
use crate::types::{new_id, ClaimedItem, QueueItem};

impl DatabaseManager {
    /// Enqueue leads for dialing, assigning strictly increasing positions in
    /// input order. A lead already present for this (tenant, campaign) is
    /// skipped, not an error. The whole batch is one transaction.
    pub async fn enqueue(
        &self,
        tenant_id: &str,
        campaign_id: &str,
        lead_ids: &[String],
    ) -> Result<u64> {
        let mut tx = self.pool().begin().await?;

        let (max_pos,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(MAX(position), 0)
             FROM dialer_queue
             WHERE tenant_id = ?1 AND campaign_id = ?2",
        )
        .bind(tenant_id)
        .bind(campaign_id)
        .fetch_one(&mut *tx)
        .await?;

        let now = Utc::now();
        let mut pos = max_pos;
        let mut inserted = 0u64;

        for lead_id in lead_ids {
            pos += 1;
            let result = sqlx::query(
                "INSERT INTO dialer_queue
                   (id, tenant_id, campaign_id, lead_id, position, state, attempts, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'queued', 0, ?6, ?6)
                 ON CONFLICT (tenant_id, campaign_id, lead_id) DO NOTHING",
            )
            .bind(new_id())
            .bind(tenant_id)
            .bind(campaign_id)
            .bind(lead_id)
            .bind(pos)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        debug!(tenant_id, campaign_id, inserted, "enqueued leads");
        Ok(inserted)
    }

    /// Claim the lowest-position queued item for sequential ("power") dialing.
    ///
    /// Returns `None` when nothing is queued. The claimed row is atomically
    /// marked `in_progress` with `attempts` incremented before this returns;
    /// placement happens outside, against the committed row.
    pub async fn claim_next(
        &self,
        tenant_id: &str,
        campaign_id: &str,
    ) -> Result<Option<ClaimedItem>> {
        let claimed: Option<(String,)> = sqlx::query_as(
            "UPDATE dialer_queue
             SET state = 'in_progress',
                 attempts = attempts + 1,
                 dial_mode = 'power',
                 updated_at = ?3
             WHERE id = (
                 SELECT q.id
                 FROM dialer_queue q
                 JOIN leads l ON l.id = q.lead_id
                 WHERE q.tenant_id = ?1 AND q.campaign_id = ?2 AND q.state = 'queued'
                 ORDER BY q.position ASC
                 LIMIT 1
             ) AND state = 'queued'
             RETURNING id",
        )
        .bind(tenant_id)
        .bind(campaign_id)
        .bind(Utc::now())
        .fetch_optional(self.pool())
        .await?;

        let Some((queue_id,)) = claimed else {
            return Ok(None);
        };

        let item = sqlx::query_as::<_, ClaimedItem>(
            "SELECT q.id, q.lead_id, q.position, q.attempts, l.phone_e164, l.full_name
             FROM dialer_queue q
             JOIN leads l ON l.id = q.lead_id
             WHERE q.id = ?1",
        )
        .bind(&queue_id)
        .fetch_one(self.pool())
        .await?;

        debug!(tenant_id, campaign_id, queue_id = %item.queue_id, position = item.position, "claimed next item");
        Ok(Some(item))
    }

    /// Claim up to `want` queued items in position order, stamping all of
    /// them with the shared parallel run. Same atomic claim semantics as
    /// [`claim_next`](Self::claim_next). Runs inside the caller's
    /// transaction so the run row and its claims commit together.
    pub(super) async fn claim_batch_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        tenant_id: &str,
        campaign_id: &str,
        want: u32,
        run_id: &str,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE dialer_queue
             SET state = 'in_progress',
                 attempts = attempts + 1,
                 dial_mode = 'parallel',
                 parallel_run_id = ?4,
                 updated_at = ?5
             WHERE id IN (
                 SELECT q.id
                 FROM dialer_queue q
                 JOIN leads l ON l.id = q.lead_id
                 WHERE q.tenant_id = ?1 AND q.campaign_id = ?2 AND q.state = 'queued'
                 ORDER BY q.position ASC
                 LIMIT ?3
             ) AND state = 'queued'",
        )
        .bind(tenant_id)
        .bind(campaign_id)
        .bind(want as i64)
        .bind(run_id)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }

    /// Items claimed by a parallel run, joined with their dial targets
    pub async fn run_items(&self, run_id: &str) -> Result<Vec<ClaimedItem>> {
        let items = sqlx::query_as::<_, ClaimedItem>(
            "SELECT q.id, q.lead_id, q.position, q.attempts, l.phone_e164, l.full_name
             FROM dialer_queue q
             JOIN leads l ON l.id = q.lead_id
             WHERE q.parallel_run_id = ?1
             ORDER BY q.position ASC",
        )
        .bind(run_id)
        .fetch_all(self.pool())
        .await?;
        Ok(items)
    }

    /// Record the provider call handle, keeping any handle a faster path
    /// (e.g. an early status callback) already wrote.
    pub async fn record_call_sid(&self, queue_id: &str, call_sid: &str) -> Result<()> {
        sqlx::query(
            "UPDATE dialer_queue
             SET call_sid = COALESCE(call_sid, ?2), updated_at = ?3
             WHERE id = ?1",
        )
        .bind(queue_id)
        .bind(call_sid)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Compensation for a dispatch attempt that failed before a call was
    /// placed: the item must not stay `in_progress` forever.
    pub async fn mark_failed(&self, tenant_id: &str, queue_id: &str) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE dialer_queue
             SET state = 'done',
                 outcome = COALESCE(outcome, 'failed'),
                 ended_at = COALESCE(ended_at, ?3),
                 updated_at = ?3
             WHERE id = ?1 AND tenant_id = ?2",
        )
        .bind(queue_id)
        .bind(tenant_id)
        .bind(now)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Fold one provider status event onto its queue item.
    ///
    /// Every column update is first-write-wins, so replaying the same event
    /// (at-least-once delivery) is a no-op after the first application, and a
    /// late non-terminal event cannot disturb a terminal state.
    pub async fn apply_status_event(&self, event: &StatusEvent) -> Result<()> {
        let interp = interpret_status(&event.raw_status);
        let outcome = interp.outcome.map(|o| o.as_str());
        let now = Utc::now();

        sqlx::query(
            "UPDATE dialer_queue
             SET call_sid = COALESCE(call_sid, ?2),
                 started_at = CASE WHEN ?3 AND started_at IS NULL THEN ?5 ELSE started_at END,
                 ended_at = CASE WHEN ?4 AND ended_at IS NULL THEN ?5 ELSE ended_at END,
                 outcome = COALESCE(outcome, ?6),
                 state = CASE WHEN ?4 THEN 'done' ELSE state END,
                 updated_at = ?5
             WHERE id = ?1",
        )
        .bind(&event.queue_item_id)
        .bind(event.call_sid.as_deref())
        .bind(interp.answered)
        .bind(interp.is_terminal())
        .bind(now)
        .bind(outcome)
        .execute(self.pool())
        .await?;

        debug!(
            queue_id = %event.queue_item_id,
            raw_status = %event.raw_status,
            terminal = interp.is_terminal(),
            "applied status event"
        );
        Ok(())
    }

    /// Persist routing assignment handles onto the correlated queue item.
    /// First assignment wins for every column.
    pub async fn apply_assignment(
        &self,
        correlation: &TaskCorrelation,
        task_sid: &str,
        reservation_sid: &str,
        worker_sid: &str,
    ) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE dialer_queue
             SET task_sid = COALESCE(task_sid, ?4),
                 reservation_sid = COALESCE(reservation_sid, ?5),
                 worker_sid = COALESCE(worker_sid, ?6),
                 waiting_started_at = COALESCE(waiting_started_at, ?7),
                 updated_at = ?7
             WHERE tenant_id = ?1 AND campaign_id = ?2 AND id = ?3",
        )
        .bind(&correlation.tenant_id)
        .bind(&correlation.campaign_id)
        .bind(&correlation.queue_item_id)
        .bind(task_sid)
        .bind(reservation_sid)
        .bind(worker_sid)
        .bind(now)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Administrative override: push every `in_progress` item back to
    /// `queued`. Distinct from dispatch, audited in the same transaction.
    /// Intended for operators and tests, never for retry logic.
    pub async fn reset_in_progress(&self, tenant_id: &str, campaign_id: &str) -> Result<u64> {
        let now = Utc::now();
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query(
            "UPDATE dialer_queue
             SET state = 'queued',
                 dial_mode = NULL,
                 parallel_run_id = NULL,
                 updated_at = ?3
             WHERE tenant_id = ?1 AND campaign_id = ?2 AND state = 'in_progress'",
        )
        .bind(tenant_id)
        .bind(campaign_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        let reset = result.rows_affected();

        sqlx::query(
            "INSERT INTO audit_log (tenant_id, action, meta, created_at)
             VALUES (?1, 'dialer_queue_reset', ?2, ?3)",
        )
        .bind(tenant_id)
        .bind(json!({ "campaign_id": campaign_id, "reset": reset }).to_string())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(reset)
    }

    /// Fetch one queue item by id (reconciliation joins, tests)
    pub async fn get_item(&self, queue_id: &str) -> Result<Option<QueueItem>> {
        let item = sqlx::query_as::<_, QueueItem>(
            "SELECT * FROM dialer_queue WHERE id = ?1",
        )
        .bind(queue_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(item)
    }

    /// All queue items for a campaign in position order (inspection, tests)
    pub async fn list_items(&self, tenant_id: &str, campaign_id: &str) -> Result<Vec<QueueItem>> {
        let items = sqlx::query_as::<_, QueueItem>(
            "SELECT * FROM dialer_queue
             WHERE tenant_id = ?1 AND campaign_id = ?2
             ORDER BY position ASC",
        )
        .bind(tenant_id)
        .bind(campaign_id)
        .fetch_all(self.pool())
        .await?;
        Ok(items)
    }
}
