//! Parallel run bookkeeping and campaign dial settings.

use chrono::Utc;
use tracing::debug;

use super::DatabaseManager;
use crate::error::Result;
use crate::types::{new_id, ParallelRun};

/// Campaign-level dial configuration consumed by the parallel strategy
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct CampaignDialSettings {
    pub parallel_concurrency: i64,
    pub parallel_dial_ratio: f64,
    pub waiting_message: Option<String>,
}

impl DatabaseManager {
    /// Dial settings for a campaign, or `None` when the campaign does not
    /// exist for this tenant.
    pub async fn campaign_dial_settings(
        &self,
        tenant_id: &str,
        campaign_id: &str,
    ) -> Result<Option<CampaignDialSettings>> {
        let settings = sqlx::query_as::<_, CampaignDialSettings>(
            "SELECT parallel_concurrency, parallel_dial_ratio, waiting_message
             FROM campaigns
             WHERE id = ?1 AND tenant_id = ?2",
        )
        .bind(campaign_id)
        .bind(tenant_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(settings)
    }

    /// Create a parallel run and claim its batch in one transaction: the run
    /// row and the claims it owns commit together, before any call is placed.
    ///
    /// Returns the run id and the number of items claimed.
    pub async fn begin_parallel_run(
        &self,
        tenant_id: &str,
        campaign_id: &str,
        concurrency: u32,
        dial_ratio: f64,
        want: u32,
        started_by: Option<&str>,
    ) -> Result<(String, u64)> {
        let run_id = new_id();
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            "INSERT INTO dialer_parallel_runs
               (id, tenant_id, campaign_id, concurrency, dial_ratio, status, started_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'running', ?6, ?7)",
        )
        .bind(&run_id)
        .bind(tenant_id)
        .bind(campaign_id)
        .bind(concurrency as i64)
        .bind(dial_ratio)
        .bind(started_by)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let picked =
            Self::claim_batch_tx(&mut tx, tenant_id, campaign_id, want, &run_id).await?;

        tx.commit().await?;
        debug!(tenant_id, campaign_id, run_id = %run_id, picked, "parallel run started");
        Ok((run_id, picked))
    }

    /// Fetch one parallel run by id (reporting, tests)
    pub async fn get_parallel_run(&self, run_id: &str) -> Result<Option<ParallelRun>> {
        let run = sqlx::query_as::<_, ParallelRun>(
            "SELECT * FROM dialer_parallel_runs WHERE id = ?1",
        )
        .bind(run_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(run)
    }
}
