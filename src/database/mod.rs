//! Async database layer over sqlx/SQLite.
//!
//! [`DatabaseManager`] owns the connection pool and exposes the queue store,
//! lease manager, and reconciliation updates as focused async operations.
//! All operations are Send-safe and scoped by `tenant_id`; tenants never
//! touch each other's rows.

mod queue;
mod runs;

pub use runs::CampaignDialSettings;

use std::str::FromStr;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::error::Result;
use crate::provider::DialCredentials;

/// Async database manager wrapping a SQLite pool
#[derive(Clone)]
pub struct DatabaseManager {
    pool: SqlitePool,
}

/// Tenant routing-bridge configuration (workflow + wrap-up identifiers)
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RoutingConfig {
    pub tenant_id: String,
    pub workspace_sid: String,
    pub workflow_sid: String,
    pub taskqueue_sid: Option<String>,
    pub wrapup_activity_sid: Option<String>,
}

impl DatabaseManager {
    /// Open (or create) the database and run migrations.
    ///
    /// An in-memory URL is pinned to a single connection: every extra
    /// connection to `:memory:` would open a distinct empty database.
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = database_url.contains(":memory:");
        let max = if in_memory { 1 } else { max_connections.max(1) };

        let pool = SqlitePoolOptions::new()
            .max_connections(max)
            .min_connections(if in_memory { 1 } else { 0 })
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("database ready at {} ({} connections)", database_url, max);

        Ok(Self { pool })
    }

    /// Access the underlying pool (tests, health checks)
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Liveness probe used by the health endpoint
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Tenant-scoped calling credentials, if configured
    pub async fn dial_credentials(&self, tenant_id: &str) -> Result<Option<DialCredentials>> {
        let creds = sqlx::query_as::<_, DialCredentials>(
            "SELECT account_sid, auth_token, default_from_number
             FROM tenant_dial_config
             WHERE tenant_id = ?1",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(creds)
    }

    /// Tenant routing-bridge configuration, if bootstrapped
    pub async fn routing_config(&self, tenant_id: &str) -> Result<Option<RoutingConfig>> {
        let cfg = sqlx::query_as::<_, RoutingConfig>(
            "SELECT tenant_id, workspace_sid, workflow_sid, taskqueue_sid, wrapup_activity_sid
             FROM tenant_routing_config
             WHERE tenant_id = ?1",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(cfg)
    }

    /// Upsert tenant calling credentials (provisioning collaborator)
    pub async fn upsert_dial_config(
        &self,
        tenant_id: &str,
        account_sid: &str,
        auth_token: &str,
        default_from_number: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO tenant_dial_config (tenant_id, account_sid, auth_token, default_from_number, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (tenant_id) DO UPDATE SET
               account_sid = excluded.account_sid,
               auth_token = excluded.auth_token,
               default_from_number = excluded.default_from_number,
               updated_at = excluded.updated_at",
        )
        .bind(tenant_id)
        .bind(account_sid)
        .bind(auth_token)
        .bind(default_from_number)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upsert tenant routing-bridge configuration (bootstrap collaborator)
    pub async fn upsert_routing_config(
        &self,
        tenant_id: &str,
        workspace_sid: &str,
        workflow_sid: &str,
        taskqueue_sid: Option<&str>,
        wrapup_activity_sid: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO tenant_routing_config
               (tenant_id, workspace_sid, workflow_sid, taskqueue_sid, wrapup_activity_sid, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (tenant_id) DO UPDATE SET
               workspace_sid = excluded.workspace_sid,
               workflow_sid = excluded.workflow_sid,
               taskqueue_sid = excluded.taskqueue_sid,
               wrapup_activity_sid = excluded.wrapup_activity_sid,
               updated_at = excluded.updated_at",
        )
        .bind(tenant_id)
        .bind(workspace_sid)
        .bind(workflow_sid)
        .bind(taskqueue_sid)
        .bind(wrapup_activity_sid)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert a campaign row (tests and provisioning collaborators)
    pub async fn create_campaign(
        &self,
        id: &str,
        tenant_id: &str,
        name: &str,
        parallel_concurrency: u32,
        parallel_dial_ratio: f64,
        waiting_message: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO campaigns
               (id, tenant_id, name, parallel_concurrency, parallel_dial_ratio, waiting_message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(name)
        .bind(parallel_concurrency as i64)
        .bind(parallel_dial_ratio)
        .bind(waiting_message)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert a lead row (tests and provisioning collaborators)
    pub async fn create_lead(
        &self,
        id: &str,
        tenant_id: &str,
        phone_e164: &str,
        full_name: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO leads (id, tenant_id, phone_e164, full_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(phone_e164)
        .bind(full_name)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
