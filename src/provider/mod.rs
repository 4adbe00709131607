//! Call-placement capability.
//!
//! The telephony control plane is an external collaborator reached over
//! HTTP. This module defines the capability seam the orchestrator dials
//! through: credentials are resolved per tenant and passed per call, so
//! provider implementations hold no tenant state.

pub mod http;

pub use http::HttpCallProvider;

use async_trait::async_trait;

use crate::error::Result;

/// Tenant-scoped calling credentials
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct DialCredentials {
    pub account_sid: String,
    pub auth_token: String,
    /// Default caller id; placement fails without one
    pub default_from_number: Option<String>,
}

/// Parameters for one outbound call
#[derive(Debug, Clone)]
pub struct PlaceCallRequest {
    /// Lead's number in E.164
    pub to: String,
    /// Caller id
    pub from: String,
    /// URL the provider fetches for call-control instructions once the
    /// callee answers
    pub voice_url: String,
    /// URL the provider posts asynchronous status events to
    pub status_callback_url: String,
}

/// Capability: initiate an outbound call, returning the provider's call
/// handle. Implementations must not mutate queue state; compensation for
/// placement failures is the orchestrator's job.
#[async_trait]
pub trait CallProvider: Send + Sync {
    async fn place_call(
        &self,
        credentials: &DialCredentials,
        request: &PlaceCallRequest,
    ) -> Result<String>;
}
