//! Error types for the outdial engine.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, DialerError>;

/// Errors surfaced by the dialer engine and its HTTP surface.
///
/// "No work available" is not an error anywhere in this crate; dispatch
/// operations return `Ok(None)` for an empty queue so callers can tell
/// "try again later" from "something is broken".
#[derive(Debug, Error)]
pub enum DialerError {
    /// Invalid request input (missing tenant/campaign/lead identifiers)
    #[error("invalid request: {0}")]
    Validation(String),

    /// Referenced campaign does not exist for this tenant
    #[error("campaign not found: {0}")]
    CampaignNotFound(String),

    /// Tenant or server configuration is incomplete
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The external call-placement provider rejected or failed the request
    #[error("call provider error: {0}")]
    Provider(String),

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl DialerError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a provider error
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::CampaignNotFound(_) => StatusCode::NOT_FOUND,
            Self::Configuration(_)
            | Self::Provider(_)
            | Self::Database(_)
            | Self::Migration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DialerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "ok": false, "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_bad_request() {
        let err = DialerError::validation("missing_campaign_id");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn campaign_not_found_maps_to_404() {
        let err = DialerError::CampaignNotFound("c-1".to_string());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
