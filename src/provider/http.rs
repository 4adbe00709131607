//! REST call-placement provider.
//!
//! Speaks the Twilio-style calls API: form-encoded POST to
//! `{api_base}/Accounts/{account_sid}/Calls.json` with HTTP basic auth,
//! answering with a JSON body carrying the new call's `sid`. The base URL is
//! configurable so tests and self-hosted gateways can stand in for the real
//! provider.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{CallProvider, DialCredentials, PlaceCallRequest};
use crate::error::{DialerError, Result};

const DEFAULT_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Status events we subscribe every call to
const STATUS_EVENTS: &str = "initiated ringing answered completed";

#[derive(Clone)]
pub struct HttpCallProvider {
    http: reqwest::Client,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct CallCreatedResponse {
    sid: String,
}

impl HttpCallProvider {
    pub fn new(api_base: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        }
    }
}

#[async_trait]
impl CallProvider for HttpCallProvider {
    async fn place_call(
        &self,
        credentials: &DialCredentials,
        request: &PlaceCallRequest,
    ) -> Result<String> {
        let url = format!(
            "{}/Accounts/{}/Calls.json",
            self.api_base.trim_end_matches('/'),
            credentials.account_sid
        );

        let params = [
            ("To", request.to.as_str()),
            ("From", request.from.as_str()),
            ("Url", request.voice_url.as_str()),
            ("Method", "GET"),
            ("StatusCallback", request.status_callback_url.as_str()),
            ("StatusCallbackMethod", "POST"),
            ("StatusCallbackEvent", STATUS_EVENTS),
        ];

        let response = self
            .http
            .post(&url)
            .basic_auth(&credentials.account_sid, Some(&credentials.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| DialerError::provider(format!("call placement request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DialerError::provider(format!(
                "call placement rejected ({status}): {body}"
            )));
        }

        let created: CallCreatedResponse = response
            .json()
            .await
            .map_err(|e| DialerError::provider(format!("malformed placement response: {e}")))?;

        debug!(call_sid = %created.sid, to = %request.to, "call placed");
        Ok(created.sid)
    }
}
