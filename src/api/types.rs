//! Request and response bodies shared by the API handlers and the client.

use crate::risk::RiskEvent;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    /// Base64 SEC1 P-256 session public key, embedded into the issued token.
    pub public_key: String,
    pub risk_event: RiskEvent,
}

pub type LoginRequest = SignupRequest;

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RiskRequest {
    pub risk_event: RiskEvent,
}

/// Envelope for every API response body; absent fields are omitted.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_response: Option<RiskEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    #[must_use]
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn risk(risk_response: RiskEvent) -> Self {
        Self {
            risk_response: Some(risk_response),
            ..Self::default()
        }
    }
}
