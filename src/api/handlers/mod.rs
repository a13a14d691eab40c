//! API handlers and shared helpers for the auth flows.

pub mod health;
pub mod login;
pub mod protected;
pub mod risk;
pub mod signup;

use crate::{
    api::types::ApiResponse,
    risk::{Determination, RiskEvent},
};
use axum::{extract::rejection::JsonRejection, http::StatusCode, Json};
use regex::Regex;
use tracing::{info, warn};

/// Usernames are 3-64 characters of letters, digits, `.`, `_`, `-` or `@`.
pub fn valid_username(username: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9._@-]{3,64}$").is_ok_and(|re| re.is_match(username))
}

pub fn valid_password(password: &str) -> bool {
    !password.is_empty() && password.len() <= 1024
}

/// HTTP status for a risk determination: 200 allow, 300 warn, 403 deny.
pub const fn determination_status(determination: Determination) -> StatusCode {
    match determination {
        Determination::Allow => StatusCode::OK,
        Determination::Warn => StatusCode::MULTIPLE_CHOICES,
        Determination::Deny => StatusCode::FORBIDDEN,
    }
}

/// Classify a risk event and stamp the result into the echoed risk response.
///
/// The collaborator's own verdict is only compared and logged.
pub(crate) fn gate(mut event: RiskEvent) -> (Determination, RiskEvent) {
    let determination = event.classify();

    if let Some(reported) = event.risk_determination {
        if reported != determination {
            warn!(
                reported = %reported,
                determination = %determination,
                "risk collaborator verdict disagrees with risk gate"
            );
        }
    }

    info!(
        fingerprint_id = %event.fingerprint_id,
        determination = %determination,
        "risk determination"
    );

    event.risk_determination = Some(determination);
    (determination, event)
}

pub(crate) fn bad_request(message: &str) -> (StatusCode, Json<ApiResponse>) {
    (StatusCode::BAD_REQUEST, Json(ApiResponse::error(message)))
}

/// 400 carrying the extractor's own explanation (missing content type, bad JSON, missing
/// field).
pub(crate) fn rejected(rejection: &JsonRejection) -> (StatusCode, Json<ApiResponse>) {
    let reason = rejection.body_text();
    warn!(status = %rejection.status(), "rejected payload: {reason}");
    bad_request(&reason)
}

pub(crate) fn internal_error() -> (StatusCode, Json<ApiResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::error("Failed to authenticate user")),
    )
}
