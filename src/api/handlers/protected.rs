//! Protected resource guarded by locked-token verification.
//!
//! The inner bearer token is only inspected after the lock verifies. Its own signature
//! check then proves the embedded session key was bound by this server at issuance.

use crate::api::{types::ApiResponse, AuthState};
use axum::{
    extract::Extension,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;
use tracing::{instrument, warn};

#[utoipa::path(
    get,
    path= "/api/protected",
    responses (
        (status = 200, description = "Locked token and bearer token verified", body = ApiResponse),
        (status = 401, description = "Missing token, or lock verification failed: Expired, InvalidSignature or Malformed", body = ApiResponse),
    ),
    security(("locked_token" = [])),
    tag= "protected"
)]
#[instrument(skip_all)]
pub async fn protected(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> (StatusCode, Json<ApiResponse>) {
    let Some(locked_token) = extract_bearer_token(&headers) else {
        return unauthorized("Unauthorized");
    };

    let parsed = match auth_state.verifier().unlock(&locked_token) {
        Ok(parsed) => parsed,
        Err(result) => {
            warn!(result = %result, "locked token verification failed");
            return unauthorized(result.as_str());
        }
    };

    let claims = match auth_state.issuer().verify(&parsed.inner_token) {
        Ok(claims) => claims,
        Err(err) => {
            warn!("bearer token rejected: {err}");
            return unauthorized("Unauthorized");
        }
    };

    (
        StatusCode::OK,
        Json(ApiResponse {
            message: Some(format!(
                "Hello, {}! You've successfully authenticated. Please inspect the risk attributes of your authentication below.",
                claims.username
            )),
            ..ApiResponse::default()
        }),
    )
}

fn unauthorized(error: &str) -> (StatusCode, Json<ApiResponse>) {
    (StatusCode::UNAUTHORIZED, Json(ApiResponse::error(error)))
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
