use super::{
    bad_request, determination_status, gate, internal_error, rejected, valid_password,
    valid_username,
};
use crate::{
    api::{
        types::{ApiResponse, LoginRequest, SignupRequest},
        AuthState,
    },
    keystore::decode_public_key,
    risk::Determination,
};
use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

#[utoipa::path(
    post,
    path= "/api/login",
    request_body = SignupRequest,
    responses (
        (status = 200, description = "Login successful, token issued", body = ApiResponse),
        (status = 300, description = "Risk gate flagged the attempt", body = ApiResponse),
        (status = 400, description = "Missing or invalid payload", body = ApiResponse),
        (status = 401, description = "Invalid username or password", body = ApiResponse),
        (status = 403, description = "Risk gate denied the attempt", body = ApiResponse),
        (status = 500, description = "Internal failure", body = ApiResponse),
    ),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> (StatusCode, Json<ApiResponse>) {
    let request: LoginRequest = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => return rejected(&rejection),
    };

    if !valid_username(&request.username) || !valid_password(&request.password) {
        return bad_request("Invalid username or password");
    }

    if decode_public_key(&request.public_key).is_err() {
        return bad_request("Invalid public key");
    }

    let (determination, risk_response) = gate(request.risk_event);
    if determination != Determination::Allow {
        return (
            determination_status(determination),
            Json(ApiResponse::risk(risk_response)),
        );
    }

    let user = match auth_state.users().find(&request.username).await {
        Ok(user) => user,
        Err(err) => {
            error!("Failed to lookup user: {err}");
            return internal_error();
        }
    };

    let Some(user) = user.filter(|user| user.verify_password(&request.password)) else {
        warn!("Invalid username or password");
        return (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse {
                risk_response: Some(risk_response),
                ..ApiResponse::error("Invalid username or password")
            }),
        );
    };

    match auth_state
        .issuer()
        .issue(&user.id.to_string(), &user.username, &request.public_key)
    {
        Ok(token) => {
            info!(username = %user.username, "user logged in");
            (
                StatusCode::OK,
                Json(ApiResponse {
                    token: Some(token),
                    ..ApiResponse::risk(risk_response)
                }),
            )
        }
        Err(err) => {
            error!("Failed to issue token: {err}");
            internal_error()
        }
    }
}
