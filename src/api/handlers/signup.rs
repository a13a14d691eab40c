use super::{
    bad_request, determination_status, gate, internal_error, rejected, valid_password,
    valid_username,
};
use crate::{
    api::{
        types::{ApiResponse, SignupRequest},
        users::{hash_password, CreateOutcome, UserRecord},
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
use tracing::{error, info, instrument};

#[utoipa::path(
    post,
    path= "/api/signup",
    request_body = SignupRequest,
    responses (
        (status = 200, description = "User created and token issued", body = ApiResponse),
        (status = 300, description = "Risk gate flagged the attempt", body = ApiResponse),
        (status = 400, description = "Missing or invalid payload", body = ApiResponse),
        (status = 403, description = "Risk gate denied the attempt", body = ApiResponse),
        (status = 409, description = "User already exists", body = ApiResponse),
        (status = 500, description = "Internal failure", body = ApiResponse),
    ),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn signup(
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> (StatusCode, Json<ApiResponse>) {
    let request: SignupRequest = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => return rejected(&rejection),
    };

    if !valid_username(&request.username) {
        error!("Invalid username");

        return bad_request("Invalid username");
    }

    if !valid_password(&request.password) {
        error!("Invalid password");

        return bad_request("Invalid password");
    }

    // Only bind keys that are real P-256 points into issued tokens.
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

    let password_hash = match hash_password(&request.password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return internal_error();
        }
    };

    let user = match auth_state
        .users()
        .create(UserRecord::new(&request.username, password_hash))
        .await
    {
        Ok(CreateOutcome::Created(user)) => user,
        Ok(CreateOutcome::AlreadyExists) => {
            return (
                StatusCode::CONFLICT,
                Json(ApiResponse {
                    risk_response: Some(risk_response),
                    ..ApiResponse::error("User already exists")
                }),
            );
        }
        Err(err) => {
            error!("Failed to create user: {err}");
            return internal_error();
        }
    };

    match auth_state
        .issuer()
        .issue(&user.id.to_string(), &user.username, &request.public_key)
    {
        Ok(token) => {
            info!(username = %user.username, "user signed up");
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
