use super::{determination_status, gate, rejected};
use crate::api::types::{ApiResponse, RiskRequest};
use axum::{extract::rejection::JsonRejection, http::StatusCode, Json};
use tracing::instrument;

#[utoipa::path(
    post,
    path= "/api/risk",
    request_body = RiskRequest,
    responses (
        (status = 200, description = "Allow", body = ApiResponse),
        (status = 300, description = "Warn", body = ApiResponse),
        (status = 400, description = "Missing or invalid risk event", body = ApiResponse),
        (status = 403, description = "Deny", body = ApiResponse),
    ),
    tag= "risk"
)]
#[instrument(skip_all)]
pub async fn risk(
    payload: Result<Json<RiskRequest>, JsonRejection>,
) -> (StatusCode, Json<ApiResponse>) {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return rejected(&rejection),
    };

    let (determination, risk_response) = gate(request.risk_event);

    (
        determination_status(determination),
        Json(ApiResponse::risk(risk_response)),
    )
}
