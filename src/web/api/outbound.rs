use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::aprs::Point;
use crate::config::Permission;
use crate::web::api::error::{ApiResult, ErrorResponse};
use crate::web::auth::{AppState, Operator};

#[derive(Debug, Deserialize, ToSchema)]
pub struct MessageBody {
    /// At most 67 characters, without `|`, `~` or `{`.
    pub text: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QueuedResponse {
    /// Request id, as it appears in the log.
    pub id: Uuid,
}

#[utoipa::path(
    post,
    path = "/api/beacon",
    request_body = Point,
    responses(
        (status = 202, description = "Position report queued", body = QueuedResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse),
        (status = 403, description = "Key may not use this queue", body = ErrorResponse),
        (status = 503, description = "Queue full or session stopped", body = ErrorResponse)
    ),
    security(("api_key" = [])),
    tag = "outbound"
)]
pub async fn beacon(
    State(state): State<AppState>,
    operator: Operator,
    Json(point): Json<Point>,
) -> ApiResult<(StatusCode, Json<QueuedResponse>)> {
    operator.authorize(Permission::SendBeacon)?;
    let id = state.tnc.send_position(point)?;
    log::info!("Position report {} queued by {}", id, operator.name());
    Ok((StatusCode::ACCEPTED, Json(QueuedResponse { id })))
}

#[utoipa::path(
    post,
    path = "/api/messages",
    request_body = MessageBody,
    responses(
        (status = 202, description = "Message queued", body = QueuedResponse),
        (status = 400, description = "Message text rejected", body = ErrorResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse),
        (status = 403, description = "Key may not use this queue", body = ErrorResponse),
        (status = 503, description = "Queue full or session stopped", body = ErrorResponse)
    ),
    security(("api_key" = [])),
    tag = "outbound"
)]
pub async fn message(
    State(state): State<AppState>,
    operator: Operator,
    Json(body): Json<MessageBody>,
) -> ApiResult<(StatusCode, Json<QueuedResponse>)> {
    operator.authorize(Permission::SendMessage)?;
    let id = state.tnc.send_message(body.text)?;
    log::info!("Message {} queued by {}", id, operator.name());
    Ok((StatusCode::ACCEPTED, Json(QueuedResponse { id })))
}
