use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::aprs::{AprsData, PacketKind, Point};
use crate::ax25::Address;
use crate::tnc::Record;
use crate::web::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::auth::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct TncStatus {
    /// host:port of the TNC.
    pub address: String,
    pub connected: bool,
    /// Number of successful dials so far.
    pub generation: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecordView {
    pub kind: PacketKind,
    pub source: String,
    pub received: DateTime<Utc>,
    /// The frame in TNC2 monitor format.
    pub raw: String,
    pub data: AprsData,
}

impl From<Record> for RecordView {
    fn from(record: Record) -> Self {
        RecordView {
            kind: record.data.kind(),
            source: record.source().to_string(),
            received: record.received,
            raw: record.frame.to_string(),
            data: record.data,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StationView {
    pub callsign: String,
    pub last_seen: Option<RecordView>,
}

#[utoipa::path(
    get,
    path = "/api/tnc/status",
    responses(
        (status = 200, description = "TNC link health", body = TncStatus)
    ),
    tag = "tnc"
)]
pub async fn status(State(state): State<AppState>) -> Json<TncStatus> {
    Json(TncStatus {
        address: state.tnc.address().to_string(),
        connected: state.tnc.is_connected(),
        generation: state.tnc.generation(),
    })
}

#[utoipa::path(
    get,
    path = "/api/packets/recent",
    responses(
        (status = 200, description = "Most recent packets from concerned stations, newest first", body = Vec<RecordView>)
    ),
    tag = "tnc"
)]
pub async fn recent(State(state): State<AppState>) -> Json<Vec<RecordView>> {
    Json(state.tnc.recent().into_iter().map(RecordView::from).collect())
}

#[utoipa::path(
    get,
    path = "/api/position",
    responses(
        (status = 200, description = "Latest reported position, null until one is heard", body = Option<Point>)
    ),
    tag = "tnc"
)]
pub async fn position(State(state): State<AppState>) -> Json<Option<Point>> {
    Json(state.tnc.position())
}

#[utoipa::path(
    get,
    path = "/api/stations/{callsign}",
    params(
        ("callsign" = String, Path, description = "Station callsign, e.g. KF7XXX-11")
    ),
    responses(
        (status = 200, description = "Last packet heard from the station", body = RecordView),
        (status = 400, description = "Invalid callsign", body = ErrorResponse),
        (status = 404, description = "Station never heard", body = ErrorResponse)
    ),
    tag = "tnc"
)]
pub async fn station(
    State(state): State<AppState>,
    Path(callsign): Path<String>,
) -> ApiResult<Json<RecordView>> {
    let station: Address = callsign
        .parse()
        .map_err(|e: crate::ax25::Ax25Error| ApiError::Validation(e.to_string()))?;
    let record = state
        .tnc
        .last_seen(&station)
        .ok_or(ApiError::NotFound("station_not_heard"))?;
    Ok(Json(record.into()))
}

#[utoipa::path(
    get,
    path = "/api/stations",
    responses(
        (status = 200, description = "Every concerned station with its last packet", body = Vec<StationView>)
    ),
    tag = "tnc"
)]
pub async fn stations(State(state): State<AppState>) -> Json<Vec<StationView>> {
    let views = state
        .tnc
        .concerned()
        .into_iter()
        .map(|station| StationView {
            callsign: station.to_string(),
            last_seen: state.tnc.last_seen(&station).map(RecordView::from),
        })
        .collect();
    Json(views)
}
