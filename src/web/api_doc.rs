use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

use super::api::error::ErrorResponse;
use super::api::outbound::{MessageBody, QueuedResponse};
use super::api::tnc::{RecordView, StationView, TncStatus};
use crate::aprs::{AprsData, Message, PacketKind, Point, Telemetry};

#[derive(OpenApi)]
#[openapi(
    paths(
        super::api::tnc::status,
        super::api::tnc::recent,
        super::api::tnc::position,
        super::api::tnc::station,
        super::api::tnc::stations,
        super::api::outbound::beacon,
        super::api::outbound::message,
    ),
    components(
        schemas(
            TncStatus,
            RecordView,
            StationView,
            MessageBody,
            QueuedResponse,
            ErrorResponse,
            AprsData,
            PacketKind,
            Point,
            Message,
            Telemetry,
        )
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Trak-O-Mat API",
        description = "APRS balloon tracking through a KISS TNC",
        version = "0.1.0"
    ),
    tags(
        (name = "tnc", description = "Link health and received traffic"),
        (name = "outbound", description = "Position reports and messages")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}
