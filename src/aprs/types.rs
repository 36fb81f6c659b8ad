use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A geographic fix as reported over APRS.
///
/// A longitude of exactly zero means "no position": the payload parser
/// leaves the default point in place when no position is found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
    /// Feet above mean sea level.
    #[serde(default)]
    pub altitude: f64,
    /// Miles per hour.
    #[serde(default)]
    pub speed: f64,
    /// Degrees true, 0-359.
    #[serde(default)]
    pub heading: u16,
}

impl Point {
    pub fn has_position(&self) -> bool {
        self.lon != 0.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct Message {
    pub recipient: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct Telemetry {
    pub sequence: u32,
    pub analog: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digital: Option<u8>,
}

impl Telemetry {
    pub fn has_values(&self) -> bool {
        self.analog.first().is_some_and(|a1| *a1 != 0.0)
    }
}

/// Everything recognized in a frame's information field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct AprsData {
    pub position: Point,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<Telemetry>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

/// Coarse classification used by the recent-packets view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema, strum_macros::Display)]
pub enum PacketKind {
    #[strum(serialize = "POS+TLM")]
    #[serde(rename = "POS+TLM")]
    PositionTelemetry,
    #[strum(serialize = "POS")]
    #[serde(rename = "POS")]
    Position,
    #[strum(serialize = "MSG")]
    #[serde(rename = "MSG")]
    Message,
    #[strum(serialize = "OTHER")]
    #[serde(rename = "OTHER")]
    Other,
}

impl AprsData {
    pub fn kind(&self) -> PacketKind {
        let positioned = self.position.lat != 0.0;
        let telemetry = self.telemetry.as_ref().is_some_and(Telemetry::has_values);
        if positioned && telemetry {
            PacketKind::PositionTelemetry
        } else if positioned {
            PacketKind::Position
        } else if self.message.is_some() {
            PacketKind::Message
        } else {
            PacketKind::Other
        }
    }
}
