mod base91;
mod builder;
mod parser;
mod types;

pub use builder::{compressed_position_report, message, validate_message_text, AprsError};
pub use parser::parse;
pub use types::{AprsData, Message, PacketKind, Point, Telemetry};
