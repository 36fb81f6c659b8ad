use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Ax25Error {
    #[error("empty callsign")]
    EmptyCallsign,
    #[error("callsign too long: {0}")]
    CallsignTooLong(String),
    #[error("invalid character in callsign: {0}")]
    InvalidCallsign(String),
    #[error("invalid ssid: {0}")]
    InvalidSsid(String),
    #[error("frame too short ({0} bytes)")]
    FrameTooShort(usize),
    #[error("address field not terminated")]
    UnterminatedAddress,
    #[error("too many digipeaters ({0})")]
    TooManyDigipeaters(usize),
    #[error("not a UI frame (control {control:#04x}, pid {pid:#04x})")]
    NotUiFrame { control: u8, pid: u8 },
}
