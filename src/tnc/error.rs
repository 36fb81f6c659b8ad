use thiserror::Error;

use crate::aprs::AprsError;

#[derive(Debug, Error)]
pub enum TncError {
    #[error("outbound queue closed")]
    QueueClosed,
    #[error("{0} queue is full")]
    QueueFull(&'static str),
    #[error("invalid payload: {0}")]
    Payload(#[from] AprsError),
}
