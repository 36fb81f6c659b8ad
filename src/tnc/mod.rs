mod connection;
mod error;
mod inbound;
mod outbound;
mod session;
mod store;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use connection::{
    ConnectionManager, DialFuture, Dialer, Link, TcpDialer, DEFAULT_READ_TIMEOUT,
    DEFAULT_REDIAL_INTERVAL,
};
pub use error::TncError;
pub use inbound::{ConcernedSet, InboundProcessor};
pub use outbound::{
    MessageRequest, OutboundDispatcher, OutboundSender, PositionRequest, DESTINATION,
    MESSAGE_ID, PATH, QUEUE_DEPTH,
};
pub use session::{Session, SessionSettings, StationIdentity, TncHandle};
pub use store::{Record, RingBuffer, Store, RECENT_CAPACITY};

/// State locks are only held for in-memory updates, so a poisoned lock
/// still holds consistent data.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
