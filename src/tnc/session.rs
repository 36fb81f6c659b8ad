use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::connection::{ConnectionManager, Dialer, TcpDialer};
use super::error::TncError;
use super::inbound::{ConcernedSet, InboundProcessor};
use super::outbound::{OutboundDispatcher, OutboundSender};
use super::store::{Record, Store};
use crate::aprs::Point;
use crate::ax25::Address;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// How this station signs its own transmissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationIdentity {
    pub address: Address,
    pub symbol_table: char,
    pub symbol_code: char,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub address: String,
    pub redial_interval: Duration,
    pub read_timeout: Duration,
    pub station: StationIdentity,
    pub concerned: ConcernedSet,
    /// Addressee of outgoing messages.
    pub recipient: Address,
}

/// Cheap, cloneable view of a running session for request handlers.
#[derive(Clone)]
pub struct TncHandle {
    connection: Arc<ConnectionManager>,
    store: Arc<Store>,
    outbound: OutboundSender,
    concerned: Arc<ConcernedSet>,
}

impl TncHandle {
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn address(&self) -> &str {
        self.connection.address()
    }

    pub fn generation(&self) -> u64 {
        self.connection.current_generation()
    }

    /// Most recent concerned packets, newest first.
    pub fn recent(&self) -> Vec<Record> {
        self.store.snapshot()
    }

    pub fn position(&self) -> Option<Point> {
        self.store.position()
    }

    pub fn last_seen(&self, station: &Address) -> Option<Record> {
        self.store.last_seen(station)
    }

    pub fn concerned(&self) -> Vec<Address> {
        self.concerned.sorted()
    }

    pub fn send_position(&self, point: Point) -> Result<Uuid, TncError> {
        self.outbound.send_position(point)
    }

    pub fn send_message(&self, text: String) -> Result<Uuid, TncError> {
        self.outbound.send_message(text)
    }
}

/// The running TNC session: one inbound and one outbound task sharing a
/// connection manager and a store.
pub struct Session {
    handle: TncHandle,
    shutdown: CancellationToken,
    inbound: JoinHandle<()>,
    outbound: JoinHandle<()>,
}

impl Session {
    pub fn spawn(settings: SessionSettings) -> Self {
        Self::spawn_with_dialer(settings, Arc::new(TcpDialer))
    }

    /// Starts both tasks and returns at once. The first dial happens inside
    /// the inbound task, so an unreachable TNC never blocks the caller.
    pub fn spawn_with_dialer(settings: SessionSettings, dialer: Arc<dyn Dialer>) -> Self {
        let SessionSettings {
            address,
            redial_interval,
            read_timeout,
            station,
            concerned,
            recipient,
        } = settings;

        info!(
            "Starting TNC session for {} ({} concerned stations)",
            station.address,
            concerned.len()
        );

        let shutdown = CancellationToken::new();
        let connection = Arc::new(ConnectionManager::new(
            address,
            redial_interval,
            read_timeout,
            dialer,
        ));
        let store = Arc::new(Store::default());
        let concerned = Arc::new(concerned);

        let inbound = InboundProcessor::new(
            connection.clone(),
            store.clone(),
            concerned.clone(),
            shutdown.clone(),
        );
        let (dispatcher, outbound) =
            OutboundDispatcher::new(connection.clone(), station, recipient, shutdown.clone());

        let handle = TncHandle {
            connection,
            store,
            outbound,
            concerned,
        };

        Self {
            handle,
            shutdown,
            inbound: tokio::spawn(inbound.run()),
            outbound: tokio::spawn(dispatcher.run()),
        }
    }

    pub fn handle(&self) -> TncHandle {
        self.handle.clone()
    }

    /// Stops both tasks. Tasks still stuck in a dial or a retrying send
    /// after the grace period are aborted.
    pub async fn shutdown(self) {
        info!("Shutting down TNC session");
        self.shutdown.cancel();

        for (name, mut task) in [("inbound", self.inbound), ("outbound", self.outbound)] {
            if timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
                warn!("TNC {} task did not stop in time, aborting", name);
                task.abort();
            }
        }
    }
}
