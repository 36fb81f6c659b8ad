use log::{error, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::connection::ConnectionManager;
use super::error::TncError;
use super::session::StationIdentity;
use crate::aprs::{self, Point};
use crate::ax25::{kiss, Address, Frame};

/// Generic APRS destination for this software.
pub const DESTINATION: (&str, u8) = ("APZ001", 0);
/// Two-hop wide-area relay path.
pub const PATH: [(&str, u8); 2] = [("WIDE1", 1), ("WIDE2", 1)];
/// Every outgoing message uses the same acknowledgement id.
pub const MESSAGE_ID: &str = "1";

/// Requests beyond this many waiting per queue are refused.
pub const QUEUE_DEPTH: usize = 16;

#[derive(Debug, Clone)]
pub struct PositionRequest {
    pub id: Uuid,
    pub point: Point,
}

#[derive(Debug, Clone)]
pub struct MessageRequest {
    pub id: Uuid,
    pub text: String,
}

/// Producer side of the two outbound queues.
#[derive(Debug, Clone)]
pub struct OutboundSender {
    positions: mpsc::Sender<PositionRequest>,
    messages: mpsc::Sender<MessageRequest>,
}

fn queued<T>(queue: &'static str, result: Result<(), TrySendError<T>>) -> Result<(), TncError> {
    result.map_err(|e| match e {
        TrySendError::Full(_) => TncError::QueueFull(queue),
        TrySendError::Closed(_) => TncError::QueueClosed,
    })
}

/// Enqueueing never waits: while the link is down the dispatcher is stuck
/// retrying, and callers get `QueueFull` once the backlog is at depth.
impl OutboundSender {
    pub fn send_position(&self, point: Point) -> Result<Uuid, TncError> {
        let id = Uuid::new_v4();
        queued("position", self.positions.try_send(PositionRequest { id, point }))?;
        Ok(id)
    }

    pub fn send_message(&self, text: String) -> Result<Uuid, TncError> {
        aprs::validate_message_text(&text)?;
        let id = Uuid::new_v4();
        queued("message", self.messages.try_send(MessageRequest { id, text }))?;
        Ok(id)
    }
}

/// Serializes position and message requests onto the TNC link, one at a
/// time in arrival order.
pub struct OutboundDispatcher {
    connection: Arc<ConnectionManager>,
    station: StationIdentity,
    recipient: Address,
    positions: mpsc::Receiver<PositionRequest>,
    messages: mpsc::Receiver<MessageRequest>,
    shutdown: CancellationToken,
}

impl OutboundDispatcher {
    pub fn new(
        connection: Arc<ConnectionManager>,
        station: StationIdentity,
        recipient: Address,
        shutdown: CancellationToken,
    ) -> (Self, OutboundSender) {
        let (positions_tx, positions) = mpsc::channel(QUEUE_DEPTH);
        let (messages_tx, messages) = mpsc::channel(QUEUE_DEPTH);
        let dispatcher = Self {
            connection,
            station,
            recipient,
            positions,
            messages,
            shutdown,
        };
        let sender = OutboundSender {
            positions: positions_tx,
            messages: messages_tx,
        };
        (dispatcher, sender)
    }

    /// Builds the three-hop frame: our station, the generic destination and
    /// the wide-area path.
    pub fn frame(&self, body: String) -> Frame {
        Frame {
            source: self.station.address.clone(),
            dest: Address::fixed(DESTINATION.0, DESTINATION.1),
            path: PATH
                .iter()
                .map(|(call, ssid)| Address::fixed(call, *ssid))
                .collect(),
            body,
        }
    }

    /// Dispatch loop. Shutdown is only observed between requests; a send
    /// in progress keeps retrying until it lands. Both queues are polled
    /// fairly so a stream of beacons cannot starve messages.
    pub async fn run(mut self) {
        info!("Outbound dispatcher started");
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                Some(request) = self.positions.recv() => {
                    let body = aprs::compressed_position_report(
                        &request.point,
                        self.station.symbol_table,
                        self.station.symbol_code,
                    );
                    info!("Sending position report {}: {}", request.id, body);
                    self.send(body).await;
                }
                Some(request) = self.messages.recv() => {
                    let body = match aprs::message(&self.recipient.to_string(), &request.text, MESSAGE_ID) {
                        Ok(body) => body,
                        Err(e) => {
                            error!("Error creating outgoing message {}: {}", request.id, e);
                            continue;
                        }
                    };
                    info!("Sending message {}: {}", request.id, body);
                    self.send(body).await;
                }
                else => break,
            }
        }
        info!("Outbound dispatcher stopped");
    }

    /// Writes one frame, reconnecting and retrying for as long as it takes.
    pub async fn send(&self, body: String) {
        let bytes = kiss::encode(&self.frame(body).encode());
        loop {
            let link = self.connection.wait_for_link().await;
            match link.write(&bytes).await {
                Ok(()) => return,
                Err(e) => {
                    warn!(
                        "Error writing to TNC link {}: {}",
                        link.generation(),
                        e
                    );
                    self.connection.report_failure(&link).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ax25::KissDecoder;
    use crate::tnc::{TcpDialer, DEFAULT_READ_TIMEOUT, DEFAULT_REDIAL_INTERVAL};
    use tokio::net::TcpListener;

    fn dispatcher() -> (OutboundDispatcher, OutboundSender) {
        let connection = Arc::new(ConnectionManager::new(
            "127.0.0.1:1".to_string(),
            DEFAULT_REDIAL_INTERVAL,
            DEFAULT_READ_TIMEOUT,
            Arc::new(TcpDialer),
        ));
        let station = StationIdentity {
            address: "NW5W-7".parse().unwrap(),
            symbol_table: '/',
            symbol_code: 'O',
        };
        OutboundDispatcher::new(
            connection,
            station,
            "KF7XXX-9".parse().unwrap(),
            CancellationToken::new(),
        )
    }

    #[test]
    fn addressing_constants_are_valid() {
        assert!(Address::new(DESTINATION.0, DESTINATION.1).is_ok());
        for (call, ssid) in PATH {
            assert!(Address::new(call, ssid).is_ok());
        }
    }

    #[test]
    fn fixed_addressing() {
        let (dispatcher, _) = dispatcher();
        let frame = dispatcher.frame("hello".to_string());
        assert_eq!(frame.to_string(), "NW5W-7>APZ001,WIDE1-1,WIDE2-1:hello");
    }

    #[tokio::test]
    async fn full_queue_is_refused_without_waiting() {
        let (_dispatcher, sender) = dispatcher();
        for _ in 0..QUEUE_DEPTH {
            sender.send_position(Point::default()).unwrap();
        }
        assert!(matches!(
            sender.send_position(Point::default()),
            Err(TncError::QueueFull("position"))
        ));
        // the message queue is independent
        assert!(sender.send_message("still room".to_string()).is_ok());
    }

    #[tokio::test]
    async fn messages_are_not_starved_by_beacons() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let connection = Arc::new(ConnectionManager::new(
            listener.local_addr().unwrap().to_string(),
            DEFAULT_REDIAL_INTERVAL,
            DEFAULT_READ_TIMEOUT,
            Arc::new(TcpDialer),
        ));
        connection.connect().await;
        let (socket, _) = listener.accept().await.unwrap();

        let station = StationIdentity {
            address: "NW5W-7".parse().unwrap(),
            symbol_table: '/',
            symbol_code: 'O',
        };
        let shutdown = CancellationToken::new();
        let (dispatcher, sender) = OutboundDispatcher::new(
            connection,
            station,
            "KF7XXX-9".parse().unwrap(),
            shutdown.clone(),
        );
        for _ in 0..QUEUE_DEPTH - 1 {
            sender.send_position(Point::default()).unwrap();
        }
        sender.send_message("Over here".to_string()).unwrap();
        let task = tokio::spawn(dispatcher.run());

        let mut decoder = KissDecoder::new(socket);
        let mut message_at = None;
        for i in 0..QUEUE_DEPTH {
            let frame = decoder.next_frame().await.unwrap();
            if frame.body.starts_with(':') {
                message_at = Some(i);
            }
        }
        // all-beacons-first would put the message last
        assert!(message_at.unwrap() < QUEUE_DEPTH - 1);

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn invalid_message_is_rejected_before_queueing() {
        let (_dispatcher, sender) = dispatcher();
        assert!(matches!(
            sender.send_message("a~b".to_string()),
            Err(TncError::Payload(_))
        ));
    }

    #[tokio::test]
    async fn closed_queue_is_reported() {
        let (dispatcher, sender) = dispatcher();
        drop(dispatcher);
        assert!(matches!(
            sender.send_position(Point::default()),
            Err(TncError::QueueClosed)
        ));
    }

    #[tokio::test]
    async fn stops_on_shutdown_between_requests() {
        let (dispatcher, _sender) = dispatcher();
        let shutdown = dispatcher.shutdown.clone();
        let handle = tokio::spawn(dispatcher.run());
        shutdown.cancel();
        handle.await.unwrap();
    }
}
