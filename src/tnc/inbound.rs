use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::timeout_at;
use tokio_util::sync::CancellationToken;

use super::connection::ConnectionManager;
use super::store::{Record, Store};
use crate::aprs;
use crate::ax25::{Address, Frame, KissDecoder};

/// Stations whose traffic is kept: the balloon payload, our own vehicle and
/// any other chase vehicles. Fixed once the session starts.
#[derive(Debug, Clone, Default)]
pub struct ConcernedSet {
    stations: HashSet<Address>,
}

impl ConcernedSet {
    pub fn new(
        balloon: Address,
        vehicle: Address,
        chasers: impl IntoIterator<Item = Address>,
    ) -> Self {
        let mut stations: HashSet<Address> = chasers.into_iter().collect();
        stations.insert(balloon);
        stations.insert(vehicle);
        Self { stations }
    }

    pub fn contains(&self, station: &Address) -> bool {
        self.stations.contains(station)
    }

    /// Sorted by callsign for stable display.
    pub fn sorted(&self) -> Vec<Address> {
        let mut stations: Vec<Address> = self.stations.iter().cloned().collect();
        stations.sort_by_key(|a| a.to_string());
        stations
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

pub struct InboundProcessor {
    connection: Arc<ConnectionManager>,
    store: Arc<Store>,
    concerned: Arc<ConcernedSet>,
    shutdown: CancellationToken,
}

impl InboundProcessor {
    pub fn new(
        connection: Arc<ConnectionManager>,
        store: Arc<Store>,
        concerned: Arc<ConcernedSet>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            connection,
            store,
            concerned,
            shutdown,
        }
    }

    /// Parses a decoded frame. Frames from concerned stations are filed in
    /// the ring and last-seen map; any frame with a position moves the
    /// position cell. Returns the stored record, if any.
    pub fn ingest(&self, frame: Frame) -> Option<Record> {
        debug!("Incoming APRS packet received: {}", frame);
        let data = aprs::parse(&frame.body);
        debug!("Classified packet from {} as {}", frame.source, data.kind());

        let position = data.position;
        let record = self.concerned.contains(&frame.source).then(|| {
            let record = Record::new(frame.clone(), data);
            self.store.insert(record.clone());
            self.store
                .set_last_seen(record.source().clone(), record.clone());
            record
        });

        if position.has_position() {
            info!(
                "Position packet received from {}. Lat: {} Lon: {}",
                frame.source, position.lat, position.lon
            );
            self.store.set_position(position);
        }
        record
    }

    /// Decode loop. Runs until the shutdown token fires.
    pub async fn run(self) {
        info!("Inbound processor started");
        let mut installed = self.connection.subscribe();

        loop {
            let link = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                link = self.connection.wait_for_link() => link,
            };
            let _ = installed.borrow_and_update();
            if self.connection.current_generation() != link.generation() {
                continue;
            }

            // A decoder is stream-stateful, so every link gets a fresh one.
            let Some(reader) = link.take_reader() else {
                warn!("TNC link {} was already being read", link.generation());
                self.connection.report_failure(&link).await;
                continue;
            };
            let mut decoder = KissDecoder::new(reader);

            loop {
                let next = tokio::select! {
                    _ = self.shutdown.cancelled() => {
                        info!("Inbound processor stopped");
                        return;
                    }
                    _ = installed.changed() => {
                        if self.connection.current_generation() != link.generation() {
                            info!("TNC link replaced, rebuilding decoder");
                            break;
                        }
                        continue;
                    }
                    next = timeout_at(link.read_deadline(), decoder.next_frame()) => next,
                };

                match next {
                    Ok(Ok(frame)) => {
                        link.arm_read_deadline(self.connection.read_timeout());
                        self.ingest(frame);
                    }
                    Ok(Err(e)) => {
                        error!("Error retrieving APRS frame via KISS: {}", e);
                        self.connection.report_failure(&link).await;
                        break;
                    }
                    Err(_) => {
                        error!(
                            "Nothing heard from TNC in {}, assuming the link is dead",
                            humantime::format_duration(self.connection.read_timeout())
                        );
                        self.connection.report_failure(&link).await;
                        break;
                    }
                }
            }
        }
        info!("Inbound processor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aprs::Point;
    use crate::tnc::{TcpDialer, DEFAULT_READ_TIMEOUT, DEFAULT_REDIAL_INTERVAL};

    fn addr(s: &str) -> Address {
        s.parse().unwrap()
    }

    fn processor() -> InboundProcessor {
        let connection = Arc::new(ConnectionManager::new(
            "127.0.0.1:1".to_string(),
            DEFAULT_REDIAL_INTERVAL,
            DEFAULT_READ_TIMEOUT,
            Arc::new(TcpDialer),
        ));
        let concerned = ConcernedSet::new(
            addr("KF7XXX-11"),
            addr("KF7XXX-9"),
            [addr("KF7FVH-1"), addr("A7COG-2")],
        );
        InboundProcessor::new(
            connection,
            Arc::new(Store::default()),
            Arc::new(concerned),
            CancellationToken::new(),
        )
    }

    fn frame(source: &str, body: &str) -> Frame {
        Frame {
            source: addr(source),
            dest: addr("APZ001"),
            path: vec![addr("WIDE1-1")],
            body: body.to_string(),
        }
    }

    #[test]
    fn concerned_set_includes_everyone() {
        let set = ConcernedSet::new(addr("B-11"), addr("V-9"), [addr("C-1"), addr("V-9")]);
        assert_eq!(set.len(), 3);
        assert!(set.contains(&addr("b-11")));
        assert!(!set.contains(&addr("B-12")));
        assert_eq!(
            set.sorted(),
            vec![addr("B-11"), addr("C-1"), addr("V-9")]
        );
    }

    #[test]
    fn unconcerned_sources_skip_ring_and_cache() {
        let inbound = processor();
        let stranger = addr("W1AW");
        assert!(inbound
            .ingest(frame("W1AW", "!4000.00N/07000.00W-"))
            .is_none());

        assert!(inbound.store.snapshot().is_empty());
        assert!(inbound.store.last_seen(&stranger).is_none());
    }

    #[test]
    fn any_positioned_frame_moves_position_cell() {
        let inbound = processor();
        inbound.ingest(frame("W1AW", "!4000.00N/07000.00W-"));
        let position = inbound.store.position().unwrap();
        assert!((position.lat - 40.0).abs() < 1e-9);
        assert!((position.lon + 70.0).abs() < 1e-9);

        // unconcerned and on the meridian: still no update
        inbound.ingest(frame("W1AW", "!5128.80N/00000.00E-"));
        assert_eq!(inbound.store.position(), Some(position));
    }

    #[test]
    fn concerned_source_updates_ring_and_cache() {
        let inbound = processor();
        let record = inbound
            .ingest(frame("KF7FVH-1", ":KF7XXX-9 :On my way{1"))
            .unwrap();
        assert_eq!(record.data.message.as_ref().unwrap().text, "On my way");

        assert_eq!(inbound.store.snapshot(), vec![record.clone()]);
        assert_eq!(inbound.store.last_seen(&addr("KF7FVH-1")), Some(record));
        // a message carries no position
        assert_eq!(inbound.store.position(), None);
    }

    #[test]
    fn zero_longitude_never_moves_position_cell() {
        let inbound = processor();
        inbound.ingest(frame("KF7XXX-11", "!4530.00N/12236.00W-"));
        let expected = inbound.store.position().unwrap();
        assert!((expected.lat - 45.5).abs() < 1e-9);
        assert!((expected.lon + 122.6).abs() < 1e-9);

        // on the Greenwich meridian: treated as "no position"
        inbound.ingest(frame("KF7XXX-11", "!5128.80N/00000.00E-"));
        assert_eq!(inbound.store.position(), Some(expected));

        inbound.ingest(frame("KF7XXX-9", "!5128.80N/00000.09W-"));
        let moved = inbound.store.position().unwrap();
        assert_ne!(moved, expected);
        assert!(moved.lon < 0.0);
        assert_eq!(inbound.store.snapshot().len(), 3);
    }

    #[test]
    fn last_seen_tracks_latest_per_station() {
        let inbound = processor();
        inbound.ingest(frame("A7COG-2", "!4530.00N/12236.00W-"));
        inbound.ingest(frame("KF7FVH-1", "!4531.00N/12237.00W-"));
        inbound.ingest(frame("A7COG-2", "!4532.00N/12238.00W-"));

        let cog = inbound.store.last_seen(&addr("A7COG-2")).unwrap();
        assert!((cog.data.position.lat - (45.0 + 32.0 / 60.0)).abs() < 1e-9);
        let latest: Point = inbound.store.position().unwrap();
        assert_eq!(latest, cog.data.position);
    }
}
