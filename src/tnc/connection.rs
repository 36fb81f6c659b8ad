use log::{debug, info, warn};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::time::{sleep, Instant};

use super::lock;

pub const DEFAULT_REDIAL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(3 * 60);

pub type DialFuture<'a> = Pin<Box<dyn Future<Output = io::Result<TcpStream>> + Send + 'a>>;

/// Opens the transport to the TNC.
pub trait Dialer: Send + Sync {
    fn dial<'a>(&'a self, address: &'a str) -> DialFuture<'a>;
}

pub struct TcpDialer;

impl Dialer for TcpDialer {
    fn dial<'a>(&'a self, address: &'a str) -> DialFuture<'a> {
        Box::pin(async move {
            let stream = TcpStream::connect(address).await?;
            stream.set_nodelay(true)?;
            Ok(stream)
        })
    }
}

/// One successful dial. Replaced, never repaired: after a failure every
/// holder must fetch the current link from the manager again.
pub struct Link {
    generation: u64,
    peer: Option<SocketAddr>,
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: AsyncMutex<OwnedWriteHalf>,
    read_deadline: Mutex<Instant>,
}

impl Link {
    fn new(generation: u64, stream: TcpStream, read_timeout: Duration) -> Self {
        let peer = stream.peer_addr().ok();
        let (reader, writer) = stream.into_split();
        Self {
            generation,
            peer,
            reader: Mutex::new(Some(reader)),
            writer: AsyncMutex::new(writer),
            read_deadline: Mutex::new(Instant::now() + read_timeout),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Hands out the read half. Only one decoder may ever read a link.
    pub fn take_reader(&self) -> Option<OwnedReadHalf> {
        lock(&self.reader).take()
    }

    pub fn read_deadline(&self) -> Instant {
        *lock(&self.read_deadline)
    }

    pub fn arm_read_deadline(&self, timeout: Duration) {
        *lock(&self.read_deadline) = Instant::now() + timeout;
    }

    pub async fn write(&self, bytes: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(bytes).await?;
        writer.flush().await
    }
}

/// Resets the `connecting` gate even if a connect attempt is dropped
/// mid-flight.
struct ConnectingGate<'a>(&'a Mutex<bool>);

impl Drop for ConnectingGate<'_> {
    fn drop(&mut self) {
        *lock(self.0) = false;
    }
}

/// Owns the TNC link and the two health flags.
///
/// `connecting` gates reconnect attempts and `connected` reports health.
/// They are separate locks so `is_connected()` never waits behind a dial.
pub struct ConnectionManager {
    address: String,
    redial_interval: Duration,
    read_timeout: Duration,
    dialer: Arc<dyn Dialer>,
    connecting: Mutex<bool>,
    connected: Mutex<bool>,
    link: Mutex<Option<Arc<Link>>>,
    generation: watch::Sender<u64>,
}

impl ConnectionManager {
    pub fn new(
        address: String,
        redial_interval: Duration,
        read_timeout: Duration,
        dialer: Arc<dyn Dialer>,
    ) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            address,
            redial_interval,
            read_timeout,
            dialer,
            connecting: Mutex::new(false),
            connected: Mutex::new(false),
            link: Mutex::new(None),
            generation,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn is_connected(&self) -> bool {
        *lock(&self.connected)
    }

    fn set_connected(&self, connected: bool) {
        *lock(&self.connected) = connected;
    }

    /// Dials until the TNC answers. Returns immediately when another caller
    /// is already dialing.
    pub async fn connect(&self) {
        {
            let mut connecting = lock(&self.connecting);
            if *connecting {
                info!("Skipping reconnect since a connection attempt is already in progress");
                return;
            }
            *connecting = true;
        }
        let gate = ConnectingGate(&self.connecting);

        info!("Connecting to TNC {}", self.address);
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            match self.dialer.dial(&self.address).await {
                Ok(stream) => {
                    let generation = *self.generation.borrow() + 1;
                    let link = Arc::new(Link::new(generation, stream, self.read_timeout));
                    match link.peer() {
                        Some(peer) => info!("Connection to TNC {} successful", peer),
                        None => info!("Connection to TNC {} successful", self.address),
                    }

                    {
                        let mut installed = lock(&self.link);
                        *installed = Some(link.clone());
                        self.set_connected(true);
                    }
                    self.generation.send_replace(generation);
                    drop(gate);
                    link.arm_read_deadline(self.read_timeout);
                    return;
                }
                Err(e) => {
                    warn!(
                        "Could not connect to {} (attempt {}): {}",
                        self.address, attempt, e
                    );
                    info!(
                        "Sleeping {} and trying again",
                        humantime::format_duration(self.redial_interval)
                    );
                    sleep(self.redial_interval).await;
                }
            }
        }
    }

    /// The current link, if the connection is healthy.
    pub fn current_link(&self) -> Option<Arc<Link>> {
        if !self.is_connected() {
            return None;
        }
        lock(&self.link).clone()
    }

    pub fn current_generation(&self) -> u64 {
        *self.generation.borrow()
    }

    /// Notified whenever a new link is installed.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    /// Clears the health flag if `link` is still the installed one. The
    /// check and the clear happen under the `link` lock, which is also held
    /// while a new link is installed, so a fresh link is never marked dead.
    fn mark_failed(&self, link: &Link) -> bool {
        let installed = lock(&self.link);
        let current = installed
            .as_ref()
            .is_some_and(|l| l.generation() == link.generation());
        if current {
            self.set_connected(false);
        }
        current
    }

    /// Marks the connection unhealthy and reconnects, unless `link` has
    /// already been replaced by someone else's reconnect.
    pub async fn report_failure(&self, link: &Link) {
        if !self.mark_failed(link) {
            debug!(
                "Ignoring failure on stale link {} (current {})",
                link.generation(),
                self.current_generation()
            );
            return;
        }
        info!("Attempting to reconnect to TNC");
        self.connect().await;
    }

    /// Waits for a healthy link, joining or starting a reconnect as needed.
    pub async fn wait_for_link(&self) -> Arc<Link> {
        let mut installed = self.subscribe();
        loop {
            if let Some(link) = self.current_link() {
                return link;
            }
            self.connect().await;
            if let Some(link) = self.current_link() {
                return link;
            }
            // the sender lives as long as self, so this cannot fail
            let _ = installed.changed().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    /// Dials a real listener after a delay, recording concurrency.
    struct SlowDialer {
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        attempts: AtomicUsize,
    }

    impl Dialer for SlowDialer {
        fn dial<'a>(&'a self, address: &'a str) -> DialFuture<'a> {
            Box::pin(async move {
                self.attempts.fetch_add(1, Ordering::SeqCst);
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_in_flight.fetch_max(now, Ordering::SeqCst);
                sleep(self.delay).await;
                let result = TcpStream::connect(address).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                result
            })
        }
    }

    async fn listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        (listener, address)
    }

    #[tokio::test]
    async fn concurrent_connects_dial_once() {
        let (_listener, address) = listener().await;
        let dialer = Arc::new(SlowDialer {
            delay: Duration::from_millis(200),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            attempts: AtomicUsize::new(0),
        });
        let manager = Arc::new(ConnectionManager::new(
            address,
            Duration::from_millis(50),
            DEFAULT_READ_TIMEOUT,
            dialer.clone(),
        ));

        let first = tokio::spawn({
            let manager = manager.clone();
            async move { manager.connect().await }
        });
        sleep(Duration::from_millis(20)).await;
        let second = tokio::spawn({
            let manager = manager.clone();
            async move {
                manager.connect().await;
                manager.wait_for_link().await;
                manager.is_connected()
            }
        });

        first.await.unwrap();
        assert!(second.await.unwrap());
        assert!(manager.is_connected());
        assert_eq!(dialer.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(dialer.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_clears_health_flag_before_reconnect() {
        let (listener, address) = listener().await;
        let manager = Arc::new(ConnectionManager::new(
            address,
            Duration::from_millis(50),
            DEFAULT_READ_TIMEOUT,
            Arc::new(TcpDialer),
        ));
        manager.connect().await;
        let link = manager.current_link().unwrap();
        assert_eq!(link.generation(), 1);

        // nothing will answer the redial
        drop(listener);
        let reconnect = tokio::spawn({
            let manager = manager.clone();
            async move { manager.report_failure(&link).await }
        });
        sleep(Duration::from_millis(20)).await;

        assert!(!manager.is_connected());
        assert!(manager.current_link().is_none());
        reconnect.abort();
    }

    #[tokio::test]
    async fn stale_link_failure_is_ignored() {
        let (_listener, address) = listener().await;
        let manager = ConnectionManager::new(
            address,
            Duration::from_millis(50),
            DEFAULT_READ_TIMEOUT,
            Arc::new(TcpDialer),
        );
        manager.connect().await;
        let stale = manager.current_link().unwrap();

        manager.report_failure(&stale).await;
        let fresh = manager.current_link().unwrap();
        assert_eq!(fresh.generation(), 2);

        manager.report_failure(&stale).await;
        assert!(manager.is_connected());
        assert_eq!(manager.current_generation(), 2);
    }

    #[tokio::test]
    async fn only_the_installed_link_can_be_marked_failed() {
        let (_listener, address) = listener().await;
        let manager = ConnectionManager::new(
            address,
            Duration::from_millis(50),
            DEFAULT_READ_TIMEOUT,
            Arc::new(TcpDialer),
        );
        manager.connect().await;
        let old = manager.current_link().unwrap();
        // a second dial installs a new link, as a concurrent reconnect would
        manager.connect().await;
        let fresh = manager.current_link().unwrap();
        assert_eq!(fresh.generation(), 2);

        assert!(!manager.mark_failed(&old));
        assert!(manager.is_connected());
        assert!(manager.mark_failed(&fresh));
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn gate_is_released_after_success() {
        let (_listener, address) = listener().await;
        let manager = ConnectionManager::new(
            address,
            Duration::from_millis(50),
            DEFAULT_READ_TIMEOUT,
            Arc::new(TcpDialer),
        );
        manager.connect().await;
        assert!(!*lock(&manager.connecting));
        let link = manager.current_link().unwrap();
        assert!(link.read_deadline() > Instant::now() + Duration::from_secs(170));
        assert!(link.take_reader().is_some());
        assert!(link.take_reader().is_none());
    }
}
