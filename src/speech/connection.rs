//! Lifecycle of one streaming WebSocket connection.
//!
//! Each client owns one [`Connection`]. `start()` spawns a background session
//! thread that signs a fresh URL, performs the handshake, then services an
//! outbound frame channel and the inbound socket. All lifecycle transitions
//! happen on that thread; callers only observe the connected flag (bounded
//! poll) and enqueue frames. When the session ends, for any reason, the
//! thread resets the shared state so a later `start()` reconnects.

use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use super::{auth, Credentials, Endpoint, SpeechError};

/// Interval of the bounded readiness poll.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(200);
/// Socket read timeout; bounds how long the session thread is blind to the
/// outbound queue.
const SOCKET_READ_TIMEOUT: Duration = Duration::from_millis(50);
/// How long to keep draining after we initiated a close handshake.
const CLOSE_GRACE: Duration = Duration::from_secs(2);
/// Outbound queue depth; pushes beyond it block the caller briefly.
const OUTBOUND_DEPTH: usize = 64;

/// What the dispatcher wants done with the connection after a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageAction {
    Continue,
    Close,
}

/// Inbound message hook, invoked on the session thread. Must not block.
pub type Dispatcher = Arc<dyn Fn(&str) -> MessageAction + Send + Sync>;

enum Outbound {
    Frame(String),
    Close,
}

/// State shared between the session thread and callers. Callers read the
/// connected flag; the session thread owns every write except the sender
/// installation in `start()`.
struct Shared {
    connected: AtomicBool,
    attempt_live: AtomicBool,
    outbound: Mutex<Option<Sender<Outbound>>>,
}

pub struct Connection {
    endpoint: Endpoint,
    credentials: Credentials,
    connect_timeout: Duration,
    dispatcher: Dispatcher,
    shared: Arc<Shared>,
}

impl Connection {
    pub fn new(
        endpoint: Endpoint,
        credentials: Credentials,
        connect_timeout: Duration,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            endpoint,
            credentials,
            connect_timeout,
            dispatcher,
            shared: Arc::new(Shared {
                connected: AtomicBool::new(false),
                attempt_live: AtomicBool::new(false),
                outbound: Mutex::new(None),
            }),
        }
    }

    /// Begin a background connection attempt. Idempotent: while an attempt or
    /// a live session exists, this does nothing.
    pub fn start(&self) {
        if self.shared.attempt_live.swap(true, Ordering::SeqCst) {
            return;
        }

        let (tx, rx) = bounded(OUTBOUND_DEPTH);
        *self.shared.outbound.lock().expect("outbound lock") = Some(tx);

        let endpoint = self.endpoint.clone();
        let credentials = self.credentials.clone();
        let shared = Arc::clone(&self.shared);
        let dispatcher = Arc::clone(&self.dispatcher);

        let spawned = thread::Builder::new()
            .name("speech-ws".to_string())
            .spawn(move || run_session(endpoint, credentials, shared, rx, dispatcher));
        if let Err(e) = spawned {
            log::error!("failed to spawn session thread: {}", e);
            session_over(&self.shared);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Bounded wait for the connected flag. Attempt count derives from the
    /// configured connect timeout; on expiry the caller gets `NotConnected`,
    /// a recoverable per-call failure.
    pub fn wait_until_connected(&self) -> Result<(), SpeechError> {
        let attempts = (self.connect_timeout.as_millis() / READY_POLL_INTERVAL.as_millis()).max(1);
        for _ in 0..attempts {
            if self.is_connected() {
                return Ok(());
            }
            log::debug!("websocket not connected yet, waiting...");
            thread::sleep(READY_POLL_INTERVAL);
        }
        if self.is_connected() {
            Ok(())
        } else {
            Err(SpeechError::NotConnected(self.connect_timeout))
        }
    }

    /// Queue one text frame for delivery in order. Fails when no session is
    /// live or the session died after accepting earlier frames.
    pub fn send_frame(&self, frame: String) -> Result<(), SpeechError> {
        let guard = self.shared.outbound.lock().expect("outbound lock");
        match guard.as_ref() {
            Some(tx) => tx
                .send(Outbound::Frame(frame))
                .map_err(|_| SpeechError::SendFailed("connection closed".to_string())),
            None => Err(SpeechError::SendFailed("no live connection".to_string())),
        }
    }

    /// Ask the session thread to run the close handshake. Best effort; the
    /// session's own teardown is the authoritative state reset.
    pub fn close(&self) {
        let guard = self.shared.outbound.lock().expect("outbound lock");
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send(Outbound::Close);
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

/// One connection session, start to finish, on its own thread.
fn run_session(
    endpoint: Endpoint,
    credentials: Credentials,
    shared: Arc<Shared>,
    outbound: Receiver<Outbound>,
    dispatcher: Dispatcher,
) {
    // Signature and timestamp are single-use: computed here, per attempt.
    let url = auth::signed_url(&endpoint, &credentials, Utc::now());
    log::info!("connecting to {}://{}{}", endpoint.scheme(), endpoint.host, endpoint.path);

    let mut socket = match tungstenite::connect(url.as_str()) {
        Ok((socket, response)) => {
            log::info!("websocket connected, status: {}", response.status());
            socket
        }
        Err(e) => {
            log::error!("websocket connect failed: {}", e);
            session_over(&shared);
            return;
        }
    };

    set_read_timeout(&socket);
    // Connected only after a successful server handshake.
    shared.connected.store(true, Ordering::SeqCst);

    let mut closing_since: Option<Instant> = None;

    loop {
        // Service the outbound queue first so frames keep their order.
        loop {
            match outbound.try_recv() {
                Ok(Outbound::Frame(text)) => {
                    if let Err(e) = socket.send(Message::Text(text)) {
                        log::error!("frame send failed: {}", e);
                        session_over(&shared);
                        return;
                    }
                }
                Ok(Outbound::Close) => {
                    let _ = socket.close(None);
                    closing_since.get_or_insert_with(Instant::now);
                    break;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    // Every handle is gone; shut the session down.
                    let _ = socket.close(None);
                    closing_since.get_or_insert_with(Instant::now);
                    break;
                }
            }
        }

        if let Some(since) = closing_since {
            if since.elapsed() > CLOSE_GRACE {
                log::warn!("close handshake not acknowledged, dropping connection");
                break;
            }
        }

        match socket.read() {
            Ok(Message::Text(text)) => {
                if dispatcher(&text) == MessageAction::Close {
                    let _ = socket.close(None);
                    closing_since.get_or_insert_with(Instant::now);
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = socket.send(Message::Pong(payload));
            }
            Ok(Message::Close(_)) => {
                log::info!("server closed the connection");
                break;
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(ref e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                // Read timeout: loop around and service the outbound queue.
            }
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                break;
            }
            Err(e) => {
                log::error!("websocket error: {}", e);
                break;
            }
        }
    }

    log::info!("websocket session ended");
    session_over(&shared);
}

/// Authoritative teardown: clear connected, drop the outbound sender, release
/// the attempt slot so a future `start()` can reconnect.
fn session_over(shared: &Shared) {
    shared.connected.store(false, Ordering::SeqCst);
    *shared.outbound.lock().expect("outbound lock") = None;
    shared.attempt_live.store(false, Ordering::SeqCst);
}

fn set_read_timeout(socket: &WebSocket<MaybeTlsStream<TcpStream>>) {
    let stream = match socket.get_ref() {
        MaybeTlsStream::Plain(stream) => stream,
        MaybeTlsStream::NativeTls(tls) => tls.get_ref(),
        _ => return,
    };
    if let Err(e) = stream.set_read_timeout(Some(SOCKET_READ_TIMEOUT)) {
        log::warn!("failed to set socket read timeout: {}", e);
    }
}
