//! In-process WebSocket server for protocol scenario tests.

use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use tungstenite::{Message, WebSocket};

pub struct MockServer {
    /// `host:port` to point an `Endpoint::ws` at.
    pub host: String,
    /// Connections accepted so far.
    pub accepted: Arc<AtomicUsize>,
}

/// Spawn a server running `behavior` for every accepted connection, in
/// accept order.
pub fn spawn_server<F>(mut behavior: F) -> MockServer
where
    F: FnMut(WebSocket<TcpStream>) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
    let host = format!(
        "127.0.0.1:{}",
        listener.local_addr().expect("local addr").port()
    );
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            counter.fetch_add(1, Ordering::SeqCst);
            match tungstenite::accept(stream) {
                Ok(socket) => behavior(socket),
                Err(e) => eprintln!("mock server handshake failed: {e}"),
            }
        }
    });

    MockServer { host, accepted }
}

/// Read request frames until the end-of-input frame (`data.status == 2`) or
/// the peer goes away. Returns every frame seen, in order.
pub fn read_request_frames(socket: &mut WebSocket<TcpStream>) -> Vec<serde_json::Value> {
    let mut frames = Vec::new();
    loop {
        match socket.read() {
            Ok(Message::Text(text)) => {
                let value: serde_json::Value =
                    serde_json::from_str(&text).expect("request frame is JSON");
                let status = value["data"]["status"].as_i64();
                frames.push(value);
                if status == Some(2) {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(_) => break,
        }
    }
    frames
}

/// Drain the socket until the client's close frame (or an error), reporting
/// whether a close frame was seen.
pub fn drain_until_close(socket: &mut WebSocket<TcpStream>) -> bool {
    loop {
        match socket.read() {
            Ok(Message::Close(_)) => return true,
            Ok(_) => {}
            Err(_) => return false,
        }
    }
}
