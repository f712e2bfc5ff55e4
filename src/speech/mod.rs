//! Blocking streaming clients for cloud speech recognition and synthesis.
//!
//! Both services speak the same protocol shape: a WebSocket connection opened
//! against a signed, single-use URL; JSON frames tagged first/continue/last
//! flowing out; asynchronous result events flowing back on the connection's
//! own thread. The pieces are split accordingly:
//!
//! - [`auth`] computes the time-bound connection signature,
//! - [`connection`] owns the transport thread and its lifecycle,
//! - [`frame`] builds the outbound frame sequence,
//! - [`dispatch`] routes inbound events into per-exchange state,
//! - [`asr`] / [`tts`] are the synchronous facades callers use.

pub mod asr;
pub mod auth;
pub mod connection;
pub mod dispatch;
pub mod frame;
pub mod tts;

pub use asr::{RecognizerClient, RecognizerConfig};
pub use connection::{Connection, MessageAction};
pub use tts::{SynthesizerClient, SynthesizerConfig};

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Pacing delay between audio frames, one chunk's worth of real time.
/// Scheduling policy to avoid overrunning the server's buffering, not a
/// protocol requirement.
pub(crate) const SEND_INTERVAL: Duration = Duration::from_millis(40);

/// How often a facade re-checks exchange state while waiting for completion.
pub(crate) const COMPLETION_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("websocket not connected after {0:?}")]
    NotConnected(Duration),

    #[error("failed to send frame: {0}")]
    SendFailed(String),

    #[error("another exchange is already in flight on this client")]
    Busy,
}

/// Per-service credentials, supplied at construction and never mutated.
/// Each connection attempt derives a fresh signature from them.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub app_id: String,
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    pub fn new(
        app_id: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }
}

/// A service endpoint: `wss://<host><path>` plus the values signed into the
/// authorization token. The plain-text variant exists for in-process test
/// servers.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub host: String,
    pub path: String,
    pub secure: bool,
}

impl Endpoint {
    pub fn wss(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            path: path.into(),
            secure: true,
        }
    }

    pub fn ws(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            path: path.into(),
            secure: false,
        }
    }

    pub fn scheme(&self) -> &'static str {
        if self.secure {
            "wss"
        } else {
            "ws"
        }
    }
}

/// One-exchange-at-a-time guard. The protocol does not support pipelining
/// requests on a single connection, so a second facade call while one is in
/// flight is rejected instead of silently corrupting the first.
pub(crate) struct ExchangeGuard<'a>(&'a AtomicBool);

impl<'a> ExchangeGuard<'a> {
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Result<Self, SpeechError> {
        if flag.swap(true, Ordering::SeqCst) {
            return Err(SpeechError::Busy);
        }
        Ok(Self(flag))
    }
}

impl Drop for ExchangeGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
