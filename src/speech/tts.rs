//! Synchronous facade for streaming speech synthesis.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::connection::{Connection, Dispatcher};
use super::dispatch::{dispatch_synthesize, AudioSink, SynthesizeExchange};
use super::frame::{self, SynthesizeBusiness};
use super::{Credentials, Endpoint, ExchangeGuard, SpeechError, COMPLETION_POLL_INTERVAL};

#[derive(Debug, Clone)]
pub struct SynthesizerConfig {
    pub endpoint: Endpoint,
    pub connect_timeout: Duration,
    pub business: SynthesizeBusiness,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::wss("tts-api.xfyun.cn", "/v2/tts"),
            connect_timeout: Duration::from_secs(2),
            business: SynthesizeBusiness::default(),
        }
    }
}

/// One streaming synthesis client. Construction begins the background
/// connection immediately; [`SynthesizerClient::synthesize`] performs one
/// exchange, delivering audio chunks to the caller's sink in arrival order
/// before it returns.
pub struct SynthesizerClient {
    credentials: Credentials,
    business: SynthesizeBusiness,
    connection: Connection,
    exchange: Arc<Mutex<SynthesizeExchange>>,
    sink: Arc<Mutex<Option<AudioSink>>>,
    in_flight: AtomicBool,
}

impl SynthesizerClient {
    pub fn new(credentials: Credentials, config: SynthesizerConfig) -> Self {
        let exchange = Arc::new(Mutex::new(SynthesizeExchange::default()));
        let sink: Arc<Mutex<Option<AudioSink>>> = Arc::new(Mutex::new(None));
        let dispatcher: Dispatcher = {
            let exchange = Arc::clone(&exchange);
            let sink = Arc::clone(&sink);
            Arc::new(move |raw| dispatch_synthesize(raw, &exchange, &sink))
        };
        let connection = Connection::new(
            config.endpoint,
            credentials.clone(),
            config.connect_timeout,
            dispatcher,
        );
        connection.start();

        Self {
            credentials,
            business: config.business,
            connection,
            exchange,
            sink,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Synthesize `text`, feeding decoded audio chunks to `on_chunk` as they
    /// arrive. Returns once the server signals end-of-stream, the connection
    /// closes, or `timeout` elapses; no chunk is delivered after return.
    pub fn synthesize<F>(&self, text: &str, on_chunk: F, timeout: Duration) -> Result<(), SpeechError>
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        let _guard = ExchangeGuard::acquire(&self.in_flight)?;

        self.connection.start();
        self.connection.wait_until_connected()?;

        *self.exchange.lock().expect("exchange lock") = SynthesizeExchange::default();
        *self.sink.lock().expect("sink lock") = Some(Box::new(on_chunk));

        let result = self.run_exchange(text, timeout);

        // Disarm the sink so a late message cannot call back after return.
        *self.sink.lock().expect("sink lock") = None;
        result
    }

    fn run_exchange(&self, text: &str, timeout: Duration) -> Result<(), SpeechError> {
        let message = frame::text_frame_json(text, &self.credentials.app_id, &self.business);
        self.connection.send_frame(message)?;
        log::debug!("sent synthesis request ({} chars)", text.chars().count());

        let polls = timeout.as_secs().max(1);
        for _ in 0..polls {
            thread::sleep(COMPLETION_POLL_INTERVAL);
            {
                let state = self.exchange.lock().expect("exchange lock");
                if state.finished || state.fault.is_some() {
                    break;
                }
            }
            if !self.connection.is_connected() {
                log::info!("connection closed before end-of-stream");
                break;
            }
        }

        let state = self.exchange.lock().expect("exchange lock");
        if let Some(fault) = &state.fault {
            log::error!(
                "synthesis ended with server error (code {}): {}",
                fault.code,
                fault.message
            );
        } else if !state.finished {
            log::warn!("synthesis incomplete, {} chunks delivered", state.chunks_delivered);
        }
        log::info!("delivered {} audio chunks", state.chunks_delivered);
        Ok(())
    }
}
