//! Synchronous facade for streaming speech recognition.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::connection::{Connection, Dispatcher};
use super::dispatch::{dispatch_recognize, RecognizeExchange};
use super::frame::{self, RecognizeBusiness};
use super::{Credentials, Endpoint, ExchangeGuard, SpeechError, COMPLETION_POLL_INTERVAL, SEND_INTERVAL};

#[derive(Debug, Clone)]
pub struct RecognizerConfig {
    pub endpoint: Endpoint,
    pub connect_timeout: Duration,
    pub business: RecognizeBusiness,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::wss("ws-api.xfyun.cn", "/v2/iat"),
            connect_timeout: Duration::from_secs(2),
            business: RecognizeBusiness::default(),
        }
    }
}

/// One streaming recognition client. Construction begins the background
/// connection immediately; [`RecognizerClient::recognize`] performs one
/// exchange. At most one exchange runs at a time per client.
pub struct RecognizerClient {
    credentials: Credentials,
    business: RecognizeBusiness,
    connection: Connection,
    exchange: Arc<Mutex<RecognizeExchange>>,
    in_flight: AtomicBool,
}

impl RecognizerClient {
    pub fn new(credentials: Credentials, config: RecognizerConfig) -> Self {
        let exchange = Arc::new(Mutex::new(RecognizeExchange::default()));
        let dispatcher: Dispatcher = {
            let exchange = Arc::clone(&exchange);
            Arc::new(move |raw| dispatch_recognize(raw, &exchange))
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
            in_flight: AtomicBool::new(false),
        }
    }

    /// Recognize one utterance of s16le PCM. Blocks up to `timeout` plus the
    /// bounded connection wait. A timeout or a server fault yields whatever
    /// transcript accumulated (possibly empty) rather than an error; errors
    /// are reserved for not getting the audio out at all.
    pub fn recognize(
        &self,
        audio: &[u8],
        sample_rate: u32,
        timeout: Duration,
    ) -> Result<String, SpeechError> {
        let _guard = ExchangeGuard::acquire(&self.in_flight)?;

        // Reconnect if an earlier session closed; no-op otherwise.
        self.connection.start();
        self.connection.wait_until_connected()?;

        *self.exchange.lock().expect("exchange lock") = RecognizeExchange::default();

        let frames = frame::audio_frames(audio);
        let total = frames.len();
        for (index, audio_frame) in frames.iter().enumerate() {
            let message = frame::audio_frame_json(
                audio_frame,
                index == 0,
                &self.credentials.app_id,
                &self.business,
                sample_rate,
            );
            self.connection.send_frame(message)?;
            if index + 1 < total {
                // Pace sends like real-time capture.
                thread::sleep(SEND_INTERVAL);
            }
        }
        log::debug!("sent {} frames ({} bytes of audio)", total, audio.len());

        let polls = timeout.as_secs().max(1);
        for _ in 0..polls {
            thread::sleep(COMPLETION_POLL_INTERVAL);
            let state = self.exchange.lock().expect("exchange lock");
            if state.done || state.fault.is_some() {
                break;
            }
        }

        let state = self.exchange.lock().expect("exchange lock");
        if let Some(fault) = &state.fault {
            log::error!(
                "recognition ended with server error (code {}), returning partial result",
                fault.code
            );
        } else if !state.done {
            log::warn!(
                "recognition incomplete after {:?}, returning partial result",
                timeout
            );
        }
        log::info!("transcript: '{}'", state.transcript);
        Ok(state.transcript.clone())
    }
}
