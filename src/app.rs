//! Appliance wiring: key events in, display out, and the voice pipeline
//! in between.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::audio::{AudioPlayer, AudioRecorder, PlayerHandle, SAMPLE_RATE};
use crate::chat::ChatClient;
use crate::config::ApiConfig;
use crate::error::AppError;
use crate::keys::KeyEvent;
use crate::network;
use crate::screen::{Banner, Display, View};
use crate::speech::{
    Credentials, RecognizerClient, RecognizerConfig, SynthesizerClient, SynthesizerConfig,
};
use crate::ui::{Ui, UiAction};

/// With no key activity, refresh the banner and fall back to the chat screen.
const IDLE_REFRESH: Duration = Duration::from_secs(10);
const NETWORK_PROBE_PERIOD: Duration = Duration::from_secs(10);
/// How long the volume flash stays up before the chat screen returns.
const VOLUME_FLASH: Duration = Duration::from_millis(200);
/// No battery gauge on this hardware revision; the banner value is static.
const BATTERY_PERCENT: u8 = 100;

const SYSTEM_PROMPT: &str = "你现在作为一个可以实时语音对话的智能助手，名字是“小燧”。\n\
你可以和用户聊天、回答问题、讲笑话、讲故事、讲解知识。\n\
当碰到你不懂的问题时，你可以说“我不懂”，然后再次尝试回答。\n\
你回答的内容要保持中立、客观、公正，并尊重用户的隐私和权益。";

/// Everything one voice exchange needs, shared with the pipeline thread.
pub struct VoiceContext {
    pub asr_credentials: Credentials,
    pub tts_credentials: Credentials,
    pub recognizer_config: RecognizerConfig,
    pub synthesizer_config: SynthesizerConfig,
    pub request_timeout: Duration,
    pub chat: ChatClient,
    pub player: PlayerHandle,
}

/// Main coordinator - completely blocking, one iteration per key event.
pub struct App {
    ui: Ui,
    display: Box<dyn Display>,
    keys: Receiver<KeyEvent>,
    recorder: AudioRecorder,
    _player: AudioPlayer,
    player: PlayerHandle,
    voice: Arc<VoiceContext>,
    online: Arc<AtomicBool>,
}

impl App {
    pub fn new(
        config: &ApiConfig,
        display: Box<dyn Display>,
        keys: Receiver<KeyEvent>,
    ) -> Result<Self, AppError> {
        let player = AudioPlayer::new()?;
        let recorder = AudioRecorder::new()?;
        let handle = player.handle();
        log::info!("🎧 audio I/O initialized");

        let chat = ChatClient::new(
            config.chat_url.clone(),
            config.chat_model.clone(),
            config.chat_api_key().to_string(),
        );

        let voice = Arc::new(VoiceContext {
            asr_credentials: config.asr_credentials(),
            tts_credentials: config.tts_credentials(),
            recognizer_config: RecognizerConfig {
                connect_timeout: config.connect_timeout,
                ..RecognizerConfig::default()
            },
            synthesizer_config: SynthesizerConfig {
                connect_timeout: config.connect_timeout,
                ..SynthesizerConfig::default()
            },
            request_timeout: config.request_timeout,
            chat,
            player: handle.clone(),
        });

        let online = network::spawn_connectivity_daemon(NETWORK_PROBE_PERIOD);

        Ok(Self {
            ui: Ui::new(),
            display,
            keys,
            recorder,
            _player: player,
            player: handle,
            voice,
            online,
        })
    }

    fn banner(&self) -> Banner {
        Banner {
            online: self.online.load(Ordering::Relaxed),
            battery_percent: BATTERY_PERCENT,
        }
    }

    /// Run the appliance loop (blocking) until the key source goes away.
    pub fn run(&mut self) -> Result<(), AppError> {
        log::info!("🤖 appliance ready");
        self.display.show(&View::Chat, &self.banner())?;

        loop {
            let event = match self.keys.recv_timeout(IDLE_REFRESH) {
                Ok(event) => Some(event),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => {
                    log::info!("key source closed, shutting down");
                    return Ok(());
                }
            };
            for action in self.ui.handle(event) {
                self.apply(action)?;
            }
        }
    }

    fn apply(&mut self, action: UiAction) -> Result<(), AppError> {
        match action {
            UiAction::Show(view) => self.display.show(&view, &self.banner())?,
            UiAction::StartRecording => self.recorder.start(),
            UiAction::StopRecording => self.finish_recording()?,
            UiAction::VolumeUp => {
                let level = self.player.volume_up();
                self.flash_volume(level)?;
            }
            UiAction::VolumeDown => {
                let level = self.player.volume_down();
                self.flash_volume(level)?;
            }
            UiAction::ScanWifi => {
                let networks = match network::scan_wifi() {
                    Ok(networks) => networks,
                    Err(e) => {
                        log::error!("wifi scan failed: {}", e);
                        Vec::new()
                    }
                };
                let view = self
                    .ui
                    .set_wifi_networks(networks.into_iter().map(|n| n.ssid).collect());
                self.display.show(&view, &self.banner())?;
            }
            UiAction::ConnectWifi { ssid, password } => network::connect_wifi(ssid, password),
        }
        Ok(())
    }

    fn finish_recording(&mut self) -> Result<(), AppError> {
        if !self.recorder.is_recording() {
            return Ok(());
        }
        // Let the tail of the utterance land before cutting off.
        thread::sleep(Duration::from_secs(1));
        let pcm = self.recorder.stop();
        if pcm.is_empty() {
            log::info!("nothing recorded");
            return Ok(());
        }

        let context = Arc::clone(&self.voice);
        thread::Builder::new()
            .name("voice-pipeline".to_string())
            .spawn(move || run_voice_pipeline(context, pcm))
            .map_err(|e| AppError::General(format!("failed to spawn pipeline: {}", e)))?;
        Ok(())
    }

    fn flash_volume(&mut self, level: u8) -> Result<(), AppError> {
        self.display.show(&View::Volume(level), &self.banner())?;
        thread::sleep(VOLUME_FLASH);
        self.display.show(&View::Chat, &self.banner())?;
        Ok(())
    }
}

/// One voice exchange: recognize, answer, speak. Clients are constructed
/// fresh per exchange; each one carries a single-exchange connection.
fn run_voice_pipeline(context: Arc<VoiceContext>, pcm: Vec<u8>) {
    log::info!("🎤 recognizing {} bytes of audio", pcm.len());
    let recognizer = RecognizerClient::new(
        context.asr_credentials.clone(),
        context.recognizer_config.clone(),
    );
    let transcript = match recognizer.recognize(&pcm, SAMPLE_RATE, context.request_timeout) {
        Ok(transcript) => transcript,
        Err(e) => {
            log::error!("recognition failed: {}", e);
            return;
        }
    };
    if transcript.trim().is_empty() {
        log::info!("empty transcript, nothing to answer");
        return;
    }
    log::info!("📝 user said: '{}'", transcript);

    let reply = match context.chat.complete(SYSTEM_PROMPT, &transcript) {
        Ok(reply) => reply,
        Err(e) => {
            log::error!("chat failed: {}", e);
            return;
        }
    };
    log::info!("💬 assistant reply: '{}'", reply);

    let synthesizer = SynthesizerClient::new(
        context.tts_credentials.clone(),
        context.synthesizer_config.clone(),
    );
    let player = context.player.clone();
    if let Err(e) = synthesizer.synthesize(
        &reply,
        move |chunk| player.play(chunk),
        context.request_timeout,
    ) {
        log::error!("synthesis failed: {}", e);
        return;
    }
    log::info!("🔊 reply spoken");
}
