//! Local audio playback and capture, 16 kHz mono s16le throughout.
//!
//! The cpal streams are owned by the `App` on the main thread (`cpal::Stream`
//! is not `Send`); worker threads talk to playback through a cloneable
//! [`PlayerHandle`]. Playback samples flow through a bounded channel into the
//! output callback, which gives callers ALSA-like backpressure: `play`
//! blocks once the device falls behind.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use crossbeam_channel::{bounded, Sender};
use thiserror::Error;

pub const SAMPLE_RATE: u32 = 16_000;
const CHANNELS: u16 = 1;
/// Pending playback buffers; roughly a second of audio at typical chunk
/// sizes before `play` starts blocking.
const PLAYBACK_QUEUE_DEPTH: usize = 16;

const VOLUME_STEP: u8 = 10;
const DEFAULT_VOLUME: u8 = 70;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("no default {0} device")]
    NoDevice(&'static str),

    #[error("audio stream error: {0}")]
    Stream(String),
}

fn stream_config() -> StreamConfig {
    StreamConfig {
        channels: CHANNELS,
        sample_rate: SampleRate(SAMPLE_RATE),
        buffer_size: BufferSize::Default,
    }
}

/// Playback side: owns the output stream for its lifetime.
pub struct AudioPlayer {
    _stream: cpal::Stream,
    handle: PlayerHandle,
}

/// Cloneable, thread-safe handle feeding the output stream.
#[derive(Clone)]
pub struct PlayerHandle {
    samples: Sender<Vec<i16>>,
    volume: Arc<AtomicU8>,
}

impl AudioPlayer {
    pub fn new() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoDevice("output"))?;

        let (samples_tx, samples_rx) = bounded::<Vec<i16>>(PLAYBACK_QUEUE_DEPTH);
        let volume = Arc::new(AtomicU8::new(DEFAULT_VOLUME));
        let callback_volume = Arc::clone(&volume);

        let mut pending: VecDeque<i16> = VecDeque::new();
        let stream = device
            .build_output_stream(
                &stream_config(),
                move |data: &mut [i16], _| {
                    while pending.len() < data.len() {
                        match samples_rx.try_recv() {
                            Ok(chunk) => pending.extend(chunk),
                            Err(_) => break,
                        }
                    }
                    let gain = callback_volume.load(Ordering::Relaxed);
                    for slot in data.iter_mut() {
                        *slot = match pending.pop_front() {
                            Some(sample) => apply_gain(sample, gain),
                            None => 0,
                        };
                    }
                },
                |e| log::error!("output stream error: {}", e),
                None,
            )
            .map_err(|e| AudioError::Stream(e.to_string()))?;
        stream.play().map_err(|e| AudioError::Stream(e.to_string()))?;

        log::info!("audio output ready ({} Hz mono)", SAMPLE_RATE);
        Ok(Self {
            _stream: stream,
            handle: PlayerHandle {
                samples: samples_tx,
                volume,
            },
        })
    }

    pub fn handle(&self) -> PlayerHandle {
        self.handle.clone()
    }
}

impl PlayerHandle {
    /// Queue raw s16le bytes for playback. Blocks while the device is a full
    /// queue behind.
    pub fn play(&self, pcm: &[u8]) {
        let samples = bytes_to_samples(pcm);
        if samples.is_empty() {
            return;
        }
        // Err means the output stream is gone; nothing useful to do but log.
        if self.samples.send(samples).is_err() {
            log::warn!("dropping audio: output stream closed");
        }
    }

    pub fn volume(&self) -> u8 {
        self.volume.load(Ordering::Relaxed)
    }

    pub fn volume_up(&self) -> u8 {
        let level = step_up(self.volume());
        self.volume.store(level, Ordering::Relaxed);
        log::info!("volume up to {}", level);
        level
    }

    pub fn volume_down(&self) -> u8 {
        let level = step_down(self.volume());
        self.volume.store(level, Ordering::Relaxed);
        log::info!("volume down to {}", level);
        level
    }
}

/// Capture side: the input stream runs for the app's lifetime and the
/// recording flag gates whether samples are kept.
pub struct AudioRecorder {
    _stream: cpal::Stream,
    recording: Arc<AtomicBool>,
    captured: Arc<Mutex<Vec<u8>>>,
}

impl AudioRecorder {
    pub fn new() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(AudioError::NoDevice("input"))?;

        let recording = Arc::new(AtomicBool::new(false));
        let captured = Arc::new(Mutex::new(Vec::new()));
        let callback_recording = Arc::clone(&recording);
        let callback_captured = Arc::clone(&captured);

        let stream = device
            .build_input_stream(
                &stream_config(),
                move |data: &[i16], _| {
                    if !callback_recording.load(Ordering::Relaxed) {
                        return;
                    }
                    let mut captured = callback_captured.lock().expect("capture lock");
                    for sample in data {
                        captured.extend_from_slice(&sample.to_le_bytes());
                    }
                },
                |e| log::error!("input stream error: {}", e),
                None,
            )
            .map_err(|e| AudioError::Stream(e.to_string()))?;
        stream.play().map_err(|e| AudioError::Stream(e.to_string()))?;

        log::info!("audio input ready ({} Hz mono)", SAMPLE_RATE);
        Ok(Self {
            _stream: stream,
            recording,
            captured,
        })
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Relaxed)
    }

    /// Begin capturing. Idempotent; a second start while recording is a no-op.
    pub fn start(&self) {
        if self.recording.swap(true, Ordering::SeqCst) {
            return;
        }
        self.captured.lock().expect("capture lock").clear();
        log::info!("recording started");
    }

    /// Stop capturing and return the utterance as s16le bytes. Returns empty
    /// when not recording.
    pub fn stop(&self) -> Vec<u8> {
        if !self.recording.swap(false, Ordering::SeqCst) {
            return Vec::new();
        }
        let pcm = std::mem::take(&mut *self.captured.lock().expect("capture lock"));
        log::info!("recording stopped ({} bytes)", pcm.len());
        pcm
    }
}

fn bytes_to_samples(pcm: &[u8]) -> Vec<i16> {
    pcm.chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

fn apply_gain(sample: i16, volume: u8) -> i16 {
    (sample as i32 * volume as i32 / 100) as i16
}

fn step_up(volume: u8) -> u8 {
    volume.saturating_add(VOLUME_STEP).min(100)
}

fn step_down(volume: u8) -> u8 {
    volume.saturating_sub(VOLUME_STEP)
}
