//! Outbound frame construction for both streaming directions.
//!
//! Audio flows out as a FIRST/CONTINUE/LAST sequence of fixed-size chunks;
//! text goes out as a single combined frame. Only the frame carrying the
//! session parameters (the first one sent on an exchange) includes the
//! `common` and `business` sections.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::json;

/// Bytes per audio frame: ~40ms of 16kHz 16-bit mono PCM.
pub const AUDIO_CHUNK_BYTES: usize = 1280;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    First,
    Continue,
    Last,
}

impl FrameStatus {
    /// Wire value of the `data.status` field.
    pub fn code(self) -> u8 {
        match self {
            FrameStatus::First => 0,
            FrameStatus::Continue => 1,
            FrameStatus::Last => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub status: FrameStatus,
    pub chunk: Vec<u8>,
}

/// Recognition session parameters carried by the first frame.
#[derive(Debug, Clone)]
pub struct RecognizeBusiness {
    pub domain: String,
    pub language: String,
    pub accent: String,
    pub vinfo: u8,
    pub vad_eos: u32,
}

impl Default for RecognizeBusiness {
    fn default() -> Self {
        Self {
            domain: "iat".to_string(),
            language: "zh_cn".to_string(),
            accent: "mandarin".to_string(),
            vinfo: 1,
            vad_eos: 10_000,
        }
    }
}

/// Synthesis session parameters carried by the (single) frame.
#[derive(Debug, Clone)]
pub struct SynthesizeBusiness {
    pub voice: String,
    pub speed: u8,
    pub sample_rate: u32,
}

impl Default for SynthesizeBusiness {
    fn default() -> Self {
        Self {
            voice: "aisjinger".to_string(),
            speed: 80,
            sample_rate: 16_000,
        }
    }
}

/// Split an audio payload into the ordered frame sequence.
///
/// Every payload yields exactly one FIRST-positioned frame and exactly one
/// LAST frame: a payload that fits in a single chunk is followed by an empty
/// LAST frame, and an empty payload collapses to a lone frame already tagged
/// LAST (serialized with the full session parameters, see
/// [`audio_frame_json`]). Concatenating every frame's chunk reconstructs the
/// payload byte for byte.
pub fn audio_frames(payload: &[u8]) -> Vec<AudioFrame> {
    if payload.is_empty() {
        return vec![AudioFrame {
            status: FrameStatus::Last,
            chunk: Vec::new(),
        }];
    }

    let chunks: Vec<&[u8]> = payload.chunks(AUDIO_CHUNK_BYTES).collect();
    let mut frames = Vec::with_capacity(chunks.len() + 1);
    for (index, chunk) in chunks.iter().enumerate() {
        let status = if index == 0 {
            FrameStatus::First
        } else if index + 1 == chunks.len() {
            FrameStatus::Last
        } else {
            FrameStatus::Continue
        };
        frames.push(AudioFrame {
            status,
            chunk: chunk.to_vec(),
        });
    }

    if frames.len() == 1 {
        frames.push(AudioFrame {
            status: FrameStatus::Last,
            chunk: Vec::new(),
        });
    }
    frames
}

/// Serialize one audio frame. `include_session` is true for the first frame
/// of the exchange, which must carry the `common`/`business` sections
/// whatever its status tag is.
pub fn audio_frame_json(
    frame: &AudioFrame,
    include_session: bool,
    app_id: &str,
    business: &RecognizeBusiness,
    sample_rate: u32,
) -> String {
    let data = json!({
        "status": frame.status.code(),
        "format": format!("audio/L16;rate={}", sample_rate),
        "audio": BASE64.encode(&frame.chunk),
        "encoding": "raw",
    });

    let message = if include_session {
        json!({
            "common": { "app_id": app_id },
            "business": {
                "domain": business.domain,
                "language": business.language,
                "accent": business.accent,
                "vinfo": business.vinfo,
                "vad_eos": business.vad_eos,
            },
            "data": data,
        })
    } else {
        json!({ "data": data })
    };
    message.to_string()
}

/// Serialize the single combined frame of a synthesis exchange. The input is
/// bounded, so no chunking: the frame is first and last at once, tagged with
/// end-of-input. Empty text passes through unmodified.
pub fn text_frame_json(text: &str, app_id: &str, business: &SynthesizeBusiness) -> String {
    json!({
        "common": { "app_id": app_id },
        "business": {
            "aue": "raw",
            "auf": format!("audio/L16;rate={}", business.sample_rate),
            "vcn": business.voice,
            "tte": "utf8",
            "speed": business.speed,
        },
        "data": {
            "status": FrameStatus::Last.code(),
            "text": BASE64.encode(text.as_bytes()),
        },
    })
    .to_string()
}
