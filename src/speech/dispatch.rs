//! Routing of inbound server events into per-exchange state.
//!
//! Dispatch runs on the connection's session thread, so it never blocks and
//! never panics on bad input: a server fault is recorded for the polling
//! facade to observe, and a message that fails to parse is logged and
//! discarded (the protocol interleaves diagnostic and empty messages, and one
//! bad message must not fail the whole exchange).

use std::sync::Mutex;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;

use super::connection::MessageAction;

/// Stream status value the server uses to mark end-of-stream.
const STREAM_END: i64 = 2;

#[derive(Debug, Deserialize)]
pub struct RecognizeResponse {
    pub code: i64,
    #[serde(default)]
    pub sid: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<RecognizeData>,
}

#[derive(Debug, Deserialize)]
pub struct RecognizeData {
    #[serde(default)]
    pub result: Option<RecognizeResult>,
}

#[derive(Debug, Deserialize)]
pub struct RecognizeResult {
    #[serde(default)]
    pub ws: Vec<WordSegment>,
}

#[derive(Debug, Deserialize)]
pub struct WordSegment {
    #[serde(default)]
    pub cw: Vec<CandidateWord>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateWord {
    #[serde(default)]
    pub w: String,
}

#[derive(Debug, Deserialize)]
pub struct SynthesizeResponse {
    pub code: i64,
    #[serde(default)]
    pub sid: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<SynthesizeData>,
}

#[derive(Debug, Deserialize)]
pub struct SynthesizeData {
    #[serde(default)]
    pub audio: String,
    #[serde(default)]
    pub status: Option<i64>,
}

/// A non-zero result code reported by the server.
#[derive(Debug, Clone)]
pub struct ServerFault {
    pub code: i64,
    pub message: String,
    pub sid: String,
}

/// State of one recognition exchange, shared with the session thread.
#[derive(Debug, Default)]
pub struct RecognizeExchange {
    pub transcript: String,
    pub done: bool,
    pub fault: Option<ServerFault>,
    pub sid: Option<String>,
}

/// State of one synthesis exchange, shared with the session thread.
#[derive(Debug, Default)]
pub struct SynthesizeExchange {
    pub chunks_delivered: usize,
    pub finished: bool,
    pub fault: Option<ServerFault>,
    pub sid: Option<String>,
}

/// Consumer of decoded synthesis audio, invoked on the session thread in
/// arrival order.
pub type AudioSink = Box<dyn FnMut(&[u8]) + Send>;

pub fn dispatch_recognize(raw: &str, exchange: &Mutex<RecognizeExchange>) -> MessageAction {
    if raw.is_empty() {
        return MessageAction::Continue;
    }
    let response: RecognizeResponse = match serde_json::from_str(raw) {
        Ok(response) => response,
        Err(e) => {
            log::warn!("discarding unparseable recognition message: {}", e);
            return MessageAction::Continue;
        }
    };

    let sid = response.sid.unwrap_or_default();
    let mut exchange = exchange.lock().expect("exchange lock");
    exchange.sid = Some(sid.clone());

    if response.code != 0 {
        let message = response.message.unwrap_or_default();
        log::error!(
            "sid:{} recognition error: {} (code {})",
            sid,
            message,
            response.code
        );
        exchange.fault = Some(ServerFault {
            code: response.code,
            message,
            sid,
        });
        return MessageAction::Continue;
    }

    let segments = response
        .data
        .and_then(|data| data.result)
        .map(|result| result.ws)
        .unwrap_or_default();
    for segment in &segments {
        for candidate in &segment.cw {
            exchange.transcript.push_str(&candidate.w);
        }
    }
    log::debug!("sid:{} transcript so far: '{}'", sid, exchange.transcript);

    // Done on the first successful payload; later refinements still land in
    // the transcript if they arrive before the facade's next poll.
    exchange.done = true;
    MessageAction::Continue
}

pub fn dispatch_synthesize(
    raw: &str,
    exchange: &Mutex<SynthesizeExchange>,
    sink: &Mutex<Option<AudioSink>>,
) -> MessageAction {
    if raw.is_empty() {
        return MessageAction::Continue;
    }
    let response: SynthesizeResponse = match serde_json::from_str(raw) {
        Ok(response) => response,
        Err(e) => {
            log::warn!("discarding unparseable synthesis message: {}", e);
            return MessageAction::Continue;
        }
    };

    let sid = response.sid.unwrap_or_default();
    let mut exchange = exchange.lock().expect("exchange lock");
    exchange.sid = Some(sid.clone());

    if response.code != 0 {
        let message = response.message.unwrap_or_default();
        log::error!(
            "sid:{} synthesis error: {} (code {})",
            sid,
            message,
            response.code
        );
        exchange.fault = Some(ServerFault {
            code: response.code,
            message,
            sid,
        });
        return MessageAction::Continue;
    }

    let data = match response.data {
        Some(data) => data,
        None => return MessageAction::Continue,
    };
    let audio = match BASE64.decode(data.audio.as_bytes()) {
        Ok(audio) => audio,
        Err(e) => {
            log::warn!("sid:{} discarding undecodable audio chunk: {}", sid, e);
            return MessageAction::Continue;
        }
    };

    if let Some(sink) = sink.lock().expect("sink lock").as_mut() {
        sink(&audio);
    }
    exchange.chunks_delivered += 1;

    if data.status == Some(STREAM_END) {
        log::info!("sid:{} synthesis stream complete", sid);
        exchange.finished = true;
        return MessageAction::Close;
    }
    MessageAction::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recognize(raw: &str, exchange: &Mutex<RecognizeExchange>) -> MessageAction {
        dispatch_recognize(raw, exchange)
    }

    #[test]
    fn success_messages_accumulate_fragments_in_order() {
        let exchange = Mutex::new(RecognizeExchange::default());

        let first = json!({
            "code": 0, "sid": "iat-1",
            "data": { "result": { "ws": [ { "cw": [ { "w": "你好" } ] } ] } }
        })
        .to_string();
        let second = json!({
            "code": 0, "sid": "iat-1",
            "data": { "result": { "ws": [ { "cw": [ { "w": "世界" } ] } ] } }
        })
        .to_string();

        assert_eq!(recognize(&first, &exchange), MessageAction::Continue);
        assert_eq!(recognize(&second, &exchange), MessageAction::Continue);

        let state = exchange.lock().unwrap();
        assert_eq!(state.transcript, "你好世界");
        assert!(state.done);
        assert!(state.fault.is_none());
        assert_eq!(state.sid.as_deref(), Some("iat-1"));
    }

    #[test]
    fn multi_segment_message_keeps_word_order() {
        let exchange = Mutex::new(RecognizeExchange::default());
        let raw = json!({
            "code": 0, "sid": "iat-2",
            "data": { "result": { "ws": [
                { "cw": [ { "w": "a" } ] },
                { "cw": [ { "w": "b" }, { "w": "c" } ] }
            ] } }
        })
        .to_string();

        recognize(&raw, &exchange);
        assert_eq!(exchange.lock().unwrap().transcript, "abc");
    }

    #[test]
    fn server_fault_is_recorded_not_fatal() {
        let exchange = Mutex::new(RecognizeExchange::default());
        let raw = json!({ "code": 10165, "sid": "iat-3", "message": "invalid app_id" }).to_string();

        assert_eq!(recognize(&raw, &exchange), MessageAction::Continue);

        let state = exchange.lock().unwrap();
        let fault = state.fault.as_ref().unwrap();
        assert_eq!(fault.code, 10165);
        assert_eq!(fault.message, "invalid app_id");
        assert_eq!(fault.sid, "iat-3");
        assert!(!state.done);
    }

    #[test]
    fn malformed_message_is_discarded_between_good_ones() {
        let exchange = Mutex::new(RecognizeExchange::default());

        let good = |w: &str| {
            json!({
                "code": 0, "sid": "iat-4",
                "data": { "result": { "ws": [ { "cw": [ { "w": w } ] } ] } }
            })
            .to_string()
        };

        recognize(&good("你好"), &exchange);
        assert_eq!(recognize("{not json", &exchange), MessageAction::Continue);
        assert_eq!(recognize("", &exchange), MessageAction::Continue);
        recognize(&good("世界"), &exchange);

        let state = exchange.lock().unwrap();
        assert_eq!(state.transcript, "你好世界");
        assert!(state.fault.is_none());
    }

    #[test]
    fn synthesis_chunks_reach_the_sink_and_final_closes() {
        let exchange = Mutex::new(SynthesizeExchange::default());
        let received = std::sync::Arc::new(Mutex::new(Vec::new()));
        let sink_target = std::sync::Arc::clone(&received);
        let sink: Mutex<Option<AudioSink>> = Mutex::new(Some(Box::new(move |chunk: &[u8]| {
            sink_target.lock().unwrap().push(chunk.to_vec());
        })));

        let chunk = |bytes: &[u8], status: i64| {
            json!({
                "code": 0, "sid": "tts-1",
                "data": { "audio": BASE64.encode(bytes), "status": status }
            })
            .to_string()
        };

        assert_eq!(
            dispatch_synthesize(&chunk(b"aa", 1), &exchange, &sink),
            MessageAction::Continue
        );
        assert_eq!(
            dispatch_synthesize(&chunk(b"bb", 1), &exchange, &sink),
            MessageAction::Continue
        );
        assert_eq!(
            dispatch_synthesize(&chunk(b"cc", 2), &exchange, &sink),
            MessageAction::Close
        );

        let state = exchange.lock().unwrap();
        assert!(state.finished);
        assert_eq!(state.chunks_delivered, 3);
        assert_eq!(
            *received.lock().unwrap(),
            vec![b"aa".to_vec(), b"bb".to_vec(), b"cc".to_vec()]
        );
    }

    #[test]
    fn synthesis_fault_is_recorded() {
        let exchange = Mutex::new(SynthesizeExchange::default());
        let sink: Mutex<Option<AudioSink>> = Mutex::new(None);
        let raw = json!({ "code": 11200, "sid": "tts-2", "message": "auth failed" }).to_string();

        assert_eq!(
            dispatch_synthesize(&raw, &exchange, &sink),
            MessageAction::Continue
        );

        let state = exchange.lock().unwrap();
        assert_eq!(state.fault.as_ref().unwrap().code, 11200);
        assert!(!state.finished);
        assert_eq!(state.chunks_delivered, 0);
    }

    #[test]
    fn undecodable_audio_is_discarded() {
        let exchange = Mutex::new(SynthesizeExchange::default());
        let sink: Mutex<Option<AudioSink>> = Mutex::new(None);
        let raw = json!({
            "code": 0, "sid": "tts-3",
            "data": { "audio": "@@not-base64@@", "status": 1 }
        })
        .to_string();

        assert_eq!(
            dispatch_synthesize(&raw, &exchange, &sink),
            MessageAction::Continue
        );
        assert_eq!(exchange.lock().unwrap().chunks_delivered, 0);
    }
}
