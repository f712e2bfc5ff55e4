//! Synthesis client scenarios against an in-process mock server.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};
use tungstenite::Message;

use sui_agent::speech::{Credentials, Endpoint, SynthesizerClient, SynthesizerConfig};

fn credentials() -> Credentials {
    Credentials::new("app-test", "key-test", "secret-test")
}

fn config(host: &str) -> SynthesizerConfig {
    SynthesizerConfig {
        endpoint: Endpoint::ws(host, "/v2/tts"),
        connect_timeout: Duration::from_secs(2),
        ..SynthesizerConfig::default()
    }
}

fn audio_reply(bytes: &[u8], status: i64) -> String {
    json!({
        "code": 0, "sid": "tts-1",
        "data": { "audio": BASE64.encode(bytes), "status": status }
    })
    .to_string()
}

fn collecting_sink() -> (Arc<Mutex<Vec<Vec<u8>>>>, impl FnMut(&[u8]) + Send + 'static) {
    let chunks: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
    let target = Arc::clone(&chunks);
    let sink = move |chunk: &[u8]| target.lock().unwrap().push(chunk.to_vec());
    (chunks, sink)
}

#[test]
fn streams_three_chunks_then_closes() {
    let captured: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let capture = Arc::clone(&captured);
    let saw_close = Arc::new(AtomicBool::new(false));
    let close_flag = Arc::clone(&saw_close);

    let server = common::spawn_server(move |mut socket| {
        let frames = common::read_request_frames(&mut socket);
        *capture.lock().unwrap() = frames;
        for (bytes, status) in [(b"0123".as_slice(), 1), (b"4567".as_slice(), 1), (b"89ab".as_slice(), 2)] {
            socket
                .send(Message::Text(audio_reply(bytes, status)))
                .expect("send chunk");
        }
        // End-of-stream makes the client close; expect its close frame.
        close_flag.store(common::drain_until_close(&mut socket), Ordering::SeqCst);
    });

    let client = SynthesizerClient::new(credentials(), config(&server.host));
    let (chunks, sink) = collecting_sink();

    client
        .synthesize("测试", sink, Duration::from_secs(10))
        .unwrap();

    {
        let delivered = chunks.lock().unwrap();
        assert_eq!(
            *delivered,
            vec![b"0123".to_vec(), b"4567".to_vec(), b"89ab".to_vec()],
            "three chunks, in arrival order, all before return"
        );
    }

    // The request is a single combined first-and-last frame.
    let frames = captured.lock().unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["common"]["app_id"], "app-test");
    assert_eq!(frames[0]["business"]["aue"], "raw");
    assert_eq!(frames[0]["business"]["tte"], "utf8");
    assert_eq!(frames[0]["data"]["status"], 2);
    assert_eq!(
        frames[0]["data"]["text"].as_str().unwrap(),
        BASE64.encode("测试".as_bytes())
    );
    drop(frames);

    // The connection was closed after the final chunk and nothing else
    // reaches the sink.
    thread::sleep(Duration::from_millis(500));
    assert!(saw_close.load(Ordering::SeqCst), "client ran the close handshake");
    assert_eq!(chunks.lock().unwrap().len(), 3);
}

#[test]
fn server_fault_ends_the_exchange_without_chunks() {
    let server = common::spawn_server(|mut socket| {
        let _ = common::read_request_frames(&mut socket);
        let fault = json!({ "code": 11200, "sid": "tts-9", "message": "auth failed" });
        socket
            .send(Message::Text(fault.to_string()))
            .expect("send fault");
        thread::sleep(Duration::from_secs(2));
    });

    let client = SynthesizerClient::new(credentials(), config(&server.host));
    let (chunks, sink) = collecting_sink();

    let started = Instant::now();
    client
        .synthesize("测试", sink, Duration::from_secs(10))
        .unwrap();

    assert!(chunks.lock().unwrap().is_empty());
    assert!(started.elapsed() < Duration::from_secs(5), "fault short-circuits the wait");
}

#[test]
fn dropped_connection_returns_with_partial_chunks() {
    let server = common::spawn_server(|mut socket| {
        let _ = common::read_request_frames(&mut socket);
        socket
            .send(Message::Text(audio_reply(b"0123", 1)))
            .expect("send chunk");
        // Drop the connection without an end-of-stream marker.
    });

    let client = SynthesizerClient::new(credentials(), config(&server.host));
    let (chunks, sink) = collecting_sink();

    let started = Instant::now();
    client
        .synthesize("测试", sink, Duration::from_secs(10))
        .unwrap();

    assert_eq!(*chunks.lock().unwrap(), vec![b"0123".to_vec()]);
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "a closed connection ends the wait, not the timeout"
    );
}

#[test]
fn empty_text_is_passed_through() {
    let captured: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let capture = Arc::clone(&captured);

    let server = common::spawn_server(move |mut socket| {
        let frames = common::read_request_frames(&mut socket);
        *capture.lock().unwrap() = frames;
        socket
            .send(Message::Text(audio_reply(b"", 2)))
            .expect("send final");
        let _ = common::drain_until_close(&mut socket);
    });

    let client = SynthesizerClient::new(credentials(), config(&server.host));
    let (chunks, sink) = collecting_sink();

    client.synthesize("", sink, Duration::from_secs(5)).unwrap();

    let frames = captured.lock().unwrap();
    assert_eq!(frames[0]["data"]["text"], "");
    // The empty final chunk is still delivered, as upstream does.
    assert_eq!(*chunks.lock().unwrap(), vec![Vec::<u8>::new()]);
}
