//! Five-key input events.
//!
//! The hardware has five buttons wired to GPIO; development rigs type key
//! names on stdin instead. Either way the app sees the same
//! pressed/released event stream on a channel.

use std::io::BufRead;
use std::str::FromStr;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Key {
    Enter,
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Pressed(Key),
    Released(Key),
}

/// Spawn the stdin key source: each line naming a key emits a press and a
/// release (a line-based terminal has no distinct release instant). Unknown
/// lines are ignored with a hint.
pub fn spawn_stdin_source() -> Receiver<KeyEvent> {
    let (tx, rx) = unbounded();
    thread::Builder::new()
        .name("key-source".to_string())
        .spawn(move || read_stdin_keys(tx))
        .expect("spawn key source thread");
    rx
}

fn read_stdin_keys(tx: Sender<KeyEvent>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::error!("stdin read failed: {}", e);
                break;
            }
        };
        match Key::from_str(line.trim().to_lowercase().as_str()) {
            Ok(key) => {
                if tx.send(KeyEvent::Pressed(key)).is_err()
                    || tx.send(KeyEvent::Released(key)).is_err()
                {
                    break;
                }
            }
            Err(_) if line.trim().is_empty() => {}
            Err(_) => {
                log::info!("unknown key '{}' (use enter/up/down/left/right)", line.trim());
            }
        }
    }
    log::info!("key source closed");
}
