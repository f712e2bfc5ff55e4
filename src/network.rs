//! Connectivity probe and Wi-Fi management via system tools.

use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use thiserror::Error;

/// Well-connected public resolver used as the reachability probe target.
const PROBE_TARGET: &str = "114.114.114.114";

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("failed to run {command}: {reason}")]
    Command { command: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiNetwork {
    pub ssid: String,
}

/// One reachability probe.
pub fn is_online() -> bool {
    Command::new("ping")
        .args(["-c", "1", "-W", "2", PROBE_TARGET])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Background daemon refreshing a shared online flag every `period`.
pub fn spawn_connectivity_daemon(period: Duration) -> Arc<AtomicBool> {
    let online = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&online);
    thread::Builder::new()
        .name("net-probe".to_string())
        .spawn(move || loop {
            flag.store(is_online(), Ordering::Relaxed);
            thread::sleep(period);
        })
        .expect("spawn connectivity daemon");
    online
}

/// List visible Wi-Fi networks through nmcli.
pub fn scan_wifi() -> Result<Vec<WifiNetwork>, NetworkError> {
    let output = Command::new("nmcli")
        .args(["-t", "-f", "SSID", "device", "wifi", "list"])
        .output()
        .map_err(|e| NetworkError::Command {
            command: "nmcli",
            reason: e.to_string(),
        })?;
    if !output.status.success() {
        return Err(NetworkError::Command {
            command: "nmcli",
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(parse_scan_output(&String::from_utf8_lossy(&output.stdout)))
}

/// Connect in the background; success or failure shows up on the banner via
/// the connectivity daemon.
pub fn connect_wifi(ssid: String, password: String) {
    thread::Builder::new()
        .name("wifi-connect".to_string())
        .spawn(move || {
            log::info!("connecting to wifi '{}'", ssid);
            let status = Command::new("nmcli")
                .args(["device", "wifi", "connect", &ssid, "password", &password])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
            match status {
                Ok(status) if status.success() => log::info!("wifi '{}' connected", ssid),
                Ok(status) => log::error!("wifi connect to '{}' failed: {}", ssid, status),
                Err(e) => log::error!("failed to run nmcli: {}", e),
            }
        })
        .expect("spawn wifi connect thread");
}

fn parse_scan_output(stdout: &str) -> Vec<WifiNetwork> {
    let mut networks = Vec::new();
    for line in stdout.lines() {
        let ssid = line.trim();
        if ssid.is_empty() {
            continue;
        }
        if networks
            .iter()
            .any(|network: &WifiNetwork| network.ssid == ssid)
        {
            continue;
        }
        networks.push(WifiNetwork {
            ssid: ssid.to_string(),
        });
    }
    networks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_output_drops_blank_and_duplicate_ssids() {
        let networks = parse_scan_output("home\n\noffice\nhome\n  \ncafe\n");
        let names: Vec<&str> = networks.iter().map(|n| n.ssid.as_str()).collect();
        assert_eq!(names, ["home", "office", "cafe"]);
    }

    #[test]
    fn empty_scan_output_is_empty_list() {
        assert!(parse_scan_output("").is_empty());
    }
}
