//! Display abstraction for the appliance's little panel.
//!
//! The appliance UI is a handful of full-screen views plus a status banner.
//! [`Display`] is the seam a real panel driver would plug into; the shipped
//! implementation renders views as terminal text, which is what development
//! and headless test rigs use.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScreenError {
    #[error("display error: {0}")]
    Display(String),
}

/// Connectivity and battery state shown on every view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Banner {
    pub online: bool,
    pub battery_percent: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    /// Idle chat screen: hold Enter to talk.
    Chat,
    /// Top-level setup entry.
    Setup,
    /// Wi-Fi network picker.
    WifiList {
        networks: Vec<String>,
        selected: usize,
    },
    /// Wi-Fi password entry on the software keyboard.
    WifiPassword {
        entered: String,
        row: usize,
        col: usize,
    },
    /// Transient volume flash.
    Volume(u8),
}

pub trait Display: Send {
    fn show(&mut self, view: &View, banner: &Banner) -> Result<(), ScreenError>;
    fn clear(&mut self) -> Result<(), ScreenError>;
}

/// Terminal-text renderer standing in for the panel.
#[derive(Debug, Default)]
pub struct SimulatedDisplay;

impl SimulatedDisplay {
    pub fn new() -> Self {
        Self
    }

    fn banner_line(banner: &Banner) -> String {
        format!(
            "[wifi:{}] [bat:{}%]",
            if banner.online { "up" } else { "down" },
            banner.battery_percent
        )
    }
}

impl Display for SimulatedDisplay {
    fn show(&mut self, view: &View, banner: &Banner) -> Result<(), ScreenError> {
        let body = match view {
            View::Chat => "| 对话 | hold Enter to talk".to_string(),
            View::Setup => "| 设置 | Enter: Wi-Fi setup".to_string(),
            View::WifiList { networks, selected } => {
                let name = networks
                    .get(*selected)
                    .map(String::as_str)
                    .unwrap_or("<no networks>");
                format!("选择WIFI: > {} ({}/{})", name, selected + 1, networks.len().max(1))
            }
            View::WifiPassword { entered, row, col } => {
                // Show only the tail, like the panel does.
                let visible: String = entered
                    .chars()
                    .rev()
                    .take(8)
                    .collect::<Vec<_>>()
                    .into_iter()
                    .rev()
                    .collect();
                format!("WIFI密码: {} [kb {},{}]", visible, row, col)
            }
            View::Volume(level) => format!("volume: {}%", level),
        };
        println!("{}  {}", Self::banner_line(banner), body);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), ScreenError> {
        println!();
        Ok(())
    }
}
