//! Menu state machine for the five-key UI.
//!
//! Pure state: key events in, [`UiAction`]s out. The app interprets actions
//! against real services (recorder, volume, nmcli), which keeps every screen
//! flow testable without hardware.

use crate::keys::{Key, KeyEvent};
use crate::screen::View;

/// Software keyboard for password entry, navigated with the arrow keys.
/// `\u{8}` erases, `\r` commits.
pub const SW_KEYBOARD: [[char; 12]; 8] = [
    ['A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L'],
    ['M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X'],
    ['Y', 'Z', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9'],
    ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l'],
    ['m', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x'],
    ['y', 'z', '!', '@', '#', '$', '%', '^', '&', '*', '(', ')'],
    ['_', '-', '+', '=', '{', '}', '[', ']', '|', '\\', '~', '\u{8}'],
    [':', ';', '"', '\'', '<', ',', '>', '.', '?', '/', ' ', '\r'],
];

const ROWS: usize = SW_KEYBOARD.len();
const COLS: usize = SW_KEYBOARD[0].len();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiState {
    Chat,
    Setup,
    SetupWifiList,
    SetupWifiPassword,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    Show(View),
    StartRecording,
    StopRecording,
    VolumeUp,
    VolumeDown,
    /// Scan networks and feed them back through [`Ui::set_wifi_networks`].
    ScanWifi,
    ConnectWifi {
        ssid: String,
        password: String,
    },
}

#[derive(Debug)]
pub struct Ui {
    state: UiState,
    networks: Vec<String>,
    selected: usize,
    chosen_ssid: String,
    password: String,
    row: usize,
    col: usize,
}

impl Default for Ui {
    fn default() -> Self {
        Self::new()
    }
}

impl Ui {
    pub fn new() -> Self {
        Self {
            state: UiState::Chat,
            networks: Vec::new(),
            selected: 0,
            chosen_ssid: String::new(),
            password: String::new(),
            row: 0,
            col: 0,
        }
    }

    pub fn state(&self) -> UiState {
        self.state
    }

    /// Install fresh scan results and return the list view to show.
    pub fn set_wifi_networks(&mut self, networks: Vec<String>) -> View {
        self.networks = networks;
        self.selected = 0;
        self.wifi_list_view()
    }

    /// Advance on a key event; `None` is the idle tick, which returns the UI
    /// to the chat screen.
    pub fn handle(&mut self, event: Option<KeyEvent>) -> Vec<UiAction> {
        let event = match event {
            Some(event) => event,
            None => {
                self.state = UiState::Chat;
                return vec![UiAction::Show(View::Chat)];
            }
        };
        log::debug!("ui state {:?}, event {:?}", self.state, event);

        match (self.state, event) {
            (UiState::Chat, KeyEvent::Pressed(Key::Enter)) => vec![UiAction::StartRecording],
            (UiState::Chat, KeyEvent::Released(Key::Enter)) => vec![UiAction::StopRecording],
            (UiState::Chat, KeyEvent::Pressed(Key::Up)) => vec![UiAction::VolumeUp],
            (UiState::Chat, KeyEvent::Pressed(Key::Down)) => vec![UiAction::VolumeDown],
            (UiState::Chat, KeyEvent::Pressed(Key::Left | Key::Right)) => {
                self.state = UiState::Setup;
                vec![UiAction::Show(View::Setup)]
            }

            (UiState::Setup, KeyEvent::Pressed(Key::Left | Key::Right)) => {
                self.state = UiState::Chat;
                vec![UiAction::Show(View::Chat)]
            }
            (UiState::Setup, KeyEvent::Pressed(Key::Enter)) => {
                self.state = UiState::SetupWifiList;
                vec![UiAction::ScanWifi]
            }

            (UiState::SetupWifiList, KeyEvent::Pressed(Key::Up)) => {
                if !self.networks.is_empty() {
                    self.selected = (self.selected + self.networks.len() - 1) % self.networks.len();
                }
                vec![UiAction::Show(self.wifi_list_view())]
            }
            (UiState::SetupWifiList, KeyEvent::Pressed(Key::Down)) => {
                if !self.networks.is_empty() {
                    self.selected = (self.selected + 1) % self.networks.len();
                }
                vec![UiAction::Show(self.wifi_list_view())]
            }
            (UiState::SetupWifiList, KeyEvent::Pressed(Key::Enter)) => {
                let Some(ssid) = self.networks.get(self.selected) else {
                    return Vec::new();
                };
                self.chosen_ssid = ssid.clone();
                self.password.clear();
                self.row = 0;
                self.col = 0;
                self.state = UiState::SetupWifiPassword;
                vec![UiAction::Show(self.password_view())]
            }

            (UiState::SetupWifiPassword, KeyEvent::Pressed(Key::Up)) => {
                self.row = (self.row + ROWS - 1) % ROWS;
                vec![UiAction::Show(self.password_view())]
            }
            (UiState::SetupWifiPassword, KeyEvent::Pressed(Key::Down)) => {
                self.row = (self.row + 1) % ROWS;
                vec![UiAction::Show(self.password_view())]
            }
            (UiState::SetupWifiPassword, KeyEvent::Pressed(Key::Left)) => {
                self.col = (self.col + COLS - 1) % COLS;
                vec![UiAction::Show(self.password_view())]
            }
            (UiState::SetupWifiPassword, KeyEvent::Pressed(Key::Right)) => {
                self.col = (self.col + 1) % COLS;
                vec![UiAction::Show(self.password_view())]
            }
            (UiState::SetupWifiPassword, KeyEvent::Pressed(Key::Enter)) => {
                match SW_KEYBOARD[self.row][self.col] {
                    '\r' => {
                        self.state = UiState::Setup;
                        let actions = vec![
                            UiAction::ConnectWifi {
                                ssid: self.chosen_ssid.clone(),
                                password: self.password.clone(),
                            },
                            UiAction::Show(View::Setup),
                        ];
                        self.password.clear();
                        actions
                    }
                    '\u{8}' => {
                        self.password.pop();
                        vec![UiAction::Show(self.password_view())]
                    }
                    ch => {
                        self.password.push(ch);
                        vec![UiAction::Show(self.password_view())]
                    }
                }
            }

            _ => Vec::new(),
        }
    }

    fn wifi_list_view(&self) -> View {
        View::WifiList {
            networks: self.networks.clone(),
            selected: self.selected,
        }
    }

    fn password_view(&self) -> View {
        View::WifiPassword {
            entered: self.password.clone(),
            row: self.row,
            col: self.col,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(ui: &mut Ui, key: Key) -> Vec<UiAction> {
        ui.handle(Some(KeyEvent::Pressed(key)))
    }

    #[test]
    fn chat_screen_drives_recording_and_volume() {
        let mut ui = Ui::new();

        assert_eq!(press(&mut ui, Key::Enter), vec![UiAction::StartRecording]);
        assert_eq!(
            ui.handle(Some(KeyEvent::Released(Key::Enter))),
            vec![UiAction::StopRecording]
        );
        assert_eq!(press(&mut ui, Key::Up), vec![UiAction::VolumeUp]);
        assert_eq!(press(&mut ui, Key::Down), vec![UiAction::VolumeDown]);
        assert_eq!(ui.state(), UiState::Chat);
    }

    #[test]
    fn idle_tick_returns_to_chat() {
        let mut ui = Ui::new();
        press(&mut ui, Key::Left);
        assert_eq!(ui.state(), UiState::Setup);

        assert_eq!(ui.handle(None), vec![UiAction::Show(View::Chat)]);
        assert_eq!(ui.state(), UiState::Chat);
    }

    #[test]
    fn setup_round_trip_and_scan() {
        let mut ui = Ui::new();

        assert_eq!(
            press(&mut ui, Key::Right),
            vec![UiAction::Show(View::Setup)]
        );
        assert_eq!(press(&mut ui, Key::Left), vec![UiAction::Show(View::Chat)]);

        press(&mut ui, Key::Right);
        assert_eq!(press(&mut ui, Key::Enter), vec![UiAction::ScanWifi]);
        assert_eq!(ui.state(), UiState::SetupWifiList);
    }

    #[test]
    fn wifi_list_wraps_and_selects() {
        let mut ui = Ui::new();
        press(&mut ui, Key::Left);
        press(&mut ui, Key::Enter);
        ui.set_wifi_networks(vec!["home".into(), "office".into(), "cafe".into()]);

        press(&mut ui, Key::Up); // wraps to the end
        match &press(&mut ui, Key::Down)[0] {
            UiAction::Show(View::WifiList { selected, .. }) => assert_eq!(*selected, 0),
            other => panic!("unexpected action {:?}", other),
        }

        press(&mut ui, Key::Down);
        let actions = press(&mut ui, Key::Enter);
        assert_eq!(ui.state(), UiState::SetupWifiPassword);
        match &actions[0] {
            UiAction::Show(View::WifiPassword { entered, row, col }) => {
                assert!(entered.is_empty());
                assert_eq!((*row, *col), (0, 0));
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn empty_wifi_list_ignores_enter() {
        let mut ui = Ui::new();
        press(&mut ui, Key::Left);
        press(&mut ui, Key::Enter);
        ui.set_wifi_networks(Vec::new());

        assert!(press(&mut ui, Key::Enter).is_empty());
        assert_eq!(ui.state(), UiState::SetupWifiList);
    }

    #[test]
    fn password_entry_types_erases_and_commits() {
        let mut ui = Ui::new();
        press(&mut ui, Key::Left);
        press(&mut ui, Key::Enter);
        ui.set_wifi_networks(vec!["home".into()]);
        press(&mut ui, Key::Enter);

        // Type 'A' (0,0), then 'B' (0,1).
        press(&mut ui, Key::Enter);
        press(&mut ui, Key::Right);
        press(&mut ui, Key::Enter);

        // Navigate to backspace at (6,11): up twice wraps to row 6, then left
        // twice wraps from column 1 to the last column.
        press(&mut ui, Key::Up);
        press(&mut ui, Key::Up);
        press(&mut ui, Key::Left);
        press(&mut ui, Key::Left);
        match &press(&mut ui, Key::Enter)[0] {
            UiAction::Show(View::WifiPassword { entered, .. }) => assert_eq!(entered, "A"),
            other => panic!("unexpected action {:?}", other),
        }

        // Down to row 7, commit key is at (7,11).
        press(&mut ui, Key::Down);
        let actions = press(&mut ui, Key::Enter);
        assert_eq!(
            actions[0],
            UiAction::ConnectWifi {
                ssid: "home".to_string(),
                password: "A".to_string(),
            }
        );
        assert_eq!(actions[1], UiAction::Show(View::Setup));
        assert_eq!(ui.state(), UiState::Setup);
    }

    #[test]
    fn keyboard_cursor_wraps_in_both_axes() {
        let mut ui = Ui::new();
        press(&mut ui, Key::Left);
        press(&mut ui, Key::Enter);
        ui.set_wifi_networks(vec!["home".into()]);
        press(&mut ui, Key::Enter);

        match &press(&mut ui, Key::Up)[0] {
            UiAction::Show(View::WifiPassword { row, .. }) => assert_eq!(*row, ROWS - 1),
            other => panic!("unexpected action {:?}", other),
        }
        match &press(&mut ui, Key::Left)[0] {
            UiAction::Show(View::WifiPassword { col, .. }) => assert_eq!(*col, COLS - 1),
            other => panic!("unexpected action {:?}", other),
        }
        match &press(&mut ui, Key::Right)[0] {
            UiAction::Show(View::WifiPassword { col, .. }) => assert_eq!(*col, 0),
            other => panic!("unexpected action {:?}", other),
        }
    }
}
