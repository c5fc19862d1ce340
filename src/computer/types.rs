//! Typed actions and observations for desktop-style backends.
//!
//! [`ComputerAction`] is a tagged union: each variant carries only the fields
//! its backend primitive needs. [`ComputerObservation`] bundles the optional
//! observation slots a backend can fill; which slots are captured is chosen by
//! a list of [`ObservationKind`]s.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Keys and buttons
// ---------------------------------------------------------------------------

/// A keyboard key.
///
/// Serialised as its lowercase name (`"enter"`, `"f5"`, `"a"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum KeyboardKey {
    Enter,
    Tab,
    Space,
    Backspace,
    Delete,
    Escape,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    Shift,
    Ctrl,
    Alt,
    /// The "super" key (Windows / Command).
    Meta,
    CapsLock,
    /// Function key `F<n>`, named `f<n>`.
    F(u8),
    /// A printable character key.
    Char(char),
}

impl KeyboardKey {
    /// The key name understood by pyautogui.
    pub fn to_pyautogui(&self) -> String {
        let name = match self {
            Self::Enter => "enter",
            Self::Tab => "tab",
            Self::Space => "space",
            Self::Backspace => "backspace",
            Self::Delete => "delete",
            Self::Escape => "esc",
            Self::Home => "home",
            Self::End => "end",
            Self::PageUp => "pageup",
            Self::PageDown => "pagedown",
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
            Self::Shift => "shift",
            Self::Ctrl => "ctrl",
            Self::Alt => "alt",
            Self::Meta => "win",
            Self::CapsLock => "capslock",
            Self::F(n) => return format!("f{n}"),
            Self::Char(c) => return c.to_lowercase().to_string(),
        };
        name.to_string()
    }
}

impl fmt::Display for KeyboardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Escape => f.write_str("escape"),
            Self::Meta => f.write_str("meta"),
            Self::Char(c) => write!(f, "{c}"),
            other => f.write_str(&other.to_pyautogui()),
        }
    }
}

impl FromStr for KeyboardKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Ok(Self::Char(c));
        }
        let key = match s.to_lowercase().as_str() {
            "enter" | "return" => Self::Enter,
            "tab" => Self::Tab,
            "space" => Self::Space,
            "backspace" => Self::Backspace,
            "delete" | "del" => Self::Delete,
            "escape" | "esc" => Self::Escape,
            "home" => Self::Home,
            "end" => Self::End,
            "pageup" | "page_up" => Self::PageUp,
            "pagedown" | "page_down" => Self::PageDown,
            "up" => Self::Up,
            "down" => Self::Down,
            "left" => Self::Left,
            "right" => Self::Right,
            "shift" => Self::Shift,
            "ctrl" | "control" => Self::Ctrl,
            "alt" => Self::Alt,
            "meta" | "win" | "super" | "cmd" => Self::Meta,
            "capslock" | "caps_lock" => Self::CapsLock,
            other => match other.strip_prefix('f').map(str::parse::<u8>) {
                Some(Ok(n)) => Self::F(n),
                _ => return Err(format!("unknown keyboard key: {s}")),
            },
        };
        Ok(key)
    }
}

impl TryFrom<String> for KeyboardKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeyboardKey> for String {
    fn from(key: KeyboardKey) -> Self {
        key.to_string()
    }
}

/// A mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    pub fn to_pyautogui(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Middle => "middle",
        }
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Everything a desktop-style backend can be asked to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComputerAction {
    /// Run a shell command. Falls back to the environment's default timeout
    /// when `timeout_secs` is absent.
    Command {
        command: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_secs: Option<u64>,
    },
    KeyDown {
        key: KeyboardKey,
    },
    KeyUp {
        key: KeyboardKey,
    },
    /// Type a string of text.
    Type {
        text: String,
    },
    MouseMove {
        x: i32,
        y: i32,
    },
    /// Scroll by `amount` clicks; positive scrolls up.
    MouseScroll {
        amount: i32,
    },
    MouseButtonDown {
        button: MouseButton,
    },
    MouseButtonUp {
        button: MouseButton,
    },
}

impl ComputerAction {
    /// The action-kind discriminant, as serialised.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Command { .. } => "command",
            Self::KeyDown { .. } => "key_down",
            Self::KeyUp { .. } => "key_up",
            Self::Type { .. } => "type",
            Self::MouseMove { .. } => "mouse_move",
            Self::MouseScroll { .. } => "mouse_scroll",
            Self::MouseButtonDown { .. } => "mouse_button_down",
            Self::MouseButtonUp { .. } => "mouse_button_up",
        }
    }
}

// ---------------------------------------------------------------------------
// Observations
// ---------------------------------------------------------------------------

/// The observation slots a computer backend may be asked to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationKind {
    Screenshot,
    MouseState,
    KeyboardState,
    Terminal,
}

impl ObservationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Screenshot => "screenshot",
            Self::MouseState => "mouse_state",
            Self::KeyboardState => "keyboard_state",
            Self::Terminal => "terminal",
        }
    }
}

/// A base64-encoded screen capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screenshot {
    /// Image format of the decoded bytes (e.g. `"png"`).
    pub format: String,
    pub base64: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MouseState {
    pub x: i32,
    pub y: i32,
    pub pressed: Vec<MouseButton>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyboardState {
    pub pressed: Vec<KeyboardKey>,
}

/// Output of the most recent command run by a backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TerminalOutput {
    /// Empty until the first command has run.
    pub command: String,
    /// `None` when the process was killed or timed out.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

/// What a computer environment returns from `reset` and `step`.
///
/// Only the slots listed in the environment's observation kinds are filled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComputerObservation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<Screenshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mouse_state: Option<MouseState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyboard_state: Option<KeyboardState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal: Option<TerminalOutput>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_uses_kind_tag() {
        let action = ComputerAction::MouseMove { x: 10, y: 20 };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "mouse_move", "x": 10, "y": 20}));
        assert_eq!(action.kind(), "mouse_move");
    }

    #[test]
    fn command_timeout_is_optional() {
        let action: ComputerAction =
            serde_json::from_str(r#"{"kind": "command", "command": "ls"}"#).unwrap();
        assert_eq!(
            action,
            ComputerAction::Command {
                command: "ls".into(),
                timeout_secs: None
            }
        );
    }

    #[test]
    fn keys_parse_from_names_and_chars() {
        assert_eq!("Enter".parse::<KeyboardKey>().unwrap(), KeyboardKey::Enter);
        assert_eq!("esc".parse::<KeyboardKey>().unwrap(), KeyboardKey::Escape);
        assert_eq!("f11".parse::<KeyboardKey>().unwrap(), KeyboardKey::F(11));
        assert_eq!("q".parse::<KeyboardKey>().unwrap(), KeyboardKey::Char('q'));
        assert_eq!("F13".parse::<KeyboardKey>().unwrap(), KeyboardKey::F(13));
        assert!("f256".parse::<KeyboardKey>().is_err());
        assert!("hyper".parse::<KeyboardKey>().is_err());
    }

    #[test]
    fn keys_map_to_pyautogui_names() {
        assert_eq!(KeyboardKey::Meta.to_pyautogui(), "win");
        assert_eq!(KeyboardKey::Escape.to_pyautogui(), "esc");
        assert_eq!(KeyboardKey::Char('A').to_pyautogui(), "a");
        assert_eq!(MouseButton::Middle.to_pyautogui(), "middle");
    }

    #[test]
    fn key_action_deserializes_key_name() {
        let action: ComputerAction =
            serde_json::from_str(r#"{"kind": "key_down", "key": "ctrl"}"#).unwrap();
        assert_eq!(action, ComputerAction::KeyDown { key: KeyboardKey::Ctrl });
        let json = serde_json::to_string(&ComputerAction::KeyUp { key: KeyboardKey::F(5) }).unwrap();
        assert_eq!(json, r#"{"kind":"key_up","key":"f5"}"#);
    }

    #[test]
    fn every_function_key_survives_serde() {
        for n in [0, 1, 12, 13, 24, u8::MAX] {
            let key = KeyboardKey::F(n);
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(serde_json::from_str::<KeyboardKey>(&json).unwrap(), key);
        }
    }

    #[test]
    fn empty_observation_serializes_to_empty_object() {
        let json = serde_json::to_string(&ComputerObservation::default()).unwrap();
        assert_eq!(json, "{}");
    }
}
