use crate::error::{Error, Result};
use global_hotkey::hotkey::{Code, HotKey, Modifiers};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A physical key with optional modifiers, as used for hotkeys and injected presses.
///
/// Keys serialize as their canonical string form (`"ctrl+shift+q"`, `"num 7"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Key {
    pub modifiers: Option<Modifiers>,
    pub code: Code,
}

/// Canonical names, in display priority. The first name listed for a code is
/// the one `Display` produces.
const CODE_NAMES: &[(&str, Code)] = &[
    ("a", Code::KeyA),
    ("b", Code::KeyB),
    ("c", Code::KeyC),
    ("d", Code::KeyD),
    ("e", Code::KeyE),
    ("f", Code::KeyF),
    ("g", Code::KeyG),
    ("h", Code::KeyH),
    ("i", Code::KeyI),
    ("j", Code::KeyJ),
    ("k", Code::KeyK),
    ("l", Code::KeyL),
    ("m", Code::KeyM),
    ("n", Code::KeyN),
    ("o", Code::KeyO),
    ("p", Code::KeyP),
    ("q", Code::KeyQ),
    ("r", Code::KeyR),
    ("s", Code::KeyS),
    ("t", Code::KeyT),
    ("u", Code::KeyU),
    ("v", Code::KeyV),
    ("w", Code::KeyW),
    ("x", Code::KeyX),
    ("y", Code::KeyY),
    ("z", Code::KeyZ),
    ("0", Code::Digit0),
    ("1", Code::Digit1),
    ("2", Code::Digit2),
    ("3", Code::Digit3),
    ("4", Code::Digit4),
    ("5", Code::Digit5),
    ("6", Code::Digit6),
    ("7", Code::Digit7),
    ("8", Code::Digit8),
    ("9", Code::Digit9),
    ("num 0", Code::Numpad0),
    ("num 1", Code::Numpad1),
    ("num 2", Code::Numpad2),
    ("num 3", Code::Numpad3),
    ("num 4", Code::Numpad4),
    ("num 5", Code::Numpad5),
    ("num 6", Code::Numpad6),
    ("num 7", Code::Numpad7),
    ("num 8", Code::Numpad8),
    ("num 9", Code::Numpad9),
    ("num add", Code::NumpadAdd),
    ("num subtract", Code::NumpadSubtract),
    ("num multiply", Code::NumpadMultiply),
    ("num divide", Code::NumpadDivide),
    ("num decimal", Code::NumpadDecimal),
    ("num enter", Code::NumpadEnter),
    ("num lock", Code::NumLock),
    ("f1", Code::F1),
    ("f2", Code::F2),
    ("f3", Code::F3),
    ("f4", Code::F4),
    ("f5", Code::F5),
    ("f6", Code::F6),
    ("f7", Code::F7),
    ("f8", Code::F8),
    ("f9", Code::F9),
    ("f10", Code::F10),
    ("f11", Code::F11),
    ("f12", Code::F12),
    ("up", Code::ArrowUp),
    ("down", Code::ArrowDown),
    ("left", Code::ArrowLeft),
    ("right", Code::ArrowRight),
    ("ctrl", Code::ControlLeft),
    ("right ctrl", Code::ControlRight),
    ("shift", Code::ShiftLeft),
    ("right shift", Code::ShiftRight),
    ("alt", Code::AltLeft),
    ("right alt", Code::AltRight),
    ("escape", Code::Escape),
    ("space", Code::Space),
    ("enter", Code::Enter),
    ("tab", Code::Tab),
    ("caps lock", Code::CapsLock),
    ("backspace", Code::Backspace),
    ("delete", Code::Delete),
    ("insert", Code::Insert),
    ("home", Code::Home),
    ("end", Code::End),
    ("page up", Code::PageUp),
    ("page down", Code::PageDown),
    ("minus", Code::Minus),
    ("equal", Code::Equal),
    ("bracketleft", Code::BracketLeft),
    ("bracketright", Code::BracketRight),
    ("backslash", Code::Backslash),
    ("semicolon", Code::Semicolon),
    ("quote", Code::Quote),
    ("comma", Code::Comma),
    ("period", Code::Period),
    ("slash", Code::Slash),
    ("backquote", Code::Backquote),
];

/// Alternative spellings accepted by the parser.
const CODE_ALIASES: &[(&str, Code)] = &[
    ("arrowup", Code::ArrowUp),
    ("arrowdown", Code::ArrowDown),
    ("arrowleft", Code::ArrowLeft),
    ("arrowright", Code::ArrowRight),
    ("control", Code::ControlLeft),
    ("left ctrl", Code::ControlLeft),
    ("left shift", Code::ShiftLeft),
    ("left alt", Code::AltLeft),
    ("option", Code::AltLeft),
    ("esc", Code::Escape),
    ("return", Code::Enter),
    ("del", Code::Delete),
    ("ins", Code::Insert),
    ("pageup", Code::PageUp),
    ("pgup", Code::PageUp),
    ("pagedown", Code::PageDown),
    ("pgdn", Code::PageDown),
    ("capslock", Code::CapsLock),
    ("-", Code::Minus),
    ("=", Code::Equal),
    ("[", Code::BracketLeft),
    ("]", Code::BracketRight),
    ("\\", Code::Backslash),
    (";", Code::Semicolon),
    ("'", Code::Quote),
    (",", Code::Comma),
    (".", Code::Period),
    ("/", Code::Slash),
    ("`", Code::Backquote),
    ("grave", Code::Backquote),
];

impl Key {
    /// A key from its parts.
    pub fn new(code: Code, modifiers: Option<Modifiers>) -> Self {
        Key { code, modifiers }
    }

    /// Parse a hotkey or macro key name, case-insensitively.
    ///
    /// Accepted forms:
    /// - "a", "up", "f8" (just a key)
    /// - "num 7", "numpad7", "kp7" (numeric keypad)
    /// - "ctrl+shift+q" (with modifiers)
    /// - "ctrl" (a bare modifier key, as pressed by a macro)
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('+').map(|p| p.trim()).collect();

        // split always yields at least one element
        let (key_part, modifier_parts) = match parts.split_last() {
            Some(split) => split,
            None => return Err(Error::InvalidKey("Empty key string".to_string())),
        };

        let code = parse_code(key_part)?;

        let modifiers = if modifier_parts.is_empty() {
            None
        } else {
            let mut mods = Modifiers::empty();
            for part in modifier_parts {
                match part.to_lowercase().as_str() {
                    "ctrl" | "control" => mods |= Modifiers::CONTROL,
                    "alt" | "option" => mods |= Modifiers::ALT,
                    "shift" => mods |= Modifiers::SHIFT,
                    "cmd" | "command" | "super" | "win" | "windows" | "meta" => {
                        mods |= Modifiers::SUPER
                    }
                    _ => return Err(Error::InvalidKey(format!("Unknown modifier: {part}"))),
                }
            }
            Some(mods)
        };

        Ok(Key { code, modifiers })
    }

    /// The global-hotkey registration for this key.
    pub fn to_hotkey(&self) -> HotKey {
        HotKey::new(self.modifiers, self.code)
    }

    /// True when the key lives in the numeric keypad block.
    pub fn is_keypad(&self) -> bool {
        matches!(
            self.code,
            Code::Numpad0
                | Code::Numpad1
                | Code::Numpad2
                | Code::Numpad3
                | Code::Numpad4
                | Code::Numpad5
                | Code::Numpad6
                | Code::Numpad7
                | Code::Numpad8
                | Code::Numpad9
                | Code::NumpadAdd
                | Code::NumpadSubtract
                | Code::NumpadMultiply
                | Code::NumpadDivide
                | Code::NumpadDecimal
                | Code::NumpadEnter
                | Code::NumLock
        )
    }

    /// The canonical name of the bare code, without modifiers.
    pub fn code_name(&self) -> &'static str {
        format_code(&self.code)
    }
}

impl From<Key> for HotKey {
    fn from(key: Key) -> Self {
        key.to_hotkey()
    }
}

impl TryFrom<&str> for Key {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Key::parse(s)
    }
}

impl TryFrom<String> for Key {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Key::parse(&s)
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.to_string()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();

        if let Some(mods) = self.modifiers {
            if mods.contains(Modifiers::CONTROL) {
                parts.push("ctrl");
            }
            if mods.contains(Modifiers::ALT) {
                parts.push("alt");
            }
            if mods.contains(Modifiers::SHIFT) {
                parts.push("shift");
            }
            if mods.contains(Modifiers::SUPER) {
                parts.push("cmd");
            }
        }

        parts.push(format_code(&self.code));
        write!(f, "{}", parts.join("+"))
    }
}

impl FromStr for Key {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Key::parse(s)
    }
}

/// Lowercase, collapse whitespace and rewrite keypad prefixes to `num `.
fn canonical_name(s: &str) -> String {
    let lower = s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    for prefix in ["numpad", "num", "kp"] {
        if let Some(rest) = lower.strip_prefix(prefix) {
            let rest = rest.trim_start();
            if !rest.is_empty() {
                return format!("num {rest}");
            }
        }
    }
    lower
}

/// Look up a bare key name in the canonical and alias tables.
fn parse_code(s: &str) -> Result<Code> {
    let name = canonical_name(s);
    if name.is_empty() {
        return Err(Error::InvalidKey("Empty key string".to_string()));
    }
    CODE_NAMES
        .iter()
        .chain(CODE_ALIASES)
        .find(|(n, _)| *n == name)
        .map(|(_, code)| *code)
        .ok_or_else(|| Error::InvalidKey(format!("Unknown key code: {s}")))
}

/// The canonical name of a code.
fn format_code(code: &Code) -> &'static str {
    CODE_NAMES
        .iter()
        .find(|(_, c)| c == code)
        .map(|(n, _)| *n)
        .unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_keys() {
        let key = Key::parse("a").unwrap();
        assert_eq!(key.code, Code::KeyA);
        assert_eq!(key.modifiers, None);

        let key = Key::parse("F8").unwrap();
        assert_eq!(key.code, Code::F8);

        let key = Key::parse("up").unwrap();
        assert_eq!(key.code, Code::ArrowUp);
        assert!(!key.is_keypad());
    }

    #[test]
    fn test_parse_keypad_spellings() {
        for s in ["num 7", "NUM 7", "Num  7", "numpad7", "numpad 7", "num7", "kp7"] {
            let key = Key::parse(s).unwrap();
            assert_eq!(key.code, Code::Numpad7, "{s}");
            assert!(key.is_keypad());
            assert_eq!(key.to_string(), "num 7");
        }
        assert_eq!(Key::parse("num lock").unwrap().code, Code::NumLock);
        assert_eq!(Key::parse("numlock").unwrap().code, Code::NumLock);
    }

    #[test]
    fn test_parse_with_modifiers() {
        let key = Key::parse("ctrl+shift+q").unwrap();
        assert_eq!(key.code, Code::KeyQ);
        assert_eq!(key.modifiers, Some(Modifiers::CONTROL | Modifiers::SHIFT));
        assert_eq!(key.to_string(), "ctrl+shift+q");

        let key = Key::parse("alt+num 5").unwrap();
        assert_eq!(key.code, Code::Numpad5);
        assert_eq!(key.modifiers, Some(Modifiers::ALT));
    }

    #[test]
    fn test_bare_modifier_keys() {
        assert_eq!(Key::parse("ctrl").unwrap().code, Code::ControlLeft);
        assert_eq!(Key::parse("Control").unwrap().code, Code::ControlLeft);
        assert_eq!(Key::parse("shift").unwrap().code, Code::ShiftLeft);
        assert_eq!(Key::parse("ctrl").unwrap().to_string(), "ctrl");
    }

    #[test]
    fn test_aliases_display_canonical() {
        assert_eq!(Key::parse("arrowleft").unwrap().to_string(), "left");
        assert_eq!(Key::parse("esc").unwrap().to_string(), "escape");
        assert_eq!(Key::parse("pgdn").unwrap().to_string(), "page down");
    }

    #[test]
    fn test_to_hotkey() {
        let key = Key::parse("ctrl+a").unwrap();
        let hotkey = key.to_hotkey();
        assert_eq!(hotkey.mods, Modifiers::CONTROL);
        assert_eq!(hotkey.key, Code::KeyA);
    }

    #[test]
    fn test_serialization() {
        let key = Key::parse("num 9").unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"num 9\"");
        let deserialized: Key = serde_json::from_str(&json).unwrap();
        assert_eq!(key, deserialized);
        assert!(serde_json::from_str::<Key>("\"nope\"").is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(Key::parse("").is_err());
        assert!(Key::parse("ctrl+").is_err());
        assert!(Key::parse("unknown+a").is_err());
        assert!(Key::parse("ctrl+unknown").is_err());
        assert!(Key::parse("num").is_err());
    }
}
