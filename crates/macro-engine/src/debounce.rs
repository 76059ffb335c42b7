use crate::hook::{KeyEvent, KeyEventKind};
use parking_lot::Mutex;
use std::collections::HashSet;

/// Hotkeys starting with this marker only fire from the numeric keypad.
pub const NUMPAD_PREFIX: &str = "num ";

/// Key names that laptop Fn layers overlay onto the keypad digits.
const ARROW_NAMES: [&str; 4] = ["up", "down", "left", "right"];

/// Tracks which scan codes are held so OS key-repeat does not re-trigger.
#[derive(Debug, Default)]
pub struct Debouncer {
    held: Mutex<HashSet<u32>>,
}

impl Debouncer {
    /// A debouncer with nothing held.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key-down for `hotkey`; returns true only for a new press.
    pub fn on_down(&self, hotkey: &str, event: &KeyEvent) -> bool {
        if event.kind != KeyEventKind::Down {
            return false;
        }
        if !keypad_origin_ok(hotkey, event) {
            return false;
        }
        self.held.lock().insert(event.scan_code)
    }

    /// Record a key-up. Never dispatches.
    pub fn on_up(&self, event: &KeyEvent) {
        self.held.lock().remove(&event.scan_code);
    }

    /// Whether `scan_code` is currently down.
    pub fn is_held(&self, scan_code: u32) -> bool {
        self.held.lock().contains(&scan_code)
    }

    /// Forget every held key.
    pub fn clear(&self) {
        self.held.lock().clear();
    }
}

/// Numpad hotkeys must not fire from keys that are not, or may not be, on the keypad.
fn keypad_origin_ok(hotkey: &str, event: &KeyEvent) -> bool {
    if !hotkey.to_lowercase().starts_with(NUMPAD_PREFIX) {
        return true;
    }
    match event.is_keypad {
        Some(keypad) => keypad,
        None => !ARROW_NAMES.contains(&event.name.to_lowercase().as_str()),
    }
}
