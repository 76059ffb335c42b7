//! The boundary between the engine and the OS keyboard layer.
//!
//! Everything the engine needs from the platform goes through [`KeyboardHook`]:
//! subscribing to key-down/key-up events for a hotkey, simulating presses, and
//! blocking until the user presses a key. [`crate::GlobalHook`] is the real
//! implementation; [`crate::test_support::FakeHook`] drives the engine in tests.

use crate::Result;
use std::fmt;
use std::sync::Arc;

/// Whether a key went down or came up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyEventKind {
    Down,
    Up,
}

/// A raw key event as delivered by the hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    /// Physical scan code of the key.
    pub scan_code: u32,
    /// Symbolic key name, e.g. `"up"` or `"num 7"`.
    pub name: String,
    pub kind: KeyEventKind,
    /// `Some(true)` if the driver says the key is on the numeric keypad,
    /// `Some(false)` if it says it is not, `None` if it cannot tell.
    pub is_keypad: Option<bool>,
}

impl KeyEvent {
    /// A key-down event.
    pub fn down(scan_code: u32, name: impl Into<String>, is_keypad: Option<bool>) -> Self {
        Self {
            scan_code,
            name: name.into(),
            kind: KeyEventKind::Down,
            is_keypad,
        }
    }

    /// A key-up event.
    pub fn up(scan_code: u32, name: impl Into<String>, is_keypad: Option<bool>) -> Self {
        Self {
            scan_code,
            name: name.into(),
            kind: KeyEventKind::Up,
            is_keypad,
        }
    }
}

/// Callback invoked from the hook's own thread for each matching event.
pub type KeyCallback = Arc<dyn Fn(&KeyEvent) + Send + Sync>;

/// Token issued by a hook for one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookId(pub u64);

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hook#{}", self.0)
    }
}

/// A global keyboard hook.
///
/// Callbacks are invoked synchronously on the hook's event thread, so they must
/// return quickly.
pub trait KeyboardHook: Send + Sync {
    /// Subscribe to key-down events for `hotkey`.
    fn on_key_down(&self, hotkey: &str, callback: KeyCallback) -> Result<HookId>;

    /// Subscribe to key-up events for `hotkey`.
    fn on_key_up(&self, hotkey: &str, callback: KeyCallback) -> Result<HookId>;

    /// Remove a subscription.
    fn unhook(&self, id: HookId) -> Result<()>;

    /// Simulate pressing `key` down.
    fn press(&self, key: &str) -> Result<()>;

    /// Simulate releasing `key`.
    fn release(&self, key: &str) -> Result<()>;

    /// Block until the user presses a key and return its hotkey string.
    fn read_key(&self) -> Result<String>;
}
