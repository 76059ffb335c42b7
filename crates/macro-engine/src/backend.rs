//! The real keyboard hook.
//!
//! - hotkey subscriptions go through `global-hotkey`; each distinct key is
//!   registered with the OS once and shared by its down and up subscribers
//! - simulated presses go through `enigo`
//! - interactive capture listens to the whole keystream with `rdev`
//!
//! On macOS the hook must be created, and its hotkeys registered, on the main
//! thread while an event loop runs there.

use crate::error::{Error, Result};
use crate::hook::{HookId, KeyCallback, KeyEvent, KeyEventKind, KeyboardHook};
use crate::key::Key;
use enigo::{Direction, Enigo, Keyboard, Settings};
use global_hotkey::hotkey::{Code, HotKey, Modifiers};
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Once};
use std::thread;
use tracing::{debug, error, trace, warn};

/// One OS registration and everyone listening on it.
struct Binding {
    hotkey: HotKey,
    key: Key,
    down: HashMap<HookId, KeyCallback>,
    up: HashMap<HookId, KeyCallback>,
}

impl Binding {
    fn callbacks(&mut self, kind: KeyEventKind) -> &mut HashMap<HookId, KeyCallback> {
        match kind {
            KeyEventKind::Down => &mut self.down,
            KeyEventKind::Up => &mut self.up,
        }
    }

    fn is_empty(&self) -> bool {
        self.down.is_empty() && self.up.is_empty()
    }
}

#[derive(Default)]
struct Bindings {
    /// OS hotkey id → binding
    by_hotkey: HashMap<u32, Binding>,
    /// subscription → OS hotkey id
    hooks: HashMap<HookId, u32>,
}

type CaptureSlot = Arc<Mutex<Option<Sender<String>>>>;

/// [`KeyboardHook`] backed by the operating system.
pub struct GlobalHook {
    manager: GlobalHotKeyManager,
    bindings: Arc<Mutex<Bindings>>,
    next_id: AtomicU64,
    injector: Mutex<Option<Enigo>>,
    capture: CaptureSlot,
    capture_started: Once,
    capture_alive: Arc<AtomicBool>,
}

impl GlobalHook {
    /// Create the hook and spawn the thread that delivers hotkey events.
    pub fn new() -> Result<Self> {
        let manager = GlobalHotKeyManager::new()?;
        let bindings = Arc::new(Mutex::new(Bindings::default()));

        let events = bindings.clone();
        thread::Builder::new()
            .name("hotkey-events".into())
            .spawn(move || {
                let receiver = GlobalHotKeyEvent::receiver();
                while let Ok(event) = receiver.recv() {
                    deliver(&events, event);
                }
                debug!("hotkey event channel closed");
            })?;

        Ok(Self {
            manager,
            bindings,
            next_id: AtomicU64::new(0),
            injector: Mutex::new(None),
            capture: Arc::new(Mutex::new(None)),
            capture_started: Once::new(),
            capture_alive: Arc::new(AtomicBool::new(false)),
        })
    }

    fn subscribe(&self, hotkey: &str, kind: KeyEventKind, callback: KeyCallback) -> Result<HookId> {
        let key = Key::parse(hotkey)?;
        let hotkey = key.to_hotkey();
        let os_id = hotkey.id();
        let id = HookId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);

        let mut bindings = self.bindings.lock();
        if !bindings.by_hotkey.contains_key(&os_id) {
            self.manager.register(hotkey)?;
            trace!(%key, os_id, "registered with OS");
            bindings.by_hotkey.insert(
                os_id,
                Binding {
                    hotkey,
                    key,
                    down: HashMap::new(),
                    up: HashMap::new(),
                },
            );
        }
        if let Some(binding) = bindings.by_hotkey.get_mut(&os_id) {
            binding.callbacks(kind).insert(id, callback);
        }
        bindings.hooks.insert(id, os_id);
        Ok(id)
    }

    fn inject(&self, key: &str, direction: Direction) -> Result<()> {
        let key = Key::parse(key)?;
        let code = enigo_key(key.code)
            .ok_or_else(|| Error::InvalidKey(format!("Cannot simulate key: {key}")))?;
        let mods = modifier_keys(key.modifiers);

        let mut injector = self.injector.lock();
        if injector.is_none() {
            debug!("opening input connection");
            *injector = Some(Enigo::new(&Settings::default())?);
        }
        let Some(enigo) = injector.as_mut() else {
            return Err(Error::Inject("input connection unavailable".into()));
        };
        match direction {
            Direction::Release => {
                enigo.key(code, Direction::Release)?;
                for m in mods.iter().rev() {
                    enigo.key(*m, Direction::Release)?;
                }
            }
            _ => {
                for m in &mods {
                    enigo.key(*m, Direction::Press)?;
                }
                enigo.key(code, Direction::Press)?;
            }
        }
        Ok(())
    }

    fn start_capture_listener(&self) {
        let slot = self.capture.clone();
        let alive = self.capture_alive.clone();
        alive.store(true, Ordering::SeqCst);
        let spawned = thread::Builder::new()
            .name("key-capture".into())
            .spawn(move || {
                let listener_slot = slot.clone();
                let result = rdev::listen(move |event| {
                    if let rdev::EventType::KeyPress(key) = event.event_type
                        && let Some(name) = capture_name(key)
                        && let Some(tx) = listener_slot.lock().take()
                    {
                        // The reader may have given up; nothing to do then.
                        let _ = tx.send(name.to_string());
                    }
                });
                if let Err(e) = result {
                    error!("key capture listener failed: {e:?}");
                }
                alive.store(false, Ordering::SeqCst);
                slot.lock().take();
            });
        if let Err(e) = spawned {
            error!("failed to start key capture listener: {e}");
            self.capture_alive.store(false, Ordering::SeqCst);
        }
    }
}

impl KeyboardHook for GlobalHook {
    fn on_key_down(&self, hotkey: &str, callback: KeyCallback) -> Result<HookId> {
        self.subscribe(hotkey, KeyEventKind::Down, callback)
    }

    fn on_key_up(&self, hotkey: &str, callback: KeyCallback) -> Result<HookId> {
        self.subscribe(hotkey, KeyEventKind::Up, callback)
    }

    fn unhook(&self, id: HookId) -> Result<()> {
        let mut bindings = self.bindings.lock();
        let os_id = bindings
            .hooks
            .remove(&id)
            .ok_or_else(|| Error::HotkeyOperation(format!("Hotkey not found: {id}")))?;
        let emptied = match bindings.by_hotkey.get_mut(&os_id) {
            Some(binding) => {
                binding.down.remove(&id);
                binding.up.remove(&id);
                binding.is_empty()
            }
            None => false,
        };
        if emptied && let Some(binding) = bindings.by_hotkey.remove(&os_id) {
            self.manager.unregister(binding.hotkey)?;
            trace!(key = %binding.key, os_id, "unregistered from OS");
        }
        Ok(())
    }

    fn press(&self, key: &str) -> Result<()> {
        self.inject(key, Direction::Press)
    }

    fn release(&self, key: &str) -> Result<()> {
        self.inject(key, Direction::Release)
    }

    fn read_key(&self) -> Result<String> {
        let (tx, rx) = mpsc::channel();
        *self.capture.lock() = Some(tx);
        self.capture_started.call_once(|| self.start_capture_listener());
        if !self.capture_alive.load(Ordering::SeqCst) {
            self.capture.lock().take();
            return Err(Error::Capture("keyboard listener is not running".into()));
        }
        rx.recv()
            .map_err(|_| Error::Capture("keyboard listener stopped".into()))
    }
}

impl Drop for GlobalHook {
    fn drop(&mut self) {
        let mut bindings = self.bindings.lock();
        for (_, binding) in bindings.by_hotkey.drain() {
            if let Err(e) = self.manager.unregister(binding.hotkey) {
                warn!("failed to unregister {}: {e}", binding.key);
            }
        }
        bindings.hooks.clear();
    }
}

/// Fan one OS event out to its subscribers, outside the bindings lock.
fn deliver(bindings: &Mutex<Bindings>, event: GlobalHotKeyEvent) {
    let kind = match event.state {
        HotKeyState::Pressed => KeyEventKind::Down,
        HotKeyState::Released => KeyEventKind::Up,
    };
    let (callbacks, key_event) = {
        let mut bindings = bindings.lock();
        let Some(binding) = bindings.by_hotkey.get_mut(&event.id) else {
            trace!(id = event.id, "event for unknown hotkey");
            return;
        };
        let key_event = KeyEvent {
            scan_code: event.id,
            name: binding.key.code_name().to_string(),
            kind,
            is_keypad: Some(binding.key.is_keypad()),
        };
        let callbacks: Vec<KeyCallback> = binding.callbacks(kind).values().cloned().collect();
        (callbacks, key_event)
    };
    for callback in callbacks {
        if panic::catch_unwind(AssertUnwindSafe(|| callback(&key_event))).is_err() {
            error!(id = event.id, key = %key_event.name, "hotkey callback panicked");
        }
    }
}

/// Modifier keys to hold around a simulated press, in press order.
fn modifier_keys(modifiers: Option<Modifiers>) -> Vec<enigo::Key> {
    let Some(mods) = modifiers else {
        return Vec::new();
    };
    [
        (Modifiers::CONTROL, enigo::Key::Control),
        (Modifiers::ALT, enigo::Key::Alt),
        (Modifiers::SHIFT, enigo::Key::Shift),
        (Modifiers::SUPER, enigo::Key::Meta),
    ]
    .into_iter()
    .filter(|(m, _)| mods.contains(*m))
    .map(|(_, k)| k)
    .collect()
}

/// The enigo key that simulates `code`, if it can be simulated everywhere.
fn enigo_key(code: Code) -> Option<enigo::Key> {
    use enigo::Key as E;
    let key = match code {
        Code::ArrowUp => E::UpArrow,
        Code::ArrowDown => E::DownArrow,
        Code::ArrowLeft => E::LeftArrow,
        Code::ArrowRight => E::RightArrow,
        Code::ControlLeft | Code::ControlRight => E::Control,
        Code::ShiftLeft | Code::ShiftRight => E::Shift,
        Code::AltLeft | Code::AltRight => E::Alt,
        Code::Escape => E::Escape,
        Code::Space => E::Space,
        Code::Enter | Code::NumpadEnter => E::Return,
        Code::Tab => E::Tab,
        Code::Backspace => E::Backspace,
        Code::Delete => E::Delete,
        Code::Home => E::Home,
        Code::End => E::End,
        Code::PageUp => E::PageUp,
        Code::PageDown => E::PageDown,
        Code::CapsLock => E::CapsLock,
        Code::F1 => E::F1,
        Code::F2 => E::F2,
        Code::F3 => E::F3,
        Code::F4 => E::F4,
        Code::F5 => E::F5,
        Code::F6 => E::F6,
        Code::F7 => E::F7,
        Code::F8 => E::F8,
        Code::F9 => E::F9,
        Code::F10 => E::F10,
        Code::F11 => E::F11,
        Code::F12 => E::F12,
        Code::Minus => E::Unicode('-'),
        Code::Equal => E::Unicode('='),
        Code::BracketLeft => E::Unicode('['),
        Code::BracketRight => E::Unicode(']'),
        Code::Backslash => E::Unicode('\\'),
        Code::Semicolon => E::Unicode(';'),
        Code::Quote => E::Unicode('\''),
        Code::Comma => E::Unicode(','),
        Code::Period => E::Unicode('.'),
        Code::Slash => E::Unicode('/'),
        Code::Backquote => E::Unicode('`'),
        other => {
            let name = Key::new(other, None).code_name();
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphanumeric() => E::Unicode(c),
                _ => return None,
            }
        }
    };
    Some(key)
}

/// The hotkey string for a captured physical key.
fn capture_name(key: rdev::Key) -> Option<&'static str> {
    use rdev::Key as R;
    let name = match key {
        R::KeyA => "a",
        R::KeyB => "b",
        R::KeyC => "c",
        R::KeyD => "d",
        R::KeyE => "e",
        R::KeyF => "f",
        R::KeyG => "g",
        R::KeyH => "h",
        R::KeyI => "i",
        R::KeyJ => "j",
        R::KeyK => "k",
        R::KeyL => "l",
        R::KeyM => "m",
        R::KeyN => "n",
        R::KeyO => "o",
        R::KeyP => "p",
        R::KeyQ => "q",
        R::KeyR => "r",
        R::KeyS => "s",
        R::KeyT => "t",
        R::KeyU => "u",
        R::KeyV => "v",
        R::KeyW => "w",
        R::KeyX => "x",
        R::KeyY => "y",
        R::KeyZ => "z",
        R::Num0 => "0",
        R::Num1 => "1",
        R::Num2 => "2",
        R::Num3 => "3",
        R::Num4 => "4",
        R::Num5 => "5",
        R::Num6 => "6",
        R::Num7 => "7",
        R::Num8 => "8",
        R::Num9 => "9",
        R::Kp0 => "num 0",
        R::Kp1 => "num 1",
        R::Kp2 => "num 2",
        R::Kp3 => "num 3",
        R::Kp4 => "num 4",
        R::Kp5 => "num 5",
        R::Kp6 => "num 6",
        R::Kp7 => "num 7",
        R::Kp8 => "num 8",
        R::Kp9 => "num 9",
        R::KpPlus => "num add",
        R::KpMinus => "num subtract",
        R::KpMultiply => "num multiply",
        R::KpDivide => "num divide",
        R::KpDelete => "num decimal",
        R::KpReturn => "num enter",
        R::NumLock => "num lock",
        R::F1 => "f1",
        R::F2 => "f2",
        R::F3 => "f3",
        R::F4 => "f4",
        R::F5 => "f5",
        R::F6 => "f6",
        R::F7 => "f7",
        R::F8 => "f8",
        R::F9 => "f9",
        R::F10 => "f10",
        R::F11 => "f11",
        R::F12 => "f12",
        R::UpArrow => "up",
        R::DownArrow => "down",
        R::LeftArrow => "left",
        R::RightArrow => "right",
        R::ControlLeft => "ctrl",
        R::ControlRight => "right ctrl",
        R::ShiftLeft => "shift",
        R::ShiftRight => "right shift",
        R::Alt => "alt",
        R::AltGr => "right alt",
        R::Escape => "escape",
        R::Space => "space",
        R::Return => "enter",
        R::Tab => "tab",
        R::CapsLock => "caps lock",
        R::Backspace => "backspace",
        R::Delete => "delete",
        R::Insert => "insert",
        R::Home => "home",
        R::End => "end",
        R::PageUp => "page up",
        R::PageDown => "page down",
        R::Minus => "minus",
        R::Equal => "equal",
        R::LeftBracket => "bracketleft",
        R::RightBracket => "bracketright",
        R::BackSlash => "backslash",
        R::SemiColon => "semicolon",
        R::Quote => "quote",
        R::Comma => "comma",
        R::Dot => "period",
        R::Slash => "slash",
        R::BackQuote => "backquote",
        _ => return None,
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A binding for `hotkey` with the given down callbacks, keyed like the OS.
    fn bindings_with(hotkey: &str, callbacks: Vec<KeyCallback>) -> (Mutex<Bindings>, u32) {
        let key = Key::parse(hotkey).unwrap();
        let hotkey = key.to_hotkey();
        let os_id = hotkey.id();
        let down = callbacks
            .into_iter()
            .enumerate()
            .map(|(i, cb)| (HookId(i as u64 + 1), cb))
            .collect();
        let mut bindings = Bindings::default();
        bindings.by_hotkey.insert(
            os_id,
            Binding {
                hotkey,
                key,
                down,
                up: HashMap::new(),
            },
        );
        (Mutex::new(bindings), os_id)
    }

    #[test]
    fn test_panicking_callback_does_not_stop_delivery() {
        let hits = Arc::new(AtomicU64::new(0));
        let counter = hits.clone();
        let faulty: KeyCallback = Arc::new(|event: &KeyEvent| {
            if event.kind == KeyEventKind::Down {
                panic!("subscriber fault");
            }
        });
        let counting: KeyCallback = Arc::new(move |_: &KeyEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let (bindings, os_id) = bindings_with("num 7", vec![faulty, counting]);
        let pressed = || GlobalHotKeyEvent {
            id: os_id,
            state: HotKeyState::Pressed,
        };

        deliver(&bindings, pressed());
        deliver(&bindings, pressed());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_captured_names_parse_back() {
        for key in [
            rdev::Key::Kp7,
            rdev::Key::KeyH,
            rdev::Key::UpArrow,
            rdev::Key::ControlLeft,
            rdev::Key::PageDown,
            rdev::Key::KpReturn,
        ] {
            let name = capture_name(key).unwrap();
            assert_eq!(Key::parse(name).unwrap().to_string(), name);
        }
        assert_eq!(capture_name(rdev::Key::Kp3), Some("num 3"));
        assert_eq!(capture_name(rdev::Key::Unknown(999)), None);
    }

    #[test]
    fn test_simulated_keys() {
        assert_eq!(enigo_key(Code::ArrowUp), Some(enigo::Key::UpArrow));
        assert_eq!(enigo_key(Code::KeyH), Some(enigo::Key::Unicode('h')));
        assert_eq!(enigo_key(Code::Digit4), Some(enigo::Key::Unicode('4')));
        assert_eq!(enigo_key(Code::ControlLeft), Some(enigo::Key::Control));
        assert_eq!(enigo_key(Code::Numpad4), None);
    }

    #[test]
    fn test_modifiers_press_order() {
        let mods = modifier_keys(Some(Modifiers::SHIFT | Modifiers::CONTROL));
        assert_eq!(mods, vec![enigo::Key::Control, enigo::Key::Shift]);
        assert!(modifier_keys(None).is_empty());
    }
}
