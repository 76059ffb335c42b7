//! Test support for driving the engine without touching the OS.
//! Public so integration tests and downstream crates can share it.

use crate::error::{Error, Result};
use crate::hook::{HookId, KeyCallback, KeyEvent, KeyEventKind, KeyboardHook};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// One simulated key action recorded by [`FakeHook`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Injected {
    Press(String),
    Release(String),
}

struct Subscriber {
    hotkey: String,
    kind: KeyEventKind,
    callback: KeyCallback,
}

/// An in-memory [`KeyboardHook`].
///
/// Records injected presses, can be told to refuse hotkeys or fail the N-th
/// press, and lets tests emit events to subscribers synchronously.
#[derive(Default)]
pub struct FakeHook {
    subscribers: Mutex<HashMap<HookId, Subscriber>>,
    rejected: Mutex<HashSet<String>>,
    injected: Mutex<Vec<Injected>>,
    captured: Mutex<VecDeque<String>>,
    next_id: AtomicU64,
    presses: AtomicUsize,
    fail_press_at: Mutex<Option<usize>>,
}

impl FakeHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subscriptions for `hotkey` fail.
    pub fn reject_hotkey(&self, hotkey: &str) {
        self.rejected.lock().insert(hotkey.to_lowercase());
    }

    /// Make the `n`-th press (1-based, counted over the hook's lifetime) fail.
    pub fn fail_on_press(&self, n: usize) {
        *self.fail_press_at.lock() = Some(n);
    }

    /// Queue a key name for the next `read_key`.
    pub fn queue_capture(&self, key: &str) {
        self.captured.lock().push_back(key.to_string());
    }

    /// Deliver `event` to every subscriber of `hotkey` for the event's kind.
    /// Returns how many callbacks ran.
    pub fn emit(&self, hotkey: &str, event: &KeyEvent) -> usize {
        let hotkey = hotkey.to_lowercase();
        // Collect first so callbacks may call back into the hook.
        let callbacks: Vec<KeyCallback> = self
            .subscribers
            .lock()
            .values()
            .filter(|s| s.hotkey == hotkey && s.kind == event.kind)
            .map(|s| s.callback.clone())
            .collect();
        for cb in &callbacks {
            cb(event);
        }
        callbacks.len()
    }

    /// Number of live subscriptions (down and up counted separately).
    pub fn subscription_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Every press and release in order.
    pub fn injected(&self) -> Vec<Injected> {
        self.injected.lock().clone()
    }

    /// Just the pressed keys, in order.
    pub fn pressed(&self) -> Vec<String> {
        self.injected
            .lock()
            .iter()
            .filter_map(|i| match i {
                Injected::Press(k) => Some(k.clone()),
                Injected::Release(_) => None,
            })
            .collect()
    }

    fn subscribe(&self, hotkey: &str, kind: KeyEventKind, callback: KeyCallback) -> Result<HookId> {
        let hotkey = hotkey.to_lowercase();
        if self.rejected.lock().contains(&hotkey) {
            return Err(Error::HotkeyOperation(format!("rejected hotkey: {hotkey}")));
        }
        let id = HookId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.subscribers.lock().insert(
            id,
            Subscriber {
                hotkey,
                kind,
                callback,
            },
        );
        Ok(id)
    }
}

impl KeyboardHook for FakeHook {
    fn on_key_down(&self, hotkey: &str, callback: KeyCallback) -> Result<HookId> {
        self.subscribe(hotkey, KeyEventKind::Down, callback)
    }

    fn on_key_up(&self, hotkey: &str, callback: KeyCallback) -> Result<HookId> {
        self.subscribe(hotkey, KeyEventKind::Up, callback)
    }

    fn unhook(&self, id: HookId) -> Result<()> {
        self.subscribers
            .lock()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::HotkeyOperation(format!("unknown {id}")))
    }

    fn press(&self, key: &str) -> Result<()> {
        let n = self.presses.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.fail_press_at.lock() == Some(n) {
            return Err(Error::Inject(format!("injected failure pressing {key}")));
        }
        self.injected.lock().push(Injected::Press(key.to_string()));
        Ok(())
    }

    fn release(&self, key: &str) -> Result<()> {
        self.injected.lock().push(Injected::Release(key.to_string()));
        Ok(())
    }

    fn read_key(&self) -> Result<String> {
        self.captured
            .lock()
            .pop_front()
            .ok_or_else(|| Error::Capture("no key queued".to_string()))
    }
}
