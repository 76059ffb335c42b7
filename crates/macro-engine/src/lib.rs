//! A numpad hotkey to key-sequence macro engine.
//!
//! Hotkeys are subscribed through a [`KeyboardHook`]. Each new press of a
//! registered hotkey is debounced, checked against the single-flight lock and
//! played back on a worker thread as a timed run of simulated key presses.
//! Observers hear a [`Progress::Start`] and a matching [`Progress::Stop`] for
//! every macro that runs.
//!
//! [`MacroEngine`] wires the pieces together around one hook; [`GlobalHook`]
//! is the OS-backed hook and [`test_support::FakeHook`] an in-memory one.

pub use global_hotkey::hotkey::{Code, Modifiers};

mod backend;
mod debounce;
mod dispatcher;
mod engine;
mod error;
mod hook;
mod key;
mod lock;
mod log;
mod macros;
mod player;
mod progress;
mod registry;
pub mod test_support;

pub use backend::GlobalHook;
pub use debounce::{Debouncer, NUMPAD_PREFIX};
pub use dispatcher::{AutoPanel, Dispatcher};
pub use engine::MacroEngine;
pub use error::{Error, Result};
pub use hook::{HookId, KeyCallback, KeyEvent, KeyEventKind, KeyboardHook};
pub use key::Key;
pub use lock::{ExecGuard, ExecLock};
pub use log::{LogSink, MemoryLog, TracingSink};
pub use macros::{DEFAULT_DELAY, DEFAULT_DURATION, Macro, MacroRecord, Slot};
pub use player::MacroPlayer;
pub use progress::{Progress, ProgressCallback, ProgressNotifier};
pub use registry::HotkeyRegistry;
