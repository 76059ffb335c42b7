use crate::lock::{ExecGuard, ExecLock};
use crate::log::LogSink;
use crate::macros::{Macro, Slot};
use crate::player::MacroPlayer;
use crate::progress::{Progress, ProgressNotifier};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// The optional key pressed before every macro to open the in-game panel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AutoPanel {
    pub enabled: bool,
    pub key: String,
}

impl AutoPanel {
    pub fn new(enabled: bool, key: impl Into<String>) -> Self {
        Self {
            enabled,
            key: key.into(),
        }
    }

    /// The key to prepend, if the feature is on and a key is set.
    pub fn active_key(&self) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let key = self.key.trim();
        (!key.is_empty()).then(|| key.to_string())
    }
}

/// Holds the execution lock for one run. On drop it frees the lock, then
/// emits `Stop`, however the worker exits.
struct RunGuard {
    lock: Option<ExecGuard>,
    notifier: Arc<ProgressNotifier>,
    mac: Arc<Macro>,
    slot: Option<Slot>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        drop(self.lock.take());
        self.notifier.notify(&Progress::Stop {
            mac: self.mac.clone(),
            slot: self.slot,
        });
    }
}

/// Decides whether a debounced press launches its macro, and launches it.
pub struct Dispatcher {
    player: Arc<MacroPlayer>,
    lock: Arc<ExecLock>,
    notifier: Arc<ProgressNotifier>,
    panel: RwLock<AutoPanel>,
    /// Lowercased hotkey → slot, for progress reporting.
    slots: RwLock<HashMap<String, Slot>>,
    log: Arc<dyn LogSink>,
}

impl Dispatcher {
    pub fn new(
        player: Arc<MacroPlayer>,
        lock: Arc<ExecLock>,
        notifier: Arc<ProgressNotifier>,
        log: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            player,
            lock,
            notifier,
            panel: RwLock::new(AutoPanel::default()),
            slots: RwLock::new(HashMap::new()),
            log,
        }
    }

    /// Replace the panel key setting.
    pub fn set_auto_panel(&self, panel: AutoPanel) {
        *self.panel.write() = panel;
    }

    /// The current panel key setting.
    pub fn auto_panel(&self) -> AutoPanel {
        self.panel.read().clone()
    }

    pub(crate) fn bind_slot(&self, hotkey: &str, slot: Slot) {
        self.slots.write().insert(hotkey.to_lowercase(), slot);
    }

    pub(crate) fn unbind_slot(&self, hotkey: &str) {
        self.slots.write().remove(&hotkey.to_lowercase());
    }

    pub(crate) fn clear_slots(&self) {
        self.slots.write().clear();
    }

    /// The slot a hotkey is assigned to, if any.
    pub fn slot_for(&self, hotkey: &str) -> Option<Slot> {
        self.slots.read().get(&hotkey.to_lowercase()).copied()
    }

    /// Handle a new press of `mac`'s hotkey.
    ///
    /// Returns the worker handle if the macro was launched, or `None` if it was
    /// dropped because another macro is running. Never blocks on playback.
    pub fn on_debounced_press(&self, mac: Arc<Macro>) -> Option<JoinHandle<()>> {
        let Some(guard) = self.lock.try_acquire() else {
            self.log
                .info("Another macro is running, ignoring new request.");
            return None;
        };

        self.log.info(&format!(
            "Trigger received for hotkey '{}' ({}).",
            mac.hotkey(),
            mac.label()
        ));
        let slot = self.slot_for(mac.hotkey());
        let panel_key = self.panel.read().active_key();
        let total_time = mac.estimated_time(panel_key.is_some());

        self.notifier.notify(&Progress::Start {
            mac: mac.clone(),
            slot,
            total_time,
        });

        let run = RunGuard {
            lock: Some(guard),
            notifier: self.notifier.clone(),
            mac: mac.clone(),
            slot,
        };
        let player = self.player.clone();
        let log = self.log.clone();
        let spawned = thread::Builder::new()
            .name("macro-player".into())
            .spawn(move || {
                let run = run;
                if let Some(guard) = &run.lock
                    && let Err(e) = player.run_locked(guard, &mac, panel_key.as_deref())
                {
                    log.warn(&format!("{}: aborted: {e}", mac.label()));
                }
            });

        match spawned {
            Ok(handle) => {
                debug!(?slot, "macro worker started");
                Some(handle)
            }
            // The unrun closure drops its RunGuard here: lock freed, then Stop.
            Err(e) => {
                warn!("failed to spawn macro worker: {e}");
                None
            }
        }
    }
}
