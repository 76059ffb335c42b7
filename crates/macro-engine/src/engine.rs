use crate::Result;
use crate::debounce::Debouncer;
use crate::dispatcher::{AutoPanel, Dispatcher};
use crate::hook::KeyboardHook;
use crate::lock::ExecLock;
use crate::log::LogSink;
use crate::macros::{Macro, MacroRecord, Slot};
use crate::player::MacroPlayer;
use crate::progress::{ProgressCallback, ProgressNotifier};
use crate::registry::HotkeyRegistry;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Wires the debouncer, registry, dispatcher and player around one hook.
///
/// Dropping the engine removes every hook subscription. A macro already
/// playing keeps running to completion on its worker thread.
pub struct MacroEngine {
    hook: Arc<dyn KeyboardHook>,
    lock: Arc<ExecLock>,
    notifier: Arc<ProgressNotifier>,
    dispatcher: Arc<Dispatcher>,
    player: Arc<MacroPlayer>,
    registry: Mutex<HotkeyRegistry>,
}

impl MacroEngine {
    pub fn new(hook: Arc<dyn KeyboardHook>, log: Arc<dyn LogSink>) -> Self {
        let lock = ExecLock::new();
        let notifier = Arc::new(ProgressNotifier::new());
        let player = Arc::new(MacroPlayer::new(hook.clone(), lock.clone(), log.clone()));
        let dispatcher = Arc::new(Dispatcher::new(
            player.clone(),
            lock.clone(),
            notifier.clone(),
            log.clone(),
        ));
        let registry = HotkeyRegistry::new(
            hook.clone(),
            Arc::new(Debouncer::new()),
            dispatcher.clone(),
            log,
        );
        Self {
            hook,
            lock,
            notifier,
            dispatcher,
            player,
            registry: Mutex::new(registry),
        }
    }

    /// Replace all registrations; see [`HotkeyRegistry::register`].
    pub fn register<I>(&self, macros: I)
    where
        I: IntoIterator<Item = (Slot, Macro)>,
    {
        self.registry.lock().register(macros);
    }

    /// Unsubscribe and forget every macro.
    pub fn clear(&self) {
        self.registry.lock().clear();
    }

    /// Release every subscription before the process exits.
    pub fn shutdown(&self) {
        debug!("engine shutdown");
        self.clear();
    }

    /// Register one more macro; see [`HotkeyRegistry::add_macro`].
    pub fn add_macro(&self, mac: Macro) -> Result<()> {
        self.registry.lock().add_macro(mac)
    }

    /// Replace the macro at `index`, keeping it on failure.
    pub fn update_macro(&self, index: usize, mac: Macro) -> Result<()> {
        self.registry.lock().update_macro(index, mac)
    }

    /// Unsubscribe and remove the macro at `index`.
    pub fn remove_macro(&self, index: usize) -> Result<()> {
        self.registry.lock().remove_macro(index)
    }

    /// A snapshot of the registered macros.
    pub fn records(&self) -> Vec<MacroRecord> {
        self.registry.lock().records().to_vec()
    }

    /// Turn the panel key prefix on or off.
    pub fn set_auto_panel(&self, enabled: bool, key: impl Into<String>) {
        self.dispatcher.set_auto_panel(AutoPanel::new(enabled, key));
    }

    /// The current panel key setting.
    pub fn auto_panel(&self) -> AutoPanel {
        self.dispatcher.auto_panel()
    }

    /// Install the progress observer, replacing any previous one.
    pub fn set_progress_observer(&self, observer: Option<ProgressCallback>) {
        self.notifier.set_observer(observer);
    }

    /// True while a macro is pressing keys.
    pub fn is_running(&self) -> bool {
        self.lock.is_held()
    }

    /// Play `mac` on the calling thread, waiting for any running macro first.
    pub fn play(&self, mac: &Macro) -> Result<()> {
        let panel = self.dispatcher.auto_panel().active_key();
        self.player.run(mac, panel.as_deref())
    }

    /// The keyboard hook the engine subscribes through.
    pub fn hook(&self) -> &Arc<dyn KeyboardHook> {
        &self.hook
    }
}

impl Drop for MacroEngine {
    fn drop(&mut self) {
        self.registry.get_mut().clear();
    }
}
