use crate::debounce::Debouncer;
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::hook::{KeyEvent, KeyboardHook};
use crate::log::LogSink;
use crate::macros::{Macro, MacroRecord, Slot, Subscription};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace};

/// Owns the hook subscriptions for every active macro.
pub struct HotkeyRegistry {
    hook: Arc<dyn KeyboardHook>,
    debouncer: Arc<Debouncer>,
    dispatcher: Arc<Dispatcher>,
    records: Vec<MacroRecord>,
    log: Arc<dyn LogSink>,
}

impl HotkeyRegistry {
    pub fn new(
        hook: Arc<dyn KeyboardHook>,
        debouncer: Arc<Debouncer>,
        dispatcher: Arc<Dispatcher>,
        log: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            hook,
            debouncer,
            dispatcher,
            records: Vec::new(),
            log,
        }
    }

    /// Replace all registrations with `macros`.
    ///
    /// Later entries whose hotkey (case-insensitively) repeats an earlier one
    /// are skipped, as are entries the hook refuses; both are logged and the
    /// rest of the batch still registers.
    pub fn register<I>(&mut self, macros: I)
    where
        I: IntoIterator<Item = (Slot, Macro)>,
    {
        self.clear();
        let mut seen = HashSet::new();
        for (slot, mac) in macros {
            let hotkey = mac.normalized_hotkey();
            if !seen.insert(hotkey.clone()) {
                self.log.warn(&format!(
                    "Hotkey '{hotkey}' already in use; skipping {}.",
                    mac.name().map_or_else(|| slot.to_string(), str::to_string)
                ));
                continue;
            }
            let mac = Arc::new(mac.normalized());
            match self.subscribe(mac.clone()) {
                Ok(subscription) => {
                    self.dispatcher.bind_slot(&hotkey, slot);
                    self.records.push(MacroRecord {
                        mac,
                        slot: Some(slot),
                        subscription,
                    });
                }
                Err(e) => {
                    self.log.warn(&format!(
                        "Cannot register {} for slot {slot} ({hotkey}): {e}",
                        mac.label()
                    ));
                }
            }
        }
        debug!(count = self.records.len(), "macros registered");
    }

    /// Remove every subscription. Safe to call repeatedly.
    pub fn clear(&mut self) {
        for record in self.records.drain(..) {
            unsubscribe(self.hook.as_ref(), record.subscription, self.log.as_ref());
        }
        self.dispatcher.clear_slots();
        self.debouncer.clear();
    }

    /// Register one more macro without a slot.
    pub fn add_macro(&mut self, mac: Macro) -> Result<()> {
        let mac = mac.normalized();
        self.ensure_unused(mac.hotkey(), None)?;
        let mac = Arc::new(mac);
        let subscription = self.subscribe(mac.clone())?;
        self.records.push(MacroRecord {
            mac,
            slot: None,
            subscription,
        });
        Ok(())
    }

    /// Replace the macro at `index`, keeping its slot.
    pub fn update_macro(&mut self, index: usize, mac: Macro) -> Result<()> {
        if index >= self.records.len() {
            return Err(Error::InvalidIndex(index));
        }
        let mac = mac.normalized();
        self.ensure_unused(mac.hotkey(), Some(index))?;
        let mac = Arc::new(mac);
        // Subscribe first so a refused hotkey leaves the old record untouched.
        let subscription = self.subscribe(mac.clone())?;
        let slot = self.records[index].slot;
        let old = std::mem::replace(
            &mut self.records[index],
            MacroRecord {
                mac: mac.clone(),
                slot,
                subscription,
            },
        );
        unsubscribe(self.hook.as_ref(), old.subscription, self.log.as_ref());
        if let Some(slot) = slot {
            self.dispatcher.unbind_slot(old.mac.hotkey());
            self.dispatcher.bind_slot(mac.hotkey(), slot);
        }
        Ok(())
    }

    /// Remove the macro at `index`.
    pub fn remove_macro(&mut self, index: usize) -> Result<()> {
        if index >= self.records.len() {
            return Err(Error::InvalidIndex(index));
        }
        let record = self.records.remove(index);
        unsubscribe(self.hook.as_ref(), record.subscription, self.log.as_ref());
        if record.slot.is_some() {
            self.dispatcher.unbind_slot(record.mac.hotkey());
        }
        Ok(())
    }

    /// Registered macros in registration order.
    pub fn records(&self) -> &[MacroRecord] {
        &self.records
    }

    fn ensure_unused(&self, hotkey: &str, ignore: Option<usize>) -> Result<()> {
        let taken = self
            .records
            .iter()
            .enumerate()
            .any(|(i, r)| Some(i) != ignore && r.mac.hotkey() == hotkey);
        if taken {
            return Err(Error::DuplicateHotkey(hotkey.to_string()));
        }
        Ok(())
    }

    /// Hook the down/up pair for `mac`. On failure nothing stays subscribed.
    fn subscribe(&self, mac: Arc<Macro>) -> Result<Subscription> {
        let hotkey = mac.hotkey().to_string();

        let on_down = {
            let debouncer = self.debouncer.clone();
            let dispatcher = self.dispatcher.clone();
            let mac = mac.clone();
            Arc::new(move |event: &KeyEvent| {
                if debouncer.on_down(mac.hotkey(), event) {
                    dispatcher.on_debounced_press(mac.clone());
                } else {
                    trace!(scan_code = event.scan_code, "suppressed key down");
                }
            })
        };
        let on_up = {
            let debouncer = self.debouncer.clone();
            Arc::new(move |event: &KeyEvent| debouncer.on_up(event))
        };

        let down = self.hook.on_key_down(&hotkey, on_down)?;
        let up = match self.hook.on_key_up(&hotkey, on_up) {
            Ok(up) => up,
            Err(e) => {
                if let Err(e) = self.hook.unhook(down) {
                    debug!("unhook after failed subscribe: {e}");
                }
                return Err(e);
            }
        };
        Ok(Subscription { down, up })
    }
}

fn unsubscribe(hook: &dyn KeyboardHook, subscription: Subscription, log: &dyn LogSink) {
    for id in [subscription.down, subscription.up] {
        if let Err(e) = hook.unhook(id) {
            log.warn(&format!("Failed to remove {id}: {e}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::ExecLock;
    use crate::log::MemoryLog;
    use crate::player::MacroPlayer;
    use crate::progress::ProgressNotifier;
    use crate::test_support::FakeHook;

    fn registry() -> (HotkeyRegistry, Arc<FakeHook>, Arc<MemoryLog>) {
        let hook = Arc::new(FakeHook::new());
        let log = Arc::new(MemoryLog::default());
        let lock = ExecLock::new();
        let player = Arc::new(MacroPlayer::new(hook.clone(), lock.clone(), log.clone()));
        let dispatcher = Arc::new(Dispatcher::new(
            player,
            lock,
            Arc::new(ProgressNotifier::new()),
            log.clone(),
        ));
        let reg = HotkeyRegistry::new(hook.clone(), Arc::new(Debouncer::new()), dispatcher, log.clone());
        (reg, hook, log)
    }

    fn slot(n: u8) -> Slot {
        Slot::new(n).unwrap()
    }

    #[test]
    fn test_duplicate_in_batch_keeps_first() {
        let (mut reg, hook, log) = registry();
        reg.register([
            (slot(7), Macro::new("Num 7", ["up"])),
            (slot(8), Macro::new("NUM 7", ["down"])),
            (slot(9), Macro::new("num 9", ["left"])),
        ]);
        let hotkeys: Vec<_> = reg.records().iter().map(|r| r.mac().hotkey()).collect();
        assert_eq!(hotkeys, vec!["num 7", "num 9"]);
        assert_eq!(reg.records()[0].mac().keys(), ["up".to_string()]);
        assert!(log.contains("Hotkey 'num 7' already in use"));
        assert_eq!(hook.subscription_count(), 4);
    }

    #[test]
    fn test_register_replaces_previous_batch() {
        let (mut reg, hook, _) = registry();
        reg.register([(slot(1), Macro::new("num 1", ["up"]))]);
        reg.register([(slot(2), Macro::new("num 2", ["down"]))]);
        assert_eq!(reg.records().len(), 1);
        assert_eq!(hook.subscription_count(), 2);
        assert_eq!(reg.dispatcher.slot_for("num 1"), None);
        assert_eq!(reg.dispatcher.slot_for("num 2"), Some(slot(2)));
    }

    #[test]
    fn test_refused_hotkey_is_skipped() {
        let (mut reg, hook, log) = registry();
        hook.reject_hotkey("num 8");
        reg.register([
            (slot(8), Macro::new("num 8", ["up"])),
            (slot(9), Macro::new("num 9", ["down"])),
        ]);
        assert_eq!(reg.records().len(), 1);
        assert_eq!(reg.records()[0].slot(), Some(slot(9)));
        assert!(log.contains("Cannot register num 8 for slot 8"));
        assert_eq!(hook.subscription_count(), 2);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let (mut reg, hook, _) = registry();
        reg.register([(slot(1), Macro::new("num 1", ["up"]))]);
        reg.clear();
        reg.clear();
        assert!(reg.records().is_empty());
        assert_eq!(hook.subscription_count(), 0);
    }

    #[test]
    fn test_add_rejects_duplicate_hotkey() {
        let (mut reg, hook, _) = registry();
        reg.add_macro(Macro::new("f1", ["up"])).unwrap();
        let err = reg.add_macro(Macro::new("F1", ["down"])).unwrap_err();
        assert!(matches!(err, Error::DuplicateHotkey(ref h) if h == "f1"));
        assert_eq!(reg.records().len(), 1);
        assert_eq!(hook.subscription_count(), 2);
    }

    #[test]
    fn test_update_checks_index_and_uniqueness() {
        let (mut reg, _, _) = registry();
        reg.register([
            (slot(1), Macro::new("num 1", ["up"])),
            (slot(2), Macro::new("num 2", ["down"])),
        ]);
        assert!(matches!(
            reg.update_macro(5, Macro::new("f1", ["up"])),
            Err(Error::InvalidIndex(5))
        ));
        assert!(matches!(
            reg.update_macro(0, Macro::new("NUM 2", ["up"])),
            Err(Error::DuplicateHotkey(_))
        ));
        assert_eq!(reg.records()[0].mac().hotkey(), "num 1");

        // Re-binding a record to its own hotkey is allowed.
        reg.update_macro(0, Macro::new("num 1", ["left"])).unwrap();
        reg.update_macro(1, Macro::new("f2", ["right"])).unwrap();
        assert_eq!(reg.records()[0].mac().keys(), ["left".to_string()]);
        assert_eq!(reg.records()[1].slot(), Some(slot(2)));
        assert_eq!(reg.dispatcher.slot_for("f2"), Some(slot(2)));
        assert_eq!(reg.dispatcher.slot_for("num 2"), None);
    }

    #[test]
    fn test_failed_update_keeps_old_record() {
        let (mut reg, hook, _) = registry();
        reg.register([(slot(1), Macro::new("num 1", ["up"]))]);
        hook.reject_hotkey("f9");
        assert!(reg.update_macro(0, Macro::new("f9", ["down"])).is_err());
        assert_eq!(reg.records()[0].mac().hotkey(), "num 1");
        assert_eq!(hook.subscription_count(), 2);
    }

    #[test]
    fn test_remove_checks_index() {
        let (mut reg, hook, _) = registry();
        reg.register([(slot(1), Macro::new("num 1", ["up"]))]);
        assert!(matches!(reg.remove_macro(1), Err(Error::InvalidIndex(1))));
        reg.remove_macro(0).unwrap();
        assert!(reg.records().is_empty());
        assert_eq!(hook.subscription_count(), 0);
        assert_eq!(reg.dispatcher.slot_for("num 1"), None);
    }
}
