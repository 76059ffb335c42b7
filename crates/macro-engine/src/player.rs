use crate::Result;
use crate::hook::KeyboardHook;
use crate::lock::{ExecGuard, ExecLock};
use crate::log::LogSink;
use crate::macros::Macro;
use std::sync::Arc;
use std::thread;
use tracing::trace;

/// Plays a macro's key sequence through the hook, one macro at a time.
pub struct MacroPlayer {
    hook: Arc<dyn KeyboardHook>,
    lock: Arc<ExecLock>,
    log: Arc<dyn LogSink>,
}

impl MacroPlayer {
    pub fn new(hook: Arc<dyn KeyboardHook>, lock: Arc<ExecLock>, log: Arc<dyn LogSink>) -> Self {
        Self { hook, lock, log }
    }

    /// Take the execution lock (blocking) and play `mac`, optionally preceded
    /// by `panel_key`.
    pub fn run(&self, mac: &Macro, panel_key: Option<&str>) -> Result<()> {
        let guard = self.lock.acquire();
        self.run_locked(&guard, mac, panel_key)
    }

    /// Play `mac` while holding a lock the caller already took.
    pub(crate) fn run_locked(
        &self,
        _guard: &ExecGuard,
        mac: &Macro,
        panel_key: Option<&str>,
    ) -> Result<()> {
        let label = mac.label();
        let panel_key = panel_key.filter(|k| !k.is_empty());
        let sequence: Vec<&str> = panel_key
            .into_iter()
            .chain(mac.keys().iter().map(String::as_str))
            .collect();

        if let Some(key) = panel_key {
            self.log
                .info(&format!("{label}: auto panel ON, prepending '{key}'."));
        }
        self.log
            .info(&format!("{label}: running {} key presses...", sequence.len()));

        for key in sequence {
            trace!(key, "press");
            self.hook.press(key)?;
            thread::sleep(mac.duration());
            self.hook.release(key)?;
            thread::sleep(mac.delay());
        }

        self.log.info(&format!("{label}: done."));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::MemoryLog;
    use crate::test_support::{FakeHook, Injected};
    use std::time::Duration;

    fn fast(keys: &[&str]) -> Macro {
        Macro::new("num 1", keys.iter().copied())
            .with_delay(Duration::ZERO)
            .with_duration(Duration::ZERO)
    }

    fn player(hook: &Arc<FakeHook>) -> (MacroPlayer, Arc<ExecLock>) {
        let lock = ExecLock::new();
        let p = MacroPlayer::new(hook.clone(), lock.clone(), Arc::new(MemoryLog::default()));
        (p, lock)
    }

    #[test]
    fn test_panel_key_is_pressed_first() {
        let hook = Arc::new(FakeHook::new());
        let (p, lock) = player(&hook);
        p.run(&fast(&["up", "down"]), Some("h")).unwrap();
        assert_eq!(
            hook.injected(),
            vec![
                Injected::Press("h".into()),
                Injected::Release("h".into()),
                Injected::Press("up".into()),
                Injected::Release("up".into()),
                Injected::Press("down".into()),
                Injected::Release("down".into()),
            ]
        );
        assert!(!lock.is_held());
    }

    #[test]
    fn test_empty_panel_key_is_ignored() {
        let hook = Arc::new(FakeHook::new());
        let (p, _) = player(&hook);
        p.run(&fast(&["left"]), Some("")).unwrap();
        assert_eq!(hook.pressed(), vec!["left".to_string()]);
    }

    #[test]
    fn test_lock_released_after_injection_failure() {
        let hook = Arc::new(FakeHook::new());
        hook.fail_on_press(2);
        let (p, lock) = player(&hook);
        assert!(p.run(&fast(&["a", "b", "c"]), None).is_err());
        assert_eq!(hook.pressed(), vec!["a".to_string()]);
        assert!(!lock.is_held());
    }
}
