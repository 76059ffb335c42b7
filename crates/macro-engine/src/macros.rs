use crate::error::{Error, Result};
use crate::hook::HookId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Default gap between key presses.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(50);
/// Default time a key stays pressed.
pub const DEFAULT_DURATION: Duration = Duration::from_millis(50);

/// One of the nine numpad grid positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slot(u8);

impl Slot {
    /// All slots in numpad grid order: 7 8 9 / 4 5 6 / 1 2 3.
    pub const GRID: [Slot; 9] = [
        Slot(7),
        Slot(8),
        Slot(9),
        Slot(4),
        Slot(5),
        Slot(6),
        Slot(1),
        Slot(2),
        Slot(3),
    ];

    /// Create a slot from its digit.
    pub fn new(n: u8) -> Option<Self> {
        (1..=9).contains(&n).then_some(Slot(n))
    }

    /// The slot's digit, 1-9.
    pub fn number(self) -> u8 {
        self.0
    }

    /// The hotkey a slot listens on unless reconfigured.
    pub fn default_hotkey(self) -> String {
        format!("num {}", self.0)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Slot {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u8>()
            .ok()
            .and_then(Slot::new)
            .ok_or_else(|| Error::InvalidKey(format!("Invalid slot: {s}")))
    }
}

impl TryFrom<String> for Slot {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Slot> for String {
    fn from(slot: Slot) -> Self {
        slot.to_string()
    }
}

/// A timed sequence of key presses bound to a hotkey.
#[derive(Debug, Clone, PartialEq)]
pub struct Macro {
    hotkey: String,
    keys: Vec<String>,
    delay: Duration,
    duration: Duration,
    name: Option<String>,
}

impl Macro {
    /// Create a macro with default timing.
    pub fn new<I, S>(hotkey: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hotkey: hotkey.into(),
            keys: keys.into_iter().map(Into::into).collect(),
            delay: DEFAULT_DELAY,
            duration: DEFAULT_DURATION,
            name: None,
        }
    }

    /// Set the gap after each key is released.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set how long each key is held.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The hotkey as given.
    pub fn hotkey(&self) -> &str {
        &self.hotkey
    }

    /// Keys to press, in order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Gap after each key is released.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// How long each key is held.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// The display name, if set.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The name if set, otherwise the hotkey.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.hotkey)
    }

    /// The hotkey in the lowercase form used for uniqueness checks.
    pub fn normalized_hotkey(&self) -> String {
        self.hotkey.to_lowercase()
    }

    /// A copy of this macro with its hotkey lowercased.
    pub fn normalized(&self) -> Self {
        Self {
            hotkey: self.normalized_hotkey(),
            ..self.clone()
        }
    }

    /// Upper bound on how long one run takes, used for progress display.
    ///
    /// Saturates at [`Duration::MAX`] for timings too long to add up.
    pub fn estimated_time(&self, with_panel: bool) -> Duration {
        let presses = self.keys.len() + usize::from(with_panel);
        let presses = u32::try_from(presses).unwrap_or(u32::MAX);
        self.duration
            .checked_add(self.delay)
            .and_then(|step| step.checked_mul(presses))
            .unwrap_or(Duration::MAX)
    }
}

/// The pair of hook tokens backing one registered macro.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    pub(crate) down: HookId,
    pub(crate) up: HookId,
}

/// A registered macro and the subscription that triggers it.
#[derive(Debug, Clone)]
pub struct MacroRecord {
    pub(crate) mac: Arc<Macro>,
    pub(crate) slot: Option<Slot>,
    pub(crate) subscription: Subscription,
}

impl MacroRecord {
    /// The registered macro.
    pub fn mac(&self) -> &Arc<Macro> {
        &self.mac
    }

    /// The slot it plays for, if it was registered through one.
    pub fn slot(&self) -> Option<Slot> {
        self.slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_counts_panel_press() {
        let mac = Macro::new("num 1", ["a", "b", "c", "d", "e"])
            .with_delay(Duration::from_secs_f64(0.05))
            .with_duration(Duration::from_secs_f64(0.05));
        assert_eq!(mac.estimated_time(true), Duration::from_millis(600));
        assert_eq!(mac.estimated_time(false), Duration::from_millis(500));
    }

    #[test]
    fn test_estimate_saturates() {
        let mac = Macro::new("num 1", ["a", "b", "c"]).with_delay(Duration::MAX);
        assert_eq!(mac.estimated_time(false), Duration::MAX);
        let mac = Macro::new("num 1", ["a", "b", "c"])
            .with_delay(Duration::from_secs(u64::MAX / 2))
            .with_duration(Duration::ZERO);
        assert_eq!(mac.estimated_time(true), Duration::MAX);
    }

    #[test]
    fn test_label_and_normalization() {
        let mac = Macro::new("NUM 7", ["up"]);
        assert_eq!(mac.label(), "NUM 7");
        assert_eq!(mac.normalized().hotkey(), "num 7");
        assert_eq!(mac.with_name("Reinforce").label(), "Reinforce");
    }

    #[test]
    fn test_slots() {
        assert_eq!(Slot::new(0), None);
        assert_eq!(Slot::new(10), None);
        assert_eq!("7".parse::<Slot>().unwrap().number(), 7);
        assert!("x".parse::<Slot>().is_err());
        assert_eq!(Slot::GRID[0].default_hotkey(), "num 7");
    }
}
