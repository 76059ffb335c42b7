//! Slot assignments and settings, and their JSON profile form.

use crate::defaults::{
    DEFAULT_AUTO_PANEL, DEFAULT_DELAY, DEFAULT_DURATION, DEFAULT_OVERLAY_LOCK_KEY,
    DEFAULT_OVERLAY_OPACITY, DEFAULT_PANEL_KEY, DIRECTION_KEYS, MAX_OVERLAY_OPACITY,
    MIN_OVERLAY_OPACITY, default_direction_keys,
};
use crate::error::{Error, Result};
use crate::template::{MacroTemplate, find_template};
use macro_engine::{Macro, Slot};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    /// Seconds between key presses.
    pub delay: f64,
    /// Seconds each key is held.
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelSettings {
    pub key: String,
    pub auto: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlaySettings {
    pub lock_key: String,
    pub opacity: f64,
}

/// The on-disk profile document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Slot → assigned template name.
    pub slots: BTreeMap<Slot, Option<String>>,
    pub hotkeys: BTreeMap<Slot, String>,
    /// Direction name → key.
    pub direction_keys: BTreeMap<String, String>,
    pub timing: Timing,
    pub panel: PanelSettings,
    pub overlay: OverlaySettings,
}

/// Everything the user configures.
#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub assignments: BTreeMap<Slot, Option<MacroTemplate>>,
    pub slot_hotkeys: BTreeMap<Slot, String>,
    pub direction_keys: BTreeMap<String, String>,
    /// Always trimmed and lowercase.
    pub panel_key: String,
    pub auto_panel: bool,
    pub overlay_lock_key: String,
    pub overlay_opacity: f64,
    pub delay: Duration,
    pub duration: Duration,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            assignments: Slot::GRID.iter().map(|s| (*s, None)).collect(),
            slot_hotkeys: Slot::GRID.iter().map(|s| (*s, s.default_hotkey())).collect(),
            direction_keys: default_direction_keys(),
            panel_key: DEFAULT_PANEL_KEY.to_string(),
            auto_panel: DEFAULT_AUTO_PANEL,
            overlay_lock_key: DEFAULT_OVERLAY_LOCK_KEY.to_string(),
            overlay_opacity: DEFAULT_OVERLAY_OPACITY,
            delay: DEFAULT_DELAY,
            duration: DEFAULT_DURATION,
        }
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to a blank profile.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// The current state in profile form.
    pub fn serialize(&self) -> Profile {
        Profile {
            slots: self
                .assignments
                .iter()
                .map(|(slot, t)| (*slot, t.as_ref().map(|t| t.name.clone())))
                .collect(),
            hotkeys: self.slot_hotkeys.clone(),
            direction_keys: self.direction_keys.clone(),
            timing: Timing {
                delay: self.delay.as_secs_f64(),
                duration: self.duration.as_secs_f64(),
            },
            panel: PanelSettings {
                key: self.panel_key.clone(),
                auto: self.auto_panel,
            },
            overlay: OverlaySettings {
                lock_key: self.overlay_lock_key.clone(),
                opacity: self.overlay_opacity,
            },
        }
    }

    /// Load settings from a profile document, tolerating missing or
    /// ill-typed fields. Returns the assigned template names that were not
    /// found in `templates`; those slots are left empty.
    pub fn apply_profile(&mut self, data: &Value, templates: &[MacroTemplate]) -> Vec<String> {
        let empty = Map::new();
        let mut missing = Vec::new();

        let slots = data.get("slots").and_then(Value::as_object).unwrap_or(&empty);
        for slot in Slot::GRID {
            let assigned = match slots.get(&slot.to_string()) {
                None | Some(Value::Null) => None,
                Some(Value::String(name)) => {
                    let found = find_template(templates, name).cloned();
                    if found.is_none() {
                        missing.push(name.clone());
                    }
                    found
                }
                Some(other) => {
                    missing.push(other.to_string());
                    None
                }
            };
            self.assignments.insert(slot, assigned);
        }

        if let Some(hotkeys) = data.get("hotkeys").and_then(Value::as_object) {
            for slot in Slot::GRID {
                let hotkey = non_empty_str(hotkeys.get(&slot.to_string()))
                    .map_or_else(|| slot.default_hotkey(), str::to_string);
                self.slot_hotkeys.insert(slot, hotkey);
            }
        }

        if let Some(bindings) = data.get("direction_keys").and_then(Value::as_object) {
            for (direction, default) in DIRECTION_KEYS {
                let key = non_empty_str(bindings.get(direction)).unwrap_or(default);
                self.direction_keys.insert(direction.to_string(), key.to_string());
            }
        }

        if let Some(timing) = data.get("timing").and_then(Value::as_object) {
            let delay = timing.get("delay").map_or(Some(self.delay), seconds);
            let duration = timing.get("duration").map_or(Some(self.duration), seconds);
            if let (Some(delay), Some(duration)) = (delay, duration) {
                self.delay = delay;
                self.duration = duration;
            }
        }

        match data.get("panel").and_then(Value::as_object) {
            Some(panel) => {
                self.panel_key = non_empty_str(panel.get("key"))
                    .map_or_else(|| DEFAULT_PANEL_KEY.to_string(), str::to_lowercase);
                self.auto_panel = panel
                    .get("auto")
                    .and_then(Value::as_bool)
                    .unwrap_or(DEFAULT_AUTO_PANEL);
            }
            None => {
                self.panel_key = DEFAULT_PANEL_KEY.to_string();
                self.auto_panel = DEFAULT_AUTO_PANEL;
            }
        }

        match data.get("overlay").and_then(Value::as_object) {
            Some(overlay) => {
                if let Some(lock_key) = non_empty_str(overlay.get("lock_key")) {
                    self.overlay_lock_key = lock_key.to_string();
                }
                self.overlay_opacity = match overlay.get("opacity") {
                    None => self.overlay_opacity,
                    Some(v) => number(v)
                        .filter(|o| o.is_finite())
                        .map_or(DEFAULT_OVERLAY_OPACITY, |o| {
                            o.clamp(MIN_OVERLAY_OPACITY, MAX_OVERLAY_OPACITY)
                        }),
                };
            }
            None => {
                self.overlay_lock_key = DEFAULT_OVERLAY_LOCK_KEY.to_string();
                self.overlay_opacity = DEFAULT_OVERLAY_OPACITY;
            }
        }

        if !missing.is_empty() {
            info!("profile names unknown macros: {}", missing.join(", "));
        }
        missing
    }

    /// Assign the template called `name` to `slot`, or clear it with `None`.
    pub fn assign(&mut self, slot: Slot, name: Option<&str>, templates: &[MacroTemplate]) -> Result<()> {
        let template = match name {
            Some(name) => Some(
                find_template(templates, name)
                    .cloned()
                    .ok_or_else(|| Error::UnknownTemplate(name.to_string()))?,
            ),
            None => None,
        };
        self.assignments.insert(slot, template);
        Ok(())
    }

    /// Set the hotkey `slot` listens on.
    pub fn set_slot_hotkey(&mut self, slot: Slot, hotkey: &str) {
        self.slot_hotkeys.insert(slot, hotkey.trim().to_string());
    }

    /// Set the key pressed before each macro when auto panel is on.
    pub fn set_panel_key(&mut self, key: &str) {
        self.panel_key = key.trim().to_lowercase();
    }

    pub fn set_auto_panel(&mut self, enabled: bool) {
        self.auto_panel = enabled;
    }

    /// Bind one of the four template directions (any case) to `key`.
    pub fn set_direction_key(&mut self, direction: &str, key: &str) -> Result<()> {
        let (direction, _) = DIRECTION_KEYS
            .iter()
            .find(|(d, _)| d.eq_ignore_ascii_case(direction.trim()))
            .ok_or_else(|| Error::UnknownDirection(direction.to_string()))?;
        self.direction_keys
            .insert(direction.to_string(), key.trim().to_lowercase());
        Ok(())
    }

    /// Set the delay and hold time in milliseconds. `None` keeps the current
    /// value. Nothing changes unless both values are valid.
    pub fn set_timing_ms(&mut self, delay: Option<f64>, duration: Option<f64>) -> Result<()> {
        let parse = |ms: Option<f64>, current: Duration| match ms {
            None => Ok(current),
            Some(ms) => from_secs(ms / 1000.0).ok_or(Error::InvalidTiming(ms)),
        };
        let delay = parse(delay, self.delay)?;
        let duration = parse(duration, self.duration)?;
        self.delay = delay;
        self.duration = duration;
        Ok(())
    }

    /// The macros to register: every assigned slot with a hotkey, in grid order.
    pub fn macros(&self) -> Vec<(Slot, Macro)> {
        Slot::GRID
            .iter()
            .filter_map(|slot| {
                let template = self.assignments.get(slot)?.as_ref()?;
                let hotkey = self.slot_hotkeys.get(slot).filter(|h| !h.is_empty())?;
                let mac = Macro::new(hotkey.as_str(), template.resolve_keys(&self.direction_keys))
                    .with_delay(self.delay)
                    .with_duration(self.duration)
                    .with_name(template.name.as_str());
                Some((*slot, mac))
            })
            .collect()
    }

    /// Apply the profile at `path`; see [`AppState::apply_profile`].
    pub fn load(&mut self, path: &Path, templates: &[MacroTemplate]) -> Result<Vec<String>> {
        let text = fs::read_to_string(path)?;
        let data: Value = serde_json::from_str(&text)?;
        debug!("applying profile {}", path.display());
        Ok(self.apply_profile(&data, templates))
    }

    /// Write the profile to `path` as indented JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(&self.serialize())?;
        fs::write(path, text)?;
        debug!("saved profile {}", path.display());
        Ok(())
    }
}

/// Parse a slot number given by the user.
pub fn parse_slot(s: &str) -> Result<Slot> {
    s.parse().map_err(|_| Error::InvalidSlot(s.to_string()))
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// A number, or a string holding one.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A non-negative, finite number of seconds, rounded to the nanosecond.
fn seconds(value: &Value) -> Option<Duration> {
    from_secs(number(value)?)
}

fn from_secs(secs: f64) -> Option<Duration> {
    let nanos = secs * 1e9;
    (nanos.is_finite() && nanos >= 0.0 && nanos < u64::MAX as f64)
        .then(|| Duration::from_nanos(nanos.round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::parse_templates;
    use serde_json::json;
    use tempfile::TempDir;

    fn templates() -> Vec<MacroTemplate> {
        parse_templates(
            "## Offensive\n\
             - **Orbital Laser**: Right, Down, Up, Right, Down\n\
             - **Eagle Airstrike**: Up, Right, Down, Right\n",
        )
    }

    fn slot(n: u8) -> Slot {
        Slot::new(n).unwrap()
    }

    #[test]
    fn test_defaults() {
        let state = AppState::new();
        assert_eq!(state.assignments.len(), 9);
        assert_eq!(state.slot_hotkeys[&slot(7)], "num 7");
        assert_eq!(state.direction_keys["Left"], "left");
        assert_eq!(state.panel_key, "ctrl");
        assert!(!state.auto_panel);
        assert_eq!(state.delay, Duration::from_millis(50));
        assert!(state.macros().is_empty());
    }

    #[test]
    fn test_serialize_shape() {
        let mut state = AppState::new();
        state.assign(slot(7), Some("Orbital Laser"), &templates()).unwrap();
        let value = serde_json::to_value(state.serialize()).unwrap();
        assert_eq!(value["slots"]["7"], json!("Orbital Laser"));
        assert_eq!(value["slots"]["1"], Value::Null);
        assert_eq!(value["hotkeys"]["9"], json!("num 9"));
        assert_eq!(value["direction_keys"]["Up"], json!("up"));
        assert_eq!(value["timing"], json!({"delay": 0.05, "duration": 0.05}));
        assert_eq!(value["panel"], json!({"key": "ctrl", "auto": false}));
        assert_eq!(value["overlay"], json!({"lock_key": "f8", "opacity": 0.85}));
    }

    #[test]
    fn test_apply_profile() {
        let mut state = AppState::new();
        let missing = state.apply_profile(
            &json!({
                "slots": {"7": "Orbital Laser", "8": "Gone", "9": null, "4": 3},
                "hotkeys": {"7": "  F1 ", "8": ""},
                "direction_keys": {"Up": "w", "Down": 5},
                "timing": {"delay": 0.1, "duration": "0.02"},
                "panel": {"key": "  LCTRL ", "auto": true},
                "overlay": {"lock_key": "f9", "opacity": 7}
            }),
            &templates(),
        );
        assert_eq!(missing, vec!["Gone".to_string(), "3".to_string()]);
        assert_eq!(
            state.assignments[&slot(7)].as_ref().map(|t| t.name.as_str()),
            Some("Orbital Laser")
        );
        assert_eq!(state.assignments[&slot(8)], None);
        assert_eq!(state.slot_hotkeys[&slot(7)], "F1");
        assert_eq!(state.slot_hotkeys[&slot(8)], "num 8");
        assert_eq!(state.direction_keys["Up"], "w");
        assert_eq!(state.direction_keys["Down"], "down");
        assert_eq!(state.delay, Duration::from_millis(100));
        assert_eq!(state.duration, Duration::from_millis(20));
        assert_eq!(state.panel_key, "lctrl");
        assert!(state.auto_panel);
        assert_eq!(state.overlay_lock_key, "f9");
        assert_eq!(state.overlay_opacity, 1.0);
    }

    #[test]
    fn test_apply_profile_rejects_negative_timing() {
        let mut state = AppState::new();
        state.apply_profile(&json!({"timing": {"delay": 0.2, "duration": -1}}), &[]);
        assert_eq!(state.delay, DEFAULT_DELAY);
        assert_eq!(state.duration, DEFAULT_DURATION);
    }

    #[test]
    fn test_apply_profile_missing_sections() {
        let mut state = AppState::new();
        state.panel_key = "h".into();
        state.overlay_opacity = 0.5;
        state.apply_profile(&json!({}), &[]);
        assert_eq!(state.panel_key, DEFAULT_PANEL_KEY);
        assert_eq!(state.overlay_opacity, DEFAULT_OVERLAY_OPACITY);

        state.apply_profile(&json!({"overlay": {"opacity": 0.01}}), &[]);
        assert_eq!(state.overlay_opacity, MIN_OVERLAY_OPACITY);
        state.apply_profile(&json!({"overlay": {"opacity": "thick"}}), &[]);
        assert_eq!(state.overlay_opacity, DEFAULT_OVERLAY_OPACITY);
    }

    #[test]
    fn test_macros_resolve_bindings() {
        let mut state = AppState::new();
        let templates = templates();
        state.assign(slot(4), Some("Eagle Airstrike"), &templates).unwrap();
        state.assign(slot(7), Some("Orbital Laser"), &templates).unwrap();
        state.set_slot_hotkey(slot(4), "");
        state.direction_keys.insert("Right".into(), "d".into());
        state.delay = Duration::from_millis(30);

        let macros = state.macros();
        assert_eq!(macros.len(), 1);
        let (s, mac) = &macros[0];
        assert_eq!(*s, slot(7));
        assert_eq!(mac.hotkey(), "num 7");
        assert_eq!(mac.keys(), ["d", "down", "up", "d", "down"].map(String::from));
        assert_eq!(mac.delay(), Duration::from_millis(30));
        assert_eq!(mac.name(), Some("Orbital Laser"));
    }

    #[test]
    fn test_assign_unknown_template() {
        let mut state = AppState::new();
        let err = state.assign(slot(1), Some("Nope"), &templates()).unwrap_err();
        assert!(matches!(err, Error::UnknownTemplate(ref n) if n == "Nope"));
        state.assign(slot(1), Some("Orbital Laser"), &templates()).unwrap();
        state.assign(slot(1), None, &templates()).unwrap();
        assert_eq!(state.assignments[&slot(1)], None);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("saves").join("profile.json");
        let templates = templates();

        let mut state = AppState::new();
        state.assign(slot(2), Some("Eagle Airstrike"), &templates).unwrap();
        state.set_panel_key(" H ");
        state.auto_panel = true;
        state.save(&path).unwrap();

        let mut loaded = AppState::new();
        let missing = loaded.load(&path, &templates).unwrap();
        assert!(missing.is_empty());
        assert_eq!(loaded, state);

        loaded.reset();
        assert_eq!(loaded, AppState::new());
    }

    #[test]
    fn test_load_bad_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(AppState::new().load(&path, &[]), Err(Error::Json(_))));
        assert!(matches!(
            AppState::new().load(&dir.path().join("absent.json"), &[]),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_parse_slot() {
        assert_eq!(parse_slot("5").unwrap(), slot(5));
        assert!(matches!(parse_slot("0"), Err(Error::InvalidSlot(_))));
        assert!(matches!(parse_slot("x"), Err(Error::InvalidSlot(_))));
    }

    #[test]
    fn test_set_direction_key() {
        let mut state = AppState::new();
        state.set_direction_key("up", " W ").unwrap();
        state.set_direction_key("LEFT", "a").unwrap();
        assert_eq!(state.direction_keys["Up"], "w");
        assert_eq!(state.direction_keys["Left"], "a");
        assert!(matches!(
            state.set_direction_key("Sideways", "x"),
            Err(Error::UnknownDirection(_))
        ));
        assert_eq!(state.direction_keys.len(), 4);

        state.assign(slot(7), Some("Eagle Airstrike"), &templates()).unwrap();
        let (_, mac) = &state.macros()[0];
        assert_eq!(mac.keys(), ["w", "right", "down", "right"]);
    }

    #[test]
    fn test_set_timing_ms() {
        let mut state = AppState::new();
        state.set_timing_ms(Some(120.0), None).unwrap();
        assert_eq!(state.delay, Duration::from_millis(120));
        assert_eq!(state.duration, Duration::from_millis(50));

        state.set_timing_ms(None, Some(0.5)).unwrap();
        assert_eq!(state.duration, Duration::from_micros(500));

        assert!(matches!(
            state.set_timing_ms(Some(10.0), Some(-1.0)),
            Err(Error::InvalidTiming(_))
        ));
        assert!(state.set_timing_ms(Some(f64::NAN), None).is_err());
        assert_eq!(state.delay, Duration::from_millis(120));
        assert_eq!(state.duration, Duration::from_micros(500));
    }

    #[test]
    fn test_panel_settings() {
        let mut state = AppState::new();
        state.set_panel_key("  H ");
        state.set_auto_panel(true);
        let value = serde_json::to_value(state.serialize()).unwrap();
        assert_eq!(value["panel"], json!({"key": "h", "auto": true}));
    }

    #[test]
    fn test_assign_then_clear() {
        let mut state = AppState::new();
        state.assign(slot(5), Some("Orbital Laser"), &templates()).unwrap();
        assert_eq!(state.macros().len(), 1);
        state.assign(slot(5), None, &templates()).unwrap();
        assert!(state.macros().is_empty());
    }
}
