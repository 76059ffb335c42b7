//! Default bindings and settings for a fresh profile.

use std::collections::BTreeMap;

pub use macro_engine::{DEFAULT_DELAY, DEFAULT_DURATION};

/// Global combination that asks the application to quit.
pub const EXIT_HOTKEY: &str = "ctrl+shift+q";

/// Key pressed before a macro to open the in-game stratagem panel.
pub const DEFAULT_PANEL_KEY: &str = "ctrl";
pub const DEFAULT_AUTO_PANEL: bool = false;

/// Key that toggles click-through on the progress overlay.
pub const DEFAULT_OVERLAY_LOCK_KEY: &str = "f8";
pub const DEFAULT_OVERLAY_OPACITY: f64 = 0.85;
pub const MIN_OVERLAY_OPACITY: f64 = 0.1;
pub const MAX_OVERLAY_OPACITY: f64 = 1.0;

pub const SAVES_DIR_NAME: &str = "saves";
pub const LAST_PROFILE_FILE: &str = ".last_profile";
/// Stratagem catalogue, relative to the base directory.
pub const DEFAULT_TEMPLATE_FILE: &str = "data/helldivers2_stratagem_codes.md";

/// Direction names used by templates, with the key each maps to by default.
pub const DIRECTION_KEYS: [(&str, &str); 4] = [
    ("Up", "up"),
    ("Down", "down"),
    ("Left", "left"),
    ("Right", "right"),
];

/// The default key for a template direction, if it is one of the four.
pub fn default_direction_key(direction: &str) -> Option<&'static str> {
    DIRECTION_KEYS
        .iter()
        .find(|(d, _)| *d == direction)
        .map(|(_, k)| *k)
}

pub fn default_direction_keys() -> BTreeMap<String, String> {
    DIRECTION_KEYS
        .iter()
        .map(|(d, k)| (d.to_string(), k.to_string()))
        .collect()
}
