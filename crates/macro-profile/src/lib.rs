//! Profiles for the stratagem macro engine.
//!
//! A profile assigns stratagem templates to the nine numpad slots and holds
//! the bindings that turn them into concrete [`macro_engine::Macro`]s.

pub mod defaults;
mod error;
mod paths;
mod profile;
mod template;

pub use error::{Error, Result};
pub use paths::Paths;
pub use profile::{AppState, OverlaySettings, PanelSettings, Profile, Timing, parse_slot};
pub use template::{
    DEFAULT_CATEGORY, MacroTemplate, PLACEHOLDER_CATEGORY, find_template, load_templates,
    parse_templates, placeholder_templates, render_templates, save_templates,
};
