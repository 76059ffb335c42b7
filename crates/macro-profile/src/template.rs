//! The stratagem catalogue.
//!
//! Templates live in a small markdown file:
//!
//! ```text
//! ## Offensive
//! - **Orbital Laser**: Right, Down, Up, Right, Down
//! - **Eagle Airstrike**: Up, Right, Down, Right
//! ```
//!
//! A `##` heading starts a category; each `- **Name**: ...` line adds a
//! template. Anything else is ignored.

use crate::defaults::{DEFAULT_DELAY, default_direction_key};
use crate::error::Result;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Category for entries that appear before any heading.
pub const DEFAULT_CATEGORY: &str = "Stratagems";
/// Category of the placeholder templates.
pub const PLACEHOLDER_CATEGORY: &str = "Misc";
const PLACEHOLDER_COUNT: usize = 12;

/// A named direction sequence, not yet bound to concrete keys.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroTemplate {
    pub name: String,
    /// Title-cased direction names, e.g. `"Up"`.
    pub directions: Vec<String>,
    pub delay: Duration,
    pub category: String,
}

impl MacroTemplate {
    pub fn new<I, S>(name: impl Into<String>, directions: I, category: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            directions: directions.into_iter().map(Into::into).collect(),
            delay: DEFAULT_DELAY,
            category: category.into(),
        }
    }

    /// Map each direction to a key: the user's binding, then the default
    /// binding, then the lowercased direction name itself.
    pub fn resolve_keys(&self, direction_keys: &BTreeMap<String, String>) -> Vec<String> {
        self.directions
            .iter()
            .map(|direction| {
                direction_keys
                    .get(direction)
                    .filter(|k| !k.is_empty())
                    .cloned()
                    .or_else(|| default_direction_key(direction).map(str::to_string))
                    .unwrap_or_else(|| direction.to_lowercase())
            })
            .collect()
    }
}

/// Parse the markdown catalogue. Malformed entries are skipped.
pub fn parse_templates(text: &str) -> Vec<MacroTemplate> {
    let mut templates = Vec::new();
    let mut category = DEFAULT_CATEGORY.to_string();
    for line in text.lines().map(str::trim) {
        if line.starts_with("##") {
            category = line.trim_start_matches('#').trim().to_string();
            continue;
        }
        if let Some(template) = parse_entry(line, &category) {
            templates.push(template);
        }
    }
    templates
}

fn parse_entry(line: &str, category: &str) -> Option<MacroTemplate> {
    if !line.starts_with("- **") {
        return None;
    }
    let (name, sequence) = line.split_once("**:")?;
    let name = name.replace("- **", "");
    let name = name.trim();
    let sequence = sequence.trim();
    if name.is_empty() || sequence.is_empty() {
        return None;
    }
    let directions: Vec<String> = sequence
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(title_case)
        .collect();
    if directions.is_empty() {
        return None;
    }
    Some(MacroTemplate::new(name, directions, category))
}

/// Uppercase the first letter of each word and lowercase the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

/// Twelve empty templates so the picker is never blank.
pub fn placeholder_templates() -> Vec<MacroTemplate> {
    (1..=PLACEHOLDER_COUNT)
        .map(|i| {
            MacroTemplate::new(
                format!("macro_Place_Holder_{i}"),
                Vec::<String>::new(),
                PLACEHOLDER_CATEGORY,
            )
        })
        .collect()
}

/// Load the catalogue at `path`, falling back to placeholders when the file
/// is missing, unreadable or has no entries.
pub fn load_templates(path: &Path) -> Vec<MacroTemplate> {
    let templates = match fs::read(path) {
        Ok(bytes) => parse_templates(&String::from_utf8_lossy(&bytes)),
        Err(e) => {
            warn!("cannot read templates from {}: {e}", path.display());
            Vec::new()
        }
    };
    if templates.is_empty() {
        debug!("no templates found, using placeholders");
        return placeholder_templates();
    }
    debug!(count = templates.len(), "templates loaded");
    templates
}

/// Render templates back to markdown, grouped by category in first-seen
/// order. Templates without directions are left out.
pub fn render_templates(templates: &[MacroTemplate]) -> String {
    let mut categories: Vec<&str> = Vec::new();
    for t in templates.iter().filter(|t| !t.directions.is_empty()) {
        if !categories.contains(&t.category.as_str()) {
            categories.push(&t.category);
        }
    }

    let mut out = String::new();
    for (i, category) in categories.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "## {category}");
        for t in templates
            .iter()
            .filter(|t| t.category == *category && !t.directions.is_empty())
        {
            let _ = writeln!(out, "- **{}**: {}", t.name, t.directions.join(", "));
        }
    }
    out
}

/// Write the catalogue to `path`, creating parent directories.
pub fn save_templates(path: &Path, templates: &[MacroTemplate]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, render_templates(templates))?;
    Ok(())
}

/// Find a template by exact name.
pub fn find_template<'a>(templates: &'a [MacroTemplate], name: &str) -> Option<&'a MacroTemplate> {
    templates.iter().find(|t| t.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CATALOGUE: &str = "\
# Helldivers 2 stratagem codes

- **Reinforce**: up, down, right, left, up

## Offensive
- **Orbital Laser**: Right, Down, Up, Right, Down
- **Broken entry
- **Empty**:
- **Eagle Airstrike**: UP , right,, down ,Right

## Defensive
- **Shield Generator Relay**: Down, Down, Left, Right, Left, Right
";

    #[test]
    fn test_parse_categories_and_entries() {
        let templates = parse_templates(CATALOGUE);
        let names: Vec<_> = templates.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Reinforce",
                "Orbital Laser",
                "Eagle Airstrike",
                "Shield Generator Relay"
            ]
        );
        assert_eq!(templates[0].category, DEFAULT_CATEGORY);
        assert_eq!(templates[0].directions, vec!["Up", "Down", "Right", "Left", "Up"]);
        assert_eq!(templates[1].category, "Offensive");
        assert_eq!(templates[2].directions, vec!["Up", "Right", "Down", "Right"]);
        assert_eq!(templates[3].category, "Defensive");
        assert_eq!(templates[3].delay, DEFAULT_DELAY);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("uP"), "Up");
        assert_eq!(title_case("left"), "Left");
        assert_eq!(title_case("page down"), "Page Down");
    }

    #[test]
    fn test_resolve_keys() {
        let template = MacroTemplate::new("x", ["Up", "Left", "Spin"], "Misc");
        let mut bindings = BTreeMap::new();
        bindings.insert("Up".to_string(), "w".to_string());
        bindings.insert("Left".to_string(), String::new());
        assert_eq!(template.resolve_keys(&bindings), vec!["w", "left", "spin"]);
    }

    #[test]
    fn test_missing_file_gives_placeholders() {
        let dir = TempDir::new().unwrap();
        let templates = load_templates(&dir.path().join("nope.md"));
        assert_eq!(templates.len(), 12);
        assert_eq!(templates[0].name, "macro_Place_Holder_1");
        assert_eq!(templates[11].name, "macro_Place_Holder_12");
        assert!(templates.iter().all(|t| t.category == PLACEHOLDER_CATEGORY));
        assert!(templates.iter().all(|t| t.directions.is_empty()));
    }

    #[test]
    fn test_file_without_entries_gives_placeholders() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("codes.md");
        fs::write(&path, "## Nothing here\n").unwrap();
        assert_eq!(load_templates(&path).len(), 12);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("codes.md");
        let templates = parse_templates(CATALOGUE);
        save_templates(&path, &templates).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("## Stratagems\n- **Reinforce**: Up, Down, Right, Left, Up\n"));
        assert!(text.contains("\n## Defensive\n"));
        assert_eq!(load_templates(&path), templates);
    }

    #[test]
    fn test_find_template() {
        let templates = parse_templates(CATALOGUE);
        assert!(find_template(&templates, "Orbital Laser").is_some());
        assert!(find_template(&templates, "orbital laser").is_none());
    }
}
