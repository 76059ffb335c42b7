use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use macro_engine::{GlobalHook, Key, KeyboardHook, Slot};
use macro_profile::{AppState, MacroTemplate, Paths, load_templates, parse_slot};

mod run;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "stratagem")]
#[command(about = "Numpad stratagem macros", long_about = None)]
struct Args {
    /// Profile JSON to use instead of the last one opened
    #[arg(short, long, global = true)]
    profile: Option<PathBuf>,

    /// Stratagem catalogue (markdown)
    #[arg(short, long, global = true)]
    templates: Option<PathBuf>,

    /// Set the log level
    #[arg(short, long, value_enum, default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Listen for numpad hotkeys and play the assigned stratagems
    Run,
    /// Show slot assignments, bindings and the stratagem catalogue
    List,
    /// Put a stratagem on a slot, or clear the slot with "none"
    Assign {
        /// Slot number, 1-9
        slot: String,
        /// Stratagem name as listed, or "none"
        template: String,
    },
    /// Capture the next key press as a slot hotkey, direction key or panel key
    #[command(group(ArgGroup::new("target").required(true).args(["slot", "direction", "panel"])))]
    Bind {
        /// Slot number, 1-9
        slot: Option<String>,
        /// Direction to rebind: Up, Down, Left or Right
        #[arg(long)]
        direction: Option<String>,
        /// Rebind the key that opens the stratagem panel
        #[arg(long)]
        panel: bool,
    },
    /// Change timing and the auto panel switch
    Set {
        /// Gap between key presses, in milliseconds
        #[arg(long)]
        delay_ms: Option<f64>,
        /// How long each key is held, in milliseconds
        #[arg(long)]
        duration_ms: Option<f64>,
        /// Press the panel key before every stratagem
        #[arg(long)]
        auto_panel: Option<bool>,
    },
}

/// What `bind` stores the captured key as.
enum BindTarget {
    Slot(Slot),
    Direction(String),
    Panel,
}

/// Templates, state and where the state came from.
pub(crate) struct Session {
    pub paths: Paths,
    pub templates: Vec<MacroTemplate>,
    pub state: AppState,
    pub profile: Option<PathBuf>,
}

impl Session {
    fn load(args: &Args) -> Result<Self> {
        let paths = Paths::discover();
        debug!("base directory: {}", paths.base().display());

        let template_file = args
            .templates
            .clone()
            .unwrap_or_else(|| paths.template_file());
        let templates = load_templates(&template_file);

        let mut state = AppState::new();
        let profile = match &args.profile {
            Some(path) => {
                let missing = state
                    .load(path, &templates)
                    .with_context(|| format!("Failed to load profile: {}", path.display()))?;
                report_missing(&missing);
                Some(path.clone())
            }
            None => match paths.last_profile() {
                Some(path) => match state.load(&path, &templates) {
                    Ok(missing) => {
                        report_missing(&missing);
                        Some(path)
                    }
                    Err(e) => {
                        warn!("Ignoring last profile {}: {e}", path.display());
                        state.reset();
                        None
                    }
                },
                None => None,
            },
        };
        if let Some(path) = &profile {
            info!("Using profile {}", path.display());
        }

        Ok(Self {
            paths,
            templates,
            state,
            profile,
        })
    }

    /// The profile to write to: the loaded one, else a default in `saves/`.
    fn save_path(&self) -> Result<PathBuf> {
        match &self.profile {
            Some(path) => Ok(path.clone()),
            None => Ok(self.paths.saves_dir()?.join("profile.json")),
        }
    }

    /// Save the state and remember it as the last profile.
    fn commit(&mut self) -> Result<PathBuf> {
        let path = self.save_path()?;
        self.state
            .save(&path)
            .with_context(|| format!("Failed to save profile: {}", path.display()))?;
        if let Err(e) = self.paths.record_last_profile(&path) {
            warn!("Cannot record last profile: {e}");
        }
        self.profile = Some(path.clone());
        Ok(path)
    }
}

fn report_missing(missing: &[String]) {
    if !missing.is_empty() {
        warn!("These macros were not found: {}", missing.join(", "));
    }
}

fn init_tracing(level: LogLevel) -> Result<()> {
    let level = level.as_str();
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .without_time()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .with(
            EnvFilter::from_default_env()
                .add_directive(format!("macro_engine={level}").parse()?)
                .add_directive(format!("macro_profile={level}").parse()?)
                .add_directive(format!("stratagem={level}").parse()?),
        )
        .init();
    Ok(())
}

fn list(session: &Session) {
    let state = &session.state;
    println!("Slots:");
    for slot in Slot::GRID {
        let hotkey = state.slot_hotkeys.get(&slot).map_or("", String::as_str);
        let name = state
            .assignments
            .get(&slot)
            .and_then(Option::as_ref)
            .map_or("Unassigned", |t| t.name.as_str());
        println!("  {slot}  {hotkey:<12} {name}");
    }

    println!("\nDirections:");
    for (direction, key) in &state.direction_keys {
        println!("  {direction:<6} {key}");
    }
    println!(
        "\nPanel key: {} (auto {})",
        state.panel_key,
        if state.auto_panel { "on" } else { "off" }
    );
    println!(
        "Delay: {:.0} ms, duration: {:.0} ms",
        state.delay.as_secs_f64() * 1000.0,
        state.duration.as_secs_f64() * 1000.0
    );

    let mut categories: Vec<&str> = Vec::new();
    for t in &session.templates {
        if !categories.contains(&t.category.as_str()) {
            categories.push(&t.category);
        }
    }
    for category in categories {
        println!("\n{category}:");
        for t in session.templates.iter().filter(|t| t.category == category) {
            println!("  {:<32} {}", t.name, t.directions.join(", "));
        }
    }
}

fn assign(mut session: Session, slot: &str, template: &str) -> Result<()> {
    let slot = parse_slot(slot)?;
    let name = (!template.trim().eq_ignore_ascii_case("none")).then_some(template.trim());
    session.state.assign(slot, name, &session.templates)?;
    let path = session.commit()?;
    match name {
        Some(name) => println!("Slot {slot} now plays {name} (saved to {}).", path.display()),
        None => println!("Slot {slot} cleared (saved to {}).", path.display()),
    }
    Ok(())
}

fn bind(mut session: Session, target: BindTarget) -> Result<()> {
    let hook = GlobalHook::new().context("Failed to create keyboard hook")?;

    match &target {
        BindTarget::Slot(slot) => println!("Press a key to bind to numpad {slot}..."),
        BindTarget::Direction(direction) => {
            println!("Press a key to bind to {direction} direction...")
        }
        BindTarget::Panel => println!("Press a key to open the Stratagem Panel..."),
    }
    let captured = hook.read_key().context("Failed to capture key")?;
    let key = Key::parse(&captured).context("Captured key cannot be used")?;
    let key = key.to_string();

    let what = match target {
        BindTarget::Slot(slot) => {
            session.state.set_slot_hotkey(slot, &key);
            format!("Slot {slot} now listens on '{key}'")
        }
        BindTarget::Direction(direction) => {
            session.state.set_direction_key(&direction, &key)?;
            format!("{direction} now presses '{key}'")
        }
        BindTarget::Panel => {
            session.state.set_panel_key(&key);
            format!("The panel now opens with '{key}'")
        }
    };
    let path = session.commit()?;
    println!("{what} (saved to {}).", path.display());
    Ok(())
}

fn set(
    mut session: Session,
    delay_ms: Option<f64>,
    duration_ms: Option<f64>,
    auto_panel: Option<bool>,
) -> Result<()> {
    if delay_ms.is_none() && duration_ms.is_none() && auto_panel.is_none() {
        bail!("Nothing to set; pass --delay-ms, --duration-ms or --auto-panel");
    }
    session.state.set_timing_ms(delay_ms, duration_ms)?;
    if let Some(enabled) = auto_panel {
        session.state.set_auto_panel(enabled);
    }
    let path = session.commit()?;
    println!("Settings saved to {}.", path.display());
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_level)?;

    let session = Session::load(&args)?;
    match &args.command {
        None | Some(Command::Run) => run::run(session),
        Some(Command::List) => {
            list(&session);
            Ok(())
        }
        Some(Command::Assign { slot, template }) => assign(session, slot, template),
        Some(Command::Bind {
            slot,
            direction,
            panel,
        }) => {
            let target = match (slot, direction, panel) {
                (Some(slot), _, _) => BindTarget::Slot(parse_slot(slot)?),
                (None, Some(direction), _) => BindTarget::Direction(direction.clone()),
                (None, None, true) => BindTarget::Panel,
                (None, None, false) => bail!("Nothing to bind"),
            };
            bind(session, target)
        }
        Some(Command::Set {
            delay_ms,
            duration_ms,
            auto_panel,
        }) => set(session, *delay_ms, *duration_ms, *auto_panel),
    }
}
