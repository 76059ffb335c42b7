use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use tao::event::Event;
use tao::event_loop::{ControlFlow, EventLoop};
use tokio::signal;
use tracing::{debug, error, info, trace};

use macro_engine::{GlobalHook, KeyEvent, KeyboardHook, MacroEngine, Progress, TracingSink};
use macro_profile::defaults::EXIT_HOTKEY;

use crate::Session;

/// How often the event loop checks for a shutdown request.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

fn log_progress(progress: &Progress) {
    let label = progress.mac().label();
    let slot = progress.slot().map_or_else(|| "-".to_string(), |s| s.to_string());
    match progress.total_time() {
        Some(total) => info!("[{slot}] {label} ({:.2}s)", total.as_secs_f64()),
        None => debug!("[{slot}] {label} finished"),
    }
}

/// Register the profile's macros and play them until the exit hotkey or
/// Ctrl+C.
///
/// The tao event loop must own the main thread on macOS; it never returns, so
/// all hooks are released inside it before it exits.
pub fn run(session: Session) -> Result<()> {
    let event_loop = EventLoop::new();

    let hook = Arc::new(GlobalHook::new().context("Failed to create keyboard hook")?);
    let engine = MacroEngine::new(hook.clone(), Arc::new(TracingSink));
    engine.set_auto_panel(session.state.auto_panel, session.state.panel_key.as_str());
    engine.set_progress_observer(Some(Arc::new(log_progress)));

    let macros = session.state.macros();
    if macros.is_empty() {
        info!("No slots assigned; use `stratagem assign <slot> <name>` first.");
    }
    engine.register(macros);
    info!(
        "Listening for numpad keys (7 8 9 / 4 5 6 / 1 2 3). Press {EXIT_HOTKEY} to quit."
    );

    let shutdown_requested = Arc::new(AtomicBool::new(false));

    let exit_flag = shutdown_requested.clone();
    let exit_hook = hook
        .on_key_down(
            EXIT_HOTKEY,
            Arc::new(move |_: &KeyEvent| {
                info!("Exit hotkey pressed");
                exit_flag.store(true, Ordering::SeqCst);
            }),
        )
        .context("Failed to register exit hotkey")?;

    let ctrlc_flag = shutdown_requested.clone();
    thread::Builder::new()
        .name("ctrl-c".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    error!("Failed to create tokio runtime: {}", e);
                    return;
                }
            };
            runtime.block_on(async {
                match signal::ctrl_c().await {
                    Ok(()) => {
                        info!("Received Ctrl+C, shutting down...");
                        ctrlc_flag.store(true, Ordering::SeqCst);
                    }
                    Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
                }
            });
        })
        .context("Failed to spawn Ctrl+C listener")?;

    debug!("Starting tao event loop");
    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::WaitUntil(Instant::now() + SHUTDOWN_POLL);

        if shutdown_requested.load(Ordering::SeqCst) {
            info!("Shutting down...");
            engine.shutdown();
            if let Err(e) = hook.unhook(exit_hook) {
                debug!("Failed to release exit hotkey: {e}");
            }
            *control_flow = ControlFlow::Exit;
            return;
        }

        match event {
            Event::NewEvents(_) | Event::MainEventsCleared | Event::RedrawEventsCleared => {}
            Event::LoopDestroyed => {
                debug!("Event loop destroyed");
            }
            _ => {
                trace!("Event loop received: {:?}", event);
            }
        }
    });
}
