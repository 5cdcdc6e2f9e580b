//! # glps-demo
//!
//! Opens a few windows on the running Wayland compositor, draws a quad in
//! each on every frame and logs the input they receive.

use anyhow::{Context, Result};
use clap::Parser;
use glps::input::MouseButton;
use glps::{logging, GlpsConfig, WindowManager, WindowProperties, DEMO_QUAD};
use log::{debug, error, info};
use std::process::ExitCode;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("GIT_COMMIT"),
    "\nbuilt: ",
    env!("BUILD_DATE"),
    "\ntarget: ",
    env!("TARGET_TRIPLE"),
);

#[derive(Parser)]
#[command(name = "glps-demo")]
#[command(about = "Wayland/EGL windowing backend demo")]
#[command(version, long_version = LONG_VERSION)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Number of windows to open
    #[arg(short, long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..))]
    windows: u32,

    /// Log per-window frame rate once per second
    #[arg(long)]
    fps: bool,

    /// Window title (numbered per window)
    #[arg(short, long)]
    title: Option<String>,
}

fn load_config(cli: &Cli) -> Result<GlpsConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let config = GlpsConfig::load(path)
                .with_context(|| format!("Failed to load configuration from {}", path))?;
            info!("✅ Configuration loaded from: {}", path);
            config
        }
        None => GlpsConfig::default(),
    };

    if cli.fps {
        config.debug.enable_fps_counter = true;
    }
    if let Some(title) = &cli.title {
        config.window.default_title = title.clone();
    }
    Ok(config)
}

fn install_callbacks(manager: &mut WindowManager) {
    manager
        .callbacks()
        .on_keyboard_enter(|id| debug!("⌨️ Window {} focused", id))
        .on_keyboard_leave(|id| debug!("⌨️ Window {} lost focus", id))
        .on_keyboard_input(|id, key| {
            if key.pressed && !key.text.is_empty() {
                info!("⌨️ Window {}: {:?}", id, key.text);
            }
        })
        .on_mouse_enter(|id, x, y| debug!("🖱️ Pointer entered window {} at ({:.1}, {:.1})", id, x, y))
        .on_mouse_leave(|id| debug!("🖱️ Pointer left window {}", id))
        .on_mouse_click(|id, button, state| {
            info!("🖱️ Window {}: {:?} {:?}", id, MouseButton::from(button), state)
        })
        .on_mouse_scroll(|id, scroll| {
            info!("🖱️ Window {}: scroll {:?} by {:?}", id, scroll.axis, scroll.value)
        })
        .on_touch(|id, touch| debug!("🖐️ Window {}: touch {} {:?}", id, touch.id, touch.mask))
        .on_drag_and_drop(|id, payload| {
            info!(
                "📦 Window {}: dropped {} ({} bytes)",
                id,
                payload.mime_type,
                payload.data.len()
            )
        })
        .on_window_resize(|id, width, height| info!("📐 Window {} is now {}x{}", id, width, height))
        .on_window_close(|id| info!("🚪 Window {} closing", id))
        .on_window_frame_update(|_, canvas| canvas.draw_triangles(&DEMO_QUAD));
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let mut manager = WindowManager::connect(&config).context("Failed to start the Wayland backend")?;
    info!("🔤 Font: {}", manager.font_path());
    install_callbacks(&mut manager);

    let base = config.window.default_properties();
    for n in 0..cli.windows {
        let properties = WindowProperties::new(format!("{} {}", base.title, n + 1), base.width, base.height);
        manager
            .create_window(properties)
            .with_context(|| format!("Failed to create window {}", n + 1))?;
    }

    manager.run().context("Event loop failed")
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.debug);

    info!("🚀 Starting glps-demo");
    info!("📄 Version: {}", env!("CARGO_PKG_VERSION"));

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("❌ {:#}", err);
            ExitCode::FAILURE
        }
    }
}
