use anyhow::Context;
use clap::Parser;
use tracing::Level;

use sentinel_renderer::app::SentinelApp;
use sentinel_renderer::channel::{LatestSlot, ModeListener};
use sentinel_renderer::config::{Cli, RendererConfig};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(log_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("Starting sentinel-renderer version {}", env!("CARGO_PKG_VERSION"));

    let mut config = RendererConfig::load(cli.config.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok());
    cli.apply(&mut config);
    config.validate()?;

    tracing::info!(
        mode = %config.initial_mode,
        intensity = config.initial_intensity,
        auto_cycle = config.auto_cycle,
        entries = config.field_entries,
        socket = %config.socket_path.display(),
        "configuration loaded"
    );

    let slot = LatestSlot::new();
    let listener = if config.auto_cycle {
        None
    } else {
        Some(
            ModeListener::spawn(config.listener_config(), slot.clone())
                .context("failed to start mode listener")?,
        )
    };

    let mut viewport = eframe::egui::ViewportBuilder::default()
        .with_title("Sentinel")
        .with_inner_size([960.0, 720.0]);
    if config.fullscreen {
        viewport = viewport.with_fullscreen(true);
    }
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    eframe::run_native(
        "Sentinel",
        options,
        Box::new(move |cc| Ok(Box::new(SentinelApp::new(cc, &config, slot, listener)))),
    )
    .map_err(|e| sentinel_renderer::error::SentinelError::Startup(e.to_string()))?;

    Ok(())
}
