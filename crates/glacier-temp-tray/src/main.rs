//! Glacier Temp tray applet.
//!
//! Polls CPU temperature once per second and mirrors it onto the system
//! tray and onto Husky Glacier pump displays over USB HID.

mod config;
mod glyphs;
mod icon;
mod sampler;
mod scheduler;
mod startup;
mod tray;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use glacier_temp_hw::{DeviceSet, HidConnector};

use config::Config;
use sampler::CpuTempSampler;
use scheduler::TickContext;
use tray::{create_tray, TrayCommand, TrayHandle};

/// Mirrors CPU temperature to the tray and Glacier pump displays.
#[derive(Parser, Debug)]
#[command(name = "glacier-temp-tray", version, about)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip the pump stage; only the tray icon is updated.
    #[arg(long)]
    display_only: bool,

    /// List discovered hwmon temperature channels and exit.
    #[arg(long)]
    list_sensors: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path).context("Failed to load configuration")?,
        None => Config::default(),
    };
    if args.display_only {
        config.display_only = true;
    }

    if args.list_sensors {
        return list_sensors(&config);
    }

    startup::ensure_privileges(config.startup.allow_unprivileged)?;
    let _instance = startup::acquire_instance_lock(&config.startup.pidfile)?;

    let rules = config.sensor.effective_rules();
    let sampler = CpuTempSampler::new(Path::new(sampler::HWMON_ROOT), &rules);

    let devices = if config.display_only {
        info!("display-only mode, pump stage disabled");
        None
    } else {
        let connector = HidConnector::new().context("Failed to initialize HID backend")?;
        let models = config.pump.resolve_models()?;
        Some(DeviceSet::new(connector, models))
    };

    let mut ctx = TickContext::new(sampler, devices);

    // ksni owns its own main loop, so the tray runs on a dedicated thread;
    // all updates flow through the handle.
    let (service, handle, mut commands) = create_tray();
    std::thread::spawn(move || {
        if let Err(e) = service.run() {
            error!("Tray service failed: {e}");
        }
    });
    let mut surface = TrayHandle::new(handle);

    let tick = Duration::from_millis(config.effective_tick_ms());
    info!("polling every {:?}", tick);
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                ctx.run_tick(&mut surface);
            }
            cmd = commands.recv() => {
                match cmd {
                    Some(TrayCommand::Quit) | None => {
                        info!("quit requested from tray");
                        break;
                    }
                }
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down");
                break;
            }
        }
    }

    // The timer stopped with the loop; now sessions, then the icon.
    drop(ticker);
    ctx.shutdown();

    Ok(())
}

/// Diagnostic listing of every hwmon temperature channel, marking the one
/// the configured rules select.
fn list_sensors(config: &Config) -> Result<()> {
    let rules = config.sensor.effective_rules();
    let channels = sampler::scan_channels(Path::new(sampler::HWMON_ROOT));
    let selected = sampler::select_channel(&channels, &rules).map(|c| c.input.clone());

    if channels.is_empty() {
        println!("no hwmon temperature channels found");
        return Ok(());
    }

    for c in &channels {
        let marker = if selected.as_ref() == Some(&c.input) {
            "->"
        } else {
            "  "
        };
        let temp = sampler::read_millidegrees(&c.input)
            .map(|t| format!("{t:.1} C"))
            .unwrap_or_else(|_| "n/a".to_string());
        println!("{marker} {:<12} {:<16} {temp}", c.chip, c.label);
    }

    Ok(())
}
