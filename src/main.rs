//! Lightwave bridge - Main Entry Point
//!
//! The vendor transport is pluggable; this binary runs the bridge against the
//! in-memory backend seeded from the `[simulation]` section of the config.

use anyhow::Context;
use clap::{Parser, Subcommand};
use lightwave_bridge::{
    bridge::classify,
    client::{memory::InMemoryLightwave, LightwaveClient},
    config::{BridgeConfig, SimulationConfig},
    host::{
        memory::{InMemoryHost, DEFAULT_AGGREGATOR_VENDOR_ID},
        CanonicalDeviceId, CommandRequest, PlatformHandler,
    },
    logging::{init_logging, LogConfig},
    LightwavePlatform,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};

/// Lightwave bridge
#[derive(Parser, Debug)]
#[command(name = "lightwave-bridge")]
#[command(about = "Expose LightwaveRF lights as Matter bridged devices")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true, env = "LIGHTWAVE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the bridge and run until interrupted
    Run {
        /// Version the in-memory host reports
        #[arg(long, default_value = "3.3.0")]
        host_version: String,

        /// Vendor id the in-memory host announces bridged devices under
        #[arg(long, default_value_t = DEFAULT_AGGREGATOR_VENDOR_ID)]
        vendor_id: u16,

        /// Turn the register button on as soon as it appears
        #[arg(long)]
        auto_register: bool,
    },
    /// Connect to Lightwave and list the devices that would be bridged
    Devices {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    fn log_config(&self, config: &BridgeConfig) -> LogConfig {
        let mut log_config = LogConfig::from(&config.logging);
        let env = LogConfig::from_env();
        if env.file_path.is_some() {
            log_config.file_path = env.file_path;
        }
        log_config.stderr = env.stderr;
        if self.debug {
            log_config.level = Level::DEBUG;
        }
        log_config
    }
}

fn simulated_client(simulation: &SimulationConfig) -> InMemoryLightwave {
    let client = InMemoryLightwave::new()
        .with_devices(simulation.devices.clone())
        .with_registered(simulation.registered);
    match &simulation.version {
        Some(version) => client.with_version(version.clone()),
        None => client,
    }
}

async fn run(
    config: BridgeConfig,
    log_config: LogConfig,
    host_version: String,
    vendor_id: u16,
    auto_register: bool,
) -> anyhow::Result<()> {
    let log_handle = init_logging(log_config).context("Failed to initialize logging")?;

    info!("🚀 Starting Lightwave bridge v{}", env!("CARGO_PKG_VERSION"));

    let client = Arc::new(simulated_client(&config.simulation));
    let host = Arc::new(InMemoryHost::new(host_version).with_vendor_id(vendor_id));
    let platform = LightwavePlatform::new(config.platform.clone(), client, host.clone())
        .with_log_handle(log_handle);

    platform
        .on_start(Some("cli"))
        .await
        .context("Bridge failed to start")?;
    platform.on_configure().await?;

    if auto_register {
        if let Some(trigger) = platform.machine().trigger_id().await {
            info!("🔑 Pressing the register button");
            register(&host, &trigger).await;
        }
    }

    for device in host.devices().await {
        info!(
            device = %device.id,
            name = %device.identity.name,
            profile = ?device.profile,
            device_type = format!("{:#06x}", device.profile.device_type_id()),
            "Bridged device"
        );
    }

    info!("✅ Bridge running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    platform.on_shutdown(Some("interrupted")).await?;
    Ok(())
}

async fn register(host: &InMemoryHost, trigger: &CanonicalDeviceId) {
    if let Err(e) = host.invoke(trigger, CommandRequest::on()).await {
        warn!(error = %e, "Registration failed; the register button stays available");
    }
}

async fn list_devices(config: BridgeConfig, json: bool) -> anyhow::Result<()> {
    let client = simulated_client(&config.simulation);
    client
        .connect()
        .await
        .context("Failed to connect to Lightwave")?;
    let devices = client.get_devices().await?;

    if json {
        let listing: Vec<_> = devices
            .iter()
            .map(|device| {
                serde_json::json!({
                    "id": CanonicalDeviceId::from(device),
                    "name": device.display_name(),
                    "kind": classify(device),
                    "deviceType": classify(device).profile().device_type_id(),
                    "device": device,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    println!("{:<10} {:<8} {:<8} NAME", "ID", "KIND", "TYPE");
    for device in &devices {
        let kind = classify(device);
        println!(
            "{:<10} {:<8} {:<8} {}",
            CanonicalDeviceId::from(device).as_str(),
            format!("{kind:?}"),
            format!("{:#06x}", kind.profile().device_type_id()),
            device.display_name()
        );
    }
    println!("{} device(s)", devices.len());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config =
        BridgeConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match &cli.command {
        Command::Run {
            host_version,
            vendor_id,
            auto_register,
        } => {
            let log_config = cli.log_config(&config);
            run(
                config,
                log_config,
                host_version.clone(),
                *vendor_id,
                *auto_register,
            )
            .await
        }
        Command::Devices { json } => list_devices(config, *json).await,
    }
}
