//! MQTT bridge for Creality 3D printers.
//!
//! Reads the printer's WebSocket telemetry, publishes normalized and derived
//! topics to MQTT and announces the printer through Home Assistant discovery.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use printsight_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
use printsight_common::init_tracing;

use mqtt_bridge_creality::admin::{fetch_device_info, run_cleanup};
use mqtt_bridge_creality::identity::printer_address_from_url;
use mqtt_bridge_creality::{ConfigOverrides, CrealityBridge, CrealityBridgeConfig, Session};

const DEFAULT_CONFIG: &str = "creality.json5";

#[derive(Parser, Debug)]
#[command(name = "mqtt-bridge-creality", version, about = "Creality printer to MQTT bridge")]
struct Cli {
    #[command(flatten)]
    bridge: BridgeArgs,

    #[command(flatten)]
    overrides: ConfigOverrides,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the bridge (default).
    Run,
    /// Remove every discovery entity of a device from the broker.
    Cleanup {
        /// Device id used in the discovery topics.
        #[arg(long)]
        device_id: String,
    },
    /// Print the identity reported by the printer and exit.
    DeviceInfo,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = CrealityBridgeConfig::load_or_default(&cli.bridge, DEFAULT_CONFIG)?;
    config.apply_overrides(&cli.overrides);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(cli.bridge, config).await,
        Command::Cleanup { device_id } => {
            config.validate_broker()?;
            init_tracing(&cli.bridge.logging_config(&config.logging))?;

            let stats = run_cleanup(&config, &device_id).await?;
            tracing::info!(
                sent = stats.sent,
                failed = stats.failed,
                dropped = stats.dropped,
                "Cleanup finished"
            );
            Ok(())
        }
        Command::DeviceInfo => {
            config.validate_source()?;
            init_tracing(&cli.bridge.logging_config(&config.logging))?;

            let identity = fetch_device_info(&config).await?;
            println!("Device ID:    {}", identity.id);
            println!("Device name:  {}", identity.name);
            println!("Model:        {}", identity.model);
            println!("Manufacturer: {}", identity.manufacturer());
            if let Some(url) = identity.camera_stream_url() {
                println!("Camera:       {}", url);
            }
            Ok(())
        }
    }
}

async fn run(args: BridgeArgs, config: CrealityBridgeConfig) -> Result<()> {
    config.validate()?;

    let topics = config.topics();
    let ws_url = config.creality.ws_url.trim().to_string();
    let session = Session::new(
        ws_url.as_str(),
        Duration::from_secs(config.creality.reconnect_delay_secs),
    );
    let device_name = config.device_name().map(str::to_string);

    let mut runner = BridgeRunner::new_with_args("creality", config, Some(&args)).await?;

    let bridge = Arc::new(
        CrealityBridge::new(runner.publisher(), session.handle(), topics.clone())
            .with_device_name(device_name)
            .with_printer_address(printer_address_from_url(&ws_url)),
    );

    runner.subscribe(topics.platform_status()).await?;
    runner.subscribe(topics.light_command()).await?;
    runner.announce_online().await;

    if let Some(mut inbound) = runner.take_inbound() {
        let bridge = bridge.clone();
        let shutdown = runner.shutdown_token();
        runner.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    message = inbound.recv() => match message {
                        Some(message) => bridge.handle_inbound(&message).await,
                        None => break,
                    },
                }
            }
        });
    }

    tracing::info!(url = %ws_url, base_topic = %topics.base(), "Starting printer session");

    let shutdown = runner.shutdown_token();
    runner.spawn_critical("printer-session", async move {
        session.run(bridge.as_ref(), shutdown).await
    });

    runner.run().await?;
    Ok(())
}
