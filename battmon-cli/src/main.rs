/*!
 * BATTMON Bluetooth Battery Monitor
 * Connection status and battery charge of paired audio accessories
 * Onyx Digital Intelligence Development LLC
 */

use anyhow::Result;
use battmon_core::{BluetoothManager, DeviceQuery, MonitorConfig, PowerShellQuery};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;

mod report;

#[derive(Parser)]
#[command(name = "battmon")]
#[command(about = "Bluetooth audio accessory battery monitor")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, default_value = "battmon.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Keep refreshing and print devices whenever they change
    Watch {
        /// Exit once every device is disconnected
        #[arg(long)]
        until_disconnected: bool,
    },
    /// Refresh once and print the result
    Status {
        /// Print devices as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("battmon={0},battmon_core={0}", log_level))
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config = MonitorConfig::load(&cli.config)?;
    let query: Arc<dyn DeviceQuery> = Arc::new(PowerShellQuery::new(&config.powershell.program));

    match cli.command.unwrap_or(Commands::Watch {
        until_disconnected: false,
    }) {
        Commands::Watch { until_disconnected } => watch(query, config, until_disconnected).await,
        Commands::Status { json } => status(query, config, json).await,
    }
}

async fn watch(
    query: Arc<dyn DeviceQuery>,
    config: MonitorConfig,
    until_disconnected: bool,
) -> Result<()> {
    info!("Starting Bluetooth battery monitor...");

    let config = MonitorConfig {
        auto_refresh: true,
        ..config
    };
    let manager = BluetoothManager::new(query, &config).await?;

    let devices = manager.devices().await;
    println!("Found {} bluetooth devices:", devices.len());
    for device in &devices {
        println!(
            "> {} - {} - {}",
            device.name(),
            device.is_connected(),
            device.instance_id()
        );
    }

    let mut states = manager.subscribe();
    let mut current = states.borrow_and_update().clone();
    report::print_states(&current);

    loop {
        if until_disconnected && current.iter().all(|state| !state.connected) {
            info!("All devices are disconnected");
            break;
        }

        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                current = states.borrow_and_update().clone();
                println!("Bluetooth devices have changed:");
                report::print_states(&current);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    manager.stop_auto_refresh().await?;
    Ok(())
}

async fn status(query: Arc<dyn DeviceQuery>, config: MonitorConfig, json: bool) -> Result<()> {
    let config = MonitorConfig {
        auto_refresh: false,
        ..config
    };
    let manager = BluetoothManager::new(query, &config).await?;
    let devices = manager.devices().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
    } else {
        report::print_states(&devices.states());
    }
    Ok(())
}
