//! Laird Bridge demonstration
//!
//! Binds the plugin, subscribes to its events and runs a short discovery.
//! With the `desktop` feature the local Bluetooth adapter is used; otherwise
//! the web fallback answers and every hardware call is rejected.

use std::time::Duration;

use anyhow::Context;
use laird_bridge::config::PluginConfig;
use laird_bridge::plugin::events::{EventKind, PluginEvent};
use laird_bridge::plugin::types::{ConnectOptions, DiscoveryOptions, SendDataOptions};
use laird_bridge::LairdBridge;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    laird_bridge::logging::init_logging(config.log_level.as_deref().or(Some("info")));

    info!("🚀 Starting Laird bridge demonstration...");

    let bridge = build_bridge(config).await?;
    let info = bridge.describe().context("No plugin implementation available")?;
    info!("✅ Bound {}", info);

    for kind in EventKind::ALL {
        bridge.add_listener(kind, |event| match event {
            PluginEvent::DeviceFound(device) => {
                info!("📡 {} {} ({} dBm)", device.address, device.name, device.rssi)
            }
            PluginEvent::DeviceRecvData(data) => info!("📥 {}", data.data),
            other => info!("🔔 {}", other.kind()),
        });
    }

    let reply = bridge.echo("ping").await?;
    info!("echo -> {}", reply);

    match bridge.start_discovering(DiscoveryOptions::default()).await {
        Ok(status) => info!("{}", status.status),
        Err(e) => {
            error!("❌ startDiscovering rejected: {} ({})", e, e.code());
            for result in [
                bridge.connect_to_device(ConnectOptions::new("AA:BB:CC:DD:EE:FF")).await,
                bridge.send_data_to_device(SendDataOptions::new("hello")).await,
            ] {
                if let Err(e) = result {
                    error!("❌ {} ({})", e, e.code());
                }
            }
            return Ok(());
        }
    }

    tokio::time::sleep(Duration::from_secs(10)).await;
    bridge.cancel_discovering().await?;

    info!("🎉 Laird bridge demonstration completed!");
    Ok(())
}

#[cfg(feature = "config-file")]
fn load_config() -> anyhow::Result<PluginConfig> {
    let path = std::env::args().nth(1);
    PluginConfig::load(path.as_deref()).context("Failed to load configuration")
}

#[cfg(not(feature = "config-file"))]
fn load_config() -> anyhow::Result<PluginConfig> {
    Ok(PluginConfig::default())
}

#[cfg(feature = "desktop")]
async fn build_bridge(config: PluginConfig) -> anyhow::Result<LairdBridge> {
    use laird_bridge::session::desktop::DesktopRadio;

    let (radio, radio_events) = DesktopRadio::new().await?;
    Ok(LairdBridge::builder().config(config).radio(radio, radio_events).build()?)
}

#[cfg(not(feature = "desktop"))]
async fn build_bridge(config: PluginConfig) -> anyhow::Result<LairdBridge> {
    Ok(LairdBridge::with_config(config)?)
}
