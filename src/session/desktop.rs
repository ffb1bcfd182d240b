//! Desktop radio backend using btleplug
//!
//! Talks to Laird modules through their virtual serial port (VSP) GATT
//! service: data from the module arrives as notifications on one
//! characteristic and data to the module is written to another.

use std::sync::Arc;

use async_trait::async_trait;
use btleplug::api::{
    BDAddr, Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{RadioBackend, RadioEvent};
use crate::plugin::types::{normalize_address, Device};
use crate::plugin::PluginError;

/// Laird VSP service
pub const VSP_SERVICE_UUID: Uuid = Uuid::from_u128(0x569a1101_b87f_490c_92cb_11ba5ea5167c);
/// Module to host data (notify)
pub const VSP_RX_CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x569a2000_b87f_490c_92cb_11ba5ea5167c);
/// Host to module data (write)
pub const VSP_TX_CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x569a2001_b87f_490c_92cb_11ba5ea5167c);

/// Low energy device category
const DEVICE_TYPE_LE: i32 = 2;

struct Connection {
    address: String,
    peripheral: Peripheral,
    tx: Characteristic,
    notifications: JoinHandle<()>,
}

/// [`RadioBackend`] over the first local Bluetooth adapter
pub struct DesktopRadio {
    adapter: Adapter,
    events_tx: mpsc::UnboundedSender<RadioEvent>,
    scan_task: Mutex<Option<JoinHandle<()>>>,
    connection: Mutex<Option<Connection>>,
}

impl DesktopRadio {
    pub async fn new() -> Result<(Arc<Self>, mpsc::UnboundedReceiver<RadioEvent>), PluginError> {
        tracing::info!("Initializing desktop radio (btleplug)");

        let manager = Manager::new()
            .await
            .map_err(|e| PluginError::Platform(format!("Failed to create BLE manager: {}", e)))?;
        let adapter = manager
            .adapters()
            .await
            .map_err(|e| PluginError::Platform(format!("Failed to get adapters: {}", e)))?
            .into_iter()
            .next()
            .ok_or(PluginError::BluetoothDisabled)?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let radio = Arc::new(Self {
            adapter,
            events_tx,
            scan_task: Mutex::new(None),
            connection: Mutex::new(None),
        });
        Ok((radio, events_rx))
    }

    async fn find_peripheral(&self, address: &str) -> Result<Peripheral, PluginError> {
        let peripherals = self
            .adapter
            .peripherals()
            .await
            .map_err(|e| PluginError::Platform(format!("Failed to get peripherals: {}", e)))?;

        for peripheral in peripherals {
            if let Some(props) = peripheral.properties().await.ok().flatten() {
                let candidate = peripheral_address(&peripheral, props.address);
                if normalize_address(&candidate).ok().as_deref() == Some(address) {
                    return Ok(peripheral);
                }
            }
        }
        Err(PluginError::DeviceNotFound(address.to_string()))
    }
}

/// Address reported for a peripheral; platforms without MAC access expose an id instead
fn peripheral_address(peripheral: &Peripheral, address: BDAddr) -> String {
    if address == BDAddr::default() {
        peripheral.id().to_string()
    } else {
        address.to_string()
    }
}

async fn forward_discoveries(adapter: Adapter, events_tx: mpsc::UnboundedSender<RadioEvent>) {
    let mut events = match adapter.events().await {
        Ok(events) => events,
        Err(e) => {
            tracing::error!("Failed to subscribe to adapter events: {}", e);
            return;
        }
    };

    while let Some(event) = events.next().await {
        let id = match event {
            CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
            _ => continue,
        };
        let Ok(peripheral) = adapter.peripheral(&id).await else {
            continue;
        };
        let Some(props) = peripheral.properties().await.ok().flatten() else {
            continue;
        };

        let device = Device {
            name: props.local_name.unwrap_or_default(),
            device_type: DEVICE_TYPE_LE,
            address: peripheral_address(&peripheral, props.address),
            rssi: props.rssi.map(i32::from).unwrap_or_default(),
        };
        if events_tx.send(RadioEvent::DeviceFound { device }).is_err() {
            break;
        }
    }
}

async fn forward_notifications(peripheral: Peripheral, events_tx: mpsc::UnboundedSender<RadioEvent>) {
    let mut notifications = match peripheral.notifications().await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!("Failed to open notification stream: {}", e);
            return;
        }
    };

    while let Some(notification) = notifications.next().await {
        if notification.uuid != VSP_RX_CHARACTERISTIC_UUID {
            continue;
        }
        tracing::debug!("Received {} bytes via VSP", notification.value.len());
        let data = String::from_utf8_lossy(&notification.value).into_owned();
        if events_tx.send(RadioEvent::DataReceived { data }).is_err() {
            return;
        }
    }

    // Stream ends when the peripheral drops the link
    let _ = events_tx.send(RadioEvent::Disconnected);
}

#[async_trait]
impl RadioBackend for DesktopRadio {
    fn platform(&self) -> &str {
        "Desktop"
    }

    async fn is_enabled(&self) -> bool {
        self.adapter.adapter_info().await.is_ok()
    }

    async fn start_scan(&self) -> Result<(), PluginError> {
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| PluginError::Platform(format!("Failed to start scan: {}", e)))?;

        let mut scan_task = self.scan_task.lock();
        if scan_task.is_none() {
            *scan_task = Some(tokio::spawn(forward_discoveries(
                self.adapter.clone(),
                self.events_tx.clone(),
            )));
        }
        Ok(())
    }

    async fn stop_scan(&self) -> Result<(), PluginError> {
        if let Some(task) = self.scan_task.lock().take() {
            task.abort();
        }
        self.adapter
            .stop_scan()
            .await
            .map_err(|e| PluginError::Platform(format!("Failed to stop scan: {}", e)))
    }

    async fn connect(&self, address: &str) -> Result<(), PluginError> {
        let peripheral = self.find_peripheral(address).await?;

        peripheral
            .connect()
            .await
            .map_err(|e| PluginError::Platform(format!("Failed to connect: {}", e)))?;
        peripheral
            .discover_services()
            .await
            .map_err(|e| PluginError::Platform(format!("Failed to discover services: {}", e)))?;

        let service = peripheral
            .services()
            .into_iter()
            .find(|s| s.uuid == VSP_SERVICE_UUID)
            .ok_or_else(|| PluginError::Platform("Device does not expose the VSP service".to_string()))?;
        let find = |uuid: Uuid| {
            service
                .characteristics
                .iter()
                .find(|c| c.uuid == uuid)
                .cloned()
                .ok_or_else(|| PluginError::Platform(format!("Missing VSP characteristic {}", uuid)))
        };
        let rx = find(VSP_RX_CHARACTERISTIC_UUID)?;
        let tx = find(VSP_TX_CHARACTERISTIC_UUID)?;

        peripheral
            .subscribe(&rx)
            .await
            .map_err(|e| PluginError::Platform(format!("Failed to subscribe: {}", e)))?;

        let notifications = tokio::spawn(forward_notifications(peripheral.clone(), self.events_tx.clone()));
        tracing::info!("VSP session established with {}", address);

        let previous = self.connection.lock().replace(Connection {
            address: address.to_string(),
            peripheral,
            tx,
            notifications,
        });
        if let Some(previous) = previous {
            previous.notifications.abort();
        }
        Ok(())
    }

    async fn disconnect(&self, address: &str) -> Result<(), PluginError> {
        let connection = {
            let mut guard = self.connection.lock();
            match guard.as_ref() {
                Some(c) if c.address == address => guard.take(),
                _ => None,
            }
        };
        let Some(connection) = connection else {
            return Ok(());
        };

        connection.notifications.abort();
        connection
            .peripheral
            .disconnect()
            .await
            .map_err(|e| PluginError::Platform(format!("Failed to disconnect: {}", e)))
    }

    async fn write(&self, chunk: &[u8]) -> Result<(), PluginError> {
        // Clone out so the lock is not held across the write
        let (peripheral, tx) = {
            let guard = self.connection.lock();
            let connection = guard.as_ref().ok_or(PluginError::NoActiveConnection)?;
            (connection.peripheral.clone(), connection.tx.clone())
        };

        peripheral
            .write(&tx, chunk, WriteType::WithResponse)
            .await
            .map_err(|e| PluginError::Platform(format!("Write failed: {}", e)))
    }
}
