//! Serial session over a radio backend
//!
//! `SerialSession` implements the plugin contract when this crate owns the
//! contract state and a [`RadioBackend`] owns the radio: it keeps the table
//! of devices found in the current discovery session, the active connection,
//! the scan timers and the receive buffer, and turns radio events into
//! plugin events.

pub mod host;
pub mod rx_buffer;

#[cfg(feature = "desktop")]
pub mod desktop;

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::PluginConfig;
use crate::plugin::events::{ListenerRegistry, PluginEvent};
use crate::plugin::types::{
    normalize_address, ConnectOptions, Device, DeviceData, DiscoveryOptions, ScanResponse,
    SendDataOptions, StatusResponse,
};
use crate::plugin::{BluetoothPlugin, PluginError, PluginInfo};

use self::rx_buffer::RxBuffer;

pub use crate::plugin::status::{CONNECTED, DATA_SENT, DISCONNECTED, DISCOVERY_CANCELED, DISCOVERY_STARTED};

pub const LOCATION_PERMISSION_DENIED: &str = "Location permission was denied.";

const SCAN_ALREADY_RUNNING: &str = "The bluetooth adapter is already scanning for bluetooth devices.";
const SCAN_STARTED: &str = "The bluetooth adapter has started scanning for bluetooth devices.";
const SCAN_NOT_RUNNING: &str = "The bluetooth adapter is not scanning for bluetooth devices.";
const SCAN_STOPPED: &str = "The bluetooth adapter has stopped scanning for bluetooth devices.";

/// Events reported by a radio backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RadioEvent {
    /// An advertisement was received during a scan
    DeviceFound { device: Device },
    /// A chunk of data arrived from the connected device
    DataReceived { data: String },
    /// The connected device went away
    Disconnected,
    /// Adapter power or permission changed
    AdapterState {
        enabled: bool,
        #[serde(rename = "permissionGranted", default = "granted")]
        permission_granted: bool,
    },
    /// The radio ended the scan on its own
    ScanStopped,
}

fn granted() -> bool {
    true
}

/// Radio primitives provided by the platform
#[async_trait]
pub trait RadioBackend: Send + Sync {
    /// Platform name (e.g., "Android", "Desktop")
    fn platform(&self) -> &str;

    /// Whether the adapter is powered on
    async fn is_enabled(&self) -> bool;

    /// Whether the permissions needed for scanning were granted
    async fn has_scan_permission(&self) -> bool {
        true
    }

    async fn start_scan(&self) -> Result<(), PluginError>;

    async fn stop_scan(&self) -> Result<(), PluginError>;

    async fn connect(&self, address: &str) -> Result<(), PluginError>;

    async fn disconnect(&self, address: &str) -> Result<(), PluginError>;

    /// Write one chunk to the connected device
    async fn write(&self, chunk: &[u8]) -> Result<(), PluginError>;
}

#[derive(Default)]
struct SessionState {
    discovering: bool,
    /// Whether `discoveryStartEvent` went out for the current session
    announced: bool,
    /// Bumped on every discovery start so stale timers can tell they are stale
    generation: u64,
    devices: HashMap<String, Device>,
    connected: Option<String>,
    rx: RxBuffer,
    timeout_task: Option<JoinHandle<()>>,
    periodic_task: Option<JoinHandle<()>>,
}

impl SessionState {
    fn disarm_timers(&mut self, from_timeout: bool) {
        if let Some(task) = self.timeout_task.take() {
            // The timeout task must not abort itself mid-stop
            if !from_timeout {
                task.abort();
            }
        }
        if let Some(task) = self.periodic_task.take() {
            task.abort();
        }
    }
}

struct SessionInner {
    registration_name: String,
    backend: Arc<dyn RadioBackend>,
    events: ListenerRegistry,
    scan_timeout: Duration,
    scan_interval: Duration,
    write_chunk_size: usize,
    state: Mutex<SessionState>,
    /// Serializes radio scan start/stop and the discovery events they announce
    radio_lock: tokio::sync::Mutex<()>,
}

/// Contract implementation over a [`RadioBackend`]
pub struct SerialSession {
    inner: Arc<SessionInner>,
    pump: JoinHandle<()>,
}

impl SerialSession {
    /// Create the session and start consuming radio events
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        backend: Arc<dyn RadioBackend>,
        radio_events: mpsc::UnboundedReceiver<RadioEvent>,
        events: ListenerRegistry,
        config: &PluginConfig,
    ) -> Self {
        tracing::info!(
            "Starting serial session for {} on {}",
            config.registration_name,
            backend.platform()
        );

        let inner = Arc::new(SessionInner {
            registration_name: config.registration_name.clone(),
            backend,
            events,
            scan_timeout: config.scan_timeout(),
            scan_interval: config.scan_interval(),
            write_chunk_size: config.write_chunk_size.max(1),
            state: Mutex::new(SessionState::default()),
            radio_lock: tokio::sync::Mutex::new(()),
        });

        let pump = tokio::spawn(pump_radio_events(Arc::clone(&inner), radio_events));

        Self { inner, pump }
    }

    pub fn is_discovering(&self) -> bool {
        self.inner.state.lock().discovering
    }

    /// Address of the connected device
    pub fn connected_device(&self) -> Option<String> {
        self.inner.state.lock().connected.clone()
    }

    /// Devices found in the current discovery session
    pub fn discovered_devices(&self) -> Vec<Device> {
        self.inner.state.lock().devices.values().cloned().collect()
    }
}

impl Drop for SerialSession {
    fn drop(&mut self) {
        self.pump.abort();
        self.inner.state.lock().disarm_timers(false);
    }
}

async fn pump_radio_events(inner: Arc<SessionInner>, mut radio_events: mpsc::UnboundedReceiver<RadioEvent>) {
    while let Some(event) = radio_events.recv().await {
        inner.handle_radio_event(event).await;
    }
    tracing::debug!("Radio event stream closed for {}", inner.registration_name);
}

async fn scan_timeout(inner: Weak<SessionInner>, generation: u64, timeout: Duration) {
    tokio::time::sleep(timeout).await;
    if let Some(inner) = inner.upgrade() {
        tracing::info!("Stopping discovery after scan timeout of {:?}", timeout);
        inner.stop_discovery(Some(generation), true).await;
    }
}

async fn rescan_periodically(inner: Weak<SessionInner>, generation: u64, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let _radio = inner.radio_lock.lock().await;
        if !inner.is_current(generation) {
            break;
        }
        if let Err(e) = inner.backend.start_scan().await {
            tracing::warn!("Periodic rescan failed: {}", e);
        }
    }
}

impl SessionInner {
    fn is_current(&self, generation: u64) -> bool {
        let state = self.state.lock();
        state.discovering && state.generation == generation
    }

    /// Claim a new discovery session, start the radio scan and announce it
    ///
    /// Returns false when a session is already running or the new one was
    /// ended before the radio finished starting.
    async fn begin_discovery(self: &Arc<Self>, periodically: bool) -> Result<bool, PluginError> {
        if !self.backend.has_scan_permission().await {
            return Err(PluginError::PermissionDenied(LOCATION_PERMISSION_DENIED.to_string()));
        }
        if !self.backend.is_enabled().await {
            return Err(PluginError::BluetoothDisabled);
        }

        let _radio = self.radio_lock.lock().await;
        let generation = {
            let mut state = self.state.lock();
            if state.discovering {
                tracing::debug!("Could not start discovering bluetooth devices, already discovering");
                return Ok(false);
            }
            state.discovering = true;
            state.announced = false;
            state.generation += 1;
            state.devices.clear();
            state.generation
        };

        if let Err(e) = self.backend.start_scan().await {
            let mut state = self.state.lock();
            if state.generation == generation {
                state.discovering = false;
            }
            return Err(e);
        }

        if !self.arm_timers(generation, periodically) {
            tracing::debug!("Discovery ended while the radio was starting");
            return Ok(false);
        }
        self.events.notify(&PluginEvent::DiscoveryStart);
        Ok(true)
    }

    fn arm_timers(self: &Arc<Self>, generation: u64, periodically: bool) -> bool {
        let weak = Arc::downgrade(self);
        let mut state = self.state.lock();
        if !state.discovering || state.generation != generation {
            return false;
        }

        state.announced = true;
        state.timeout_task = Some(tokio::spawn(scan_timeout(weak.clone(), generation, self.scan_timeout)));
        if periodically {
            state.periodic_task = Some(tokio::spawn(rescan_periodically(
                weak,
                generation,
                self.scan_interval,
            )));
        }
        true
    }

    /// End the discovery session; returns false if none was running
    async fn stop_discovery(&self, generation: Option<u64>, from_timeout: bool) -> bool {
        let Some(announced) = self.finish_discovery(generation, from_timeout) else {
            return false;
        };

        let _radio = self.radio_lock.lock().await;
        // A session started since then owns the radio now
        let superseded = self.state.lock().discovering;
        if !superseded {
            if let Err(e) = self.backend.stop_scan().await {
                tracing::warn!("Failed to stop radio scan: {}", e);
            }
        }
        if announced {
            self.events.notify(&PluginEvent::DiscoveryStop);
        }
        true
    }

    /// Mark the session ended; yields whether its start was announced
    fn finish_discovery(&self, generation: Option<u64>, from_timeout: bool) -> Option<bool> {
        let mut state = self.state.lock();
        if !state.discovering || generation.is_some_and(|g| g != state.generation) {
            return None;
        }
        state.discovering = false;
        state.disarm_timers(from_timeout);
        Some(std::mem::take(&mut state.announced))
    }

    /// End the session on the radio's behalf; the radio is already stopped
    async fn end_discovery_from_radio(&self) {
        if let Some(announced) = self.finish_discovery(None, false) {
            let _radio = self.radio_lock.lock().await;
            if announced {
                self.events.notify(&PluginEvent::DiscoveryStop);
            }
        }
    }

    async fn handle_radio_event(&self, event: RadioEvent) {
        match event {
            RadioEvent::DeviceFound { device } => {
                let key = normalize_address(&device.address).unwrap_or_else(|_| device.address.clone());
                tracing::debug!("Device found: {} ({}) rssi {}", device.name, key, device.rssi);
                self.state.lock().devices.insert(key, device.clone());
                self.events.notify(&PluginEvent::DeviceFound(device));
            }
            RadioEvent::DataReceived { data } => {
                let records = self.state.lock().rx.push(&data);
                for data in records {
                    self.events.notify(&PluginEvent::DeviceRecvData(DeviceData { data }));
                }
            }
            RadioEvent::Disconnected => {
                let mut state = self.state.lock();
                if let Some(address) = state.connected.take() {
                    tracing::info!("Bluetooth device {} disconnected", address);
                }
                state.rx.clear();
            }
            RadioEvent::AdapterState { enabled, permission_granted } => {
                tracing::info!(
                    "Adapter state changed: enabled={} permission_granted={}",
                    enabled,
                    permission_granted
                );
                if !enabled {
                    {
                        let mut state = self.state.lock();
                        state.connected = None;
                        state.rx.clear();
                    }
                    self.end_discovery_from_radio().await;
                }
            }
            RadioEvent::ScanStopped => {
                tracing::debug!("Radio ended the scan");
                self.end_discovery_from_radio().await;
            }
        }
    }
}

#[async_trait]
impl BluetoothPlugin for SerialSession {
    async fn start_discovering(&self, options: DiscoveryOptions) -> Result<StatusResponse, PluginError> {
        tracing::debug!("Triggered method startDiscovering()");

        if self.inner.begin_discovery(options.periodically).await? {
            if options.periodically {
                tracing::info!("Started discovering of bluetooth devices periodically.");
            } else {
                tracing::info!("Started discovering of bluetooth devices.");
            }
        }

        Ok(StatusResponse::new(DISCOVERY_STARTED))
    }

    async fn cancel_discovering(&self) -> Result<StatusResponse, PluginError> {
        tracing::debug!("Triggered method cancelDiscovering()");

        if self.inner.stop_discovery(None, false).await {
            tracing::info!("Canceled discovering of bluetooth devices");
        } else {
            tracing::debug!("Could not cancel discovering bluetooth devices, not discovering");
        }
        Ok(StatusResponse::new(DISCOVERY_CANCELED))
    }

    async fn connect_to_device(&self, options: ConnectOptions) -> Result<StatusResponse, PluginError> {
        tracing::debug!("Triggered method connectToDevice()");

        let address = normalize_address(&options.address)?;
        let previous = {
            let state = self.inner.state.lock();
            if !state.devices.contains_key(&address) {
                tracing::debug!("Could not connect to bluetooth device. Device not found.");
                return Err(PluginError::DeviceNotFound(address));
            }
            state.connected.clone()
        };

        match previous {
            Some(current) if current == address => {
                return Ok(StatusResponse::new(CONNECTED));
            }
            Some(current) => {
                tracing::info!("Dropping connection to {} before connecting to {}", current, address);
                self.inner.backend.disconnect(&current).await?;
                let mut state = self.inner.state.lock();
                state.connected = None;
                state.rx.clear();
            }
            None => {}
        }

        tracing::info!("Connecting to bluetooth device {}", address);
        self.inner.backend.connect(&address).await?;

        let mut state = self.inner.state.lock();
        state.connected = Some(address);
        state.rx.clear();
        Ok(StatusResponse::new(CONNECTED))
    }

    async fn disconnect_from_device(&self) -> Result<StatusResponse, PluginError> {
        tracing::debug!("Triggered method disconnectFromDevice()");

        let connected = self.inner.state.lock().connected.clone();
        if let Some(address) = connected {
            self.inner.backend.disconnect(&address).await?;
            let mut state = self.inner.state.lock();
            if state.connected.as_deref() == Some(address.as_str()) {
                state.connected = None;
                state.rx.clear();
            }
            tracing::info!("Disconnected from bluetooth device {}", address);
        } else {
            tracing::debug!("Disconnect requested without an active connection");
        }

        Ok(StatusResponse::new(DISCONNECTED))
    }

    async fn send_data_to_device(&self, options: SendDataOptions) -> Result<StatusResponse, PluginError> {
        tracing::debug!("Triggered method sendDataToDevice()");

        if self.inner.state.lock().connected.is_none() {
            return Err(PluginError::NoActiveConnection);
        }

        for chunk in options.data.as_bytes().chunks(self.inner.write_chunk_size) {
            self.inner.backend.write(chunk).await?;
        }
        tracing::debug!("Sent {} bytes to bluetooth device", options.data.len());

        Ok(StatusResponse::new(DATA_SENT))
    }

    async fn start_scanning_devices(&self) -> Result<ScanResponse, PluginError> {
        if self.is_discovering() {
            return Ok(ScanResponse::unchanged(SCAN_ALREADY_RUNNING));
        }
        tracing::info!("Starting scanning of bluetooth devices");
        self.start_discovering(DiscoveryOptions::default()).await?;
        Ok(ScanResponse::changed(SCAN_STARTED))
    }

    async fn stop_scanning_devices(&self) -> Result<ScanResponse, PluginError> {
        if !self.inner.stop_discovery(None, false).await {
            return Ok(ScanResponse::unchanged(SCAN_NOT_RUNNING));
        }
        tracing::info!("Stopping scanning of bluetooth devices");
        Ok(ScanResponse::changed(SCAN_STOPPED))
    }

    fn describe(&self) -> PluginInfo {
        PluginInfo {
            platform: self.inner.backend.platform().to_string(),
            registration_name: self.inner.registration_name.clone(),
            hardware: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::events::EventKind;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    #[derive(Default)]
    struct MockRadio {
        disabled: AtomicBool,
        scan_delay_ms: AtomicU64,
        stop_delay_ms: AtomicU64,
        calls: Mutex<Vec<String>>,
        writes: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl RadioBackend for MockRadio {
        fn platform(&self) -> &str {
            "Mock"
        }

        async fn is_enabled(&self) -> bool {
            !self.disabled.load(Ordering::SeqCst)
        }

        async fn start_scan(&self) -> Result<(), PluginError> {
            delay(&self.scan_delay_ms).await;
            self.calls.lock().push("start_scan".to_string());
            Ok(())
        }

        async fn stop_scan(&self) -> Result<(), PluginError> {
            delay(&self.stop_delay_ms).await;
            self.calls.lock().push("stop_scan".to_string());
            Ok(())
        }

        async fn connect(&self, address: &str) -> Result<(), PluginError> {
            self.calls.lock().push(format!("connect {}", address));
            Ok(())
        }

        async fn disconnect(&self, address: &str) -> Result<(), PluginError> {
            self.calls.lock().push(format!("disconnect {}", address));
            Ok(())
        }

        async fn write(&self, chunk: &[u8]) -> Result<(), PluginError> {
            self.writes.lock().push(chunk.to_vec());
            Ok(())
        }
    }

    async fn delay(ms: &AtomicU64) {
        let ms = ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    struct Fixture {
        session: SerialSession,
        radio: Arc<MockRadio>,
        radio_tx: mpsc::UnboundedSender<RadioEvent>,
        seen: Arc<Mutex<Vec<PluginEvent>>>,
    }

    fn fixture(scan_timeout_ms: u64) -> Fixture {
        let radio = Arc::new(MockRadio::default());
        let (radio_tx, radio_rx) = mpsc::unbounded_channel();
        let events = ListenerRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for kind in EventKind::ALL {
            let s = Arc::clone(&seen);
            events.add_listener(kind, move |event| s.lock().push(event.clone()));
        }
        let config = PluginConfig {
            scan_timeout_ms,
            scan_interval_ms: 10,
            write_chunk_size: 4,
            ..PluginConfig::default()
        };
        let session = SerialSession::start(radio.clone(), radio_rx, events, &config);
        Fixture { session, radio, radio_tx, seen }
    }

    fn device(address: &str) -> Device {
        Device {
            name: "Tag1".to_string(),
            device_type: 2,
            address: address.to_string(),
            rssi: -60,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_discovery_times_out() {
        let f = fixture(50);
        let status = f.session.start_discovering(DiscoveryOptions::default()).await.unwrap();
        assert_eq!(status.status, DISCOVERY_STARTED);
        assert!(f.session.is_discovering());

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(!f.session.is_discovering());
        assert_eq!(*f.seen.lock(), vec![PluginEvent::DiscoveryStart, PluginEvent::DiscoveryStop]);
        assert_eq!(*f.radio.calls.lock(), vec!["start_scan".to_string(), "stop_scan".to_string()]);
    }

    #[tokio::test]
    async fn test_second_start_does_not_restart() {
        let f = fixture(10_000);
        f.session.start_discovering(DiscoveryOptions::default()).await.unwrap();
        f.session.start_discovering(DiscoveryOptions::default()).await.unwrap();

        assert_eq!(f.radio.calls.lock().len(), 1);
        assert_eq!(*f.seen.lock(), vec![PluginEvent::DiscoveryStart]);
    }

    #[tokio::test]
    async fn test_periodic_discovery_rescans_until_cancelled() {
        let f = fixture(10_000);
        f.session
            .start_discovering(DiscoveryOptions { periodically: true })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(55)).await;
        f.session.cancel_discovering().await.unwrap();

        let scans = f.radio.calls.lock().iter().filter(|c| *c == "start_scan").count();
        assert!(scans >= 2, "expected rescans, got {}", scans);

        let after_cancel = f.radio.calls.lock().len();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(f.radio.calls.lock().len(), after_cancel);
    }

    #[tokio::test]
    async fn test_cancel_while_radio_starting_emits_no_events() {
        let f = fixture(10_000);
        f.radio.scan_delay_ms.store(50, Ordering::SeqCst);

        let (started, cancelled) = tokio::join!(
            f.session.start_discovering(DiscoveryOptions::default()),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                f.session.cancel_discovering().await
            }
        );
        assert_eq!(started.unwrap().status, DISCOVERY_STARTED);
        assert_eq!(cancelled.unwrap().status, DISCOVERY_CANCELED);
        settle().await;

        assert!(!f.session.is_discovering());
        assert!(f.seen.lock().is_empty());
        assert_eq!(*f.radio.calls.lock(), vec!["start_scan".to_string(), "stop_scan".to_string()]);
    }

    #[tokio::test]
    async fn test_restart_during_slow_stop_leaves_radio_scanning() {
        let f = fixture(10_000);
        f.session.start_discovering(DiscoveryOptions::default()).await.unwrap();
        f.radio.stop_delay_ms.store(30, Ordering::SeqCst);

        let (cancelled, restarted) = tokio::join!(f.session.cancel_discovering(), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            f.session.start_discovering(DiscoveryOptions::default()).await
        });
        cancelled.unwrap();
        restarted.unwrap();

        assert!(f.session.is_discovering());
        assert_eq!(
            *f.radio.calls.lock(),
            vec!["start_scan".to_string(), "stop_scan".to_string(), "start_scan".to_string()]
        );
        assert_eq!(
            *f.seen.lock(),
            vec![PluginEvent::DiscoveryStart, PluginEvent::DiscoveryStop, PluginEvent::DiscoveryStart]
        );
    }

    #[tokio::test]
    async fn test_stale_timeout_does_not_end_new_session() {
        let f = fixture(10_000);
        f.session.start_discovering(DiscoveryOptions::default()).await.unwrap();
        f.session.cancel_discovering().await.unwrap();
        f.session.start_discovering(DiscoveryOptions::default()).await.unwrap();

        // Timeout of the first session firing late
        assert!(!f.session.inner.stop_discovery(Some(1), true).await);
        assert!(f.session.is_discovering());
        assert_eq!(f.seen.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_restarted_discovery_gets_full_timeout() {
        let f = fixture(100);
        f.session.start_discovering(DiscoveryOptions::default()).await.unwrap();
        f.session.cancel_discovering().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        f.session.start_discovering(DiscoveryOptions::default()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(70)).await;
        assert!(f.session.is_discovering());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!f.session.is_discovering());
        assert_eq!(
            *f.seen.lock(),
            vec![
                PluginEvent::DiscoveryStart,
                PluginEvent::DiscoveryStop,
                PluginEvent::DiscoveryStart,
                PluginEvent::DiscoveryStop,
            ]
        );
    }

    #[tokio::test]
    async fn test_radio_ending_scan_stops_discovery() {
        let f = fixture(10_000);
        f.session.start_discovering(DiscoveryOptions::default()).await.unwrap();
        f.radio_tx.send(RadioEvent::ScanStopped).unwrap();
        settle().await;

        assert!(!f.session.is_discovering());
        assert_eq!(*f.seen.lock(), vec![PluginEvent::DiscoveryStart, PluginEvent::DiscoveryStop]);
        // The radio already stopped on its own
        assert_eq!(*f.radio.calls.lock(), vec!["start_scan".to_string()]);
    }

    #[tokio::test]
    async fn test_default_echo_returns_input() {
        let f = fixture(10_000);
        assert_eq!(f.session.echo("ping".to_string()).await.unwrap(), "ping");
        assert!(f.radio.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_adapter_rejects_discovery() {
        let f = fixture(10_000);
        f.radio.disabled.store(true, Ordering::SeqCst);
        let err = f.session.start_discovering(DiscoveryOptions::default()).await.unwrap_err();
        assert_eq!(err, PluginError::BluetoothDisabled);
        assert!(!f.session.is_discovering());
        assert!(f.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_found_device_event_after_cancel_is_delivered() {
        let f = fixture(10_000);
        f.session.start_discovering(DiscoveryOptions::default()).await.unwrap();
        f.session.cancel_discovering().await.unwrap();

        f.radio_tx.send(RadioEvent::DeviceFound { device: device("11:22:33:44:55:66") }).unwrap();
        settle().await;

        assert_eq!(
            *f.seen.lock(),
            vec![
                PluginEvent::DiscoveryStart,
                PluginEvent::DiscoveryStop,
                PluginEvent::DeviceFound(device("11:22:33:44:55:66")),
            ]
        );
    }

    #[tokio::test]
    async fn test_connect_requires_discovered_device() {
        let f = fixture(10_000);
        let err = f
            .session
            .connect_to_device(ConnectOptions::new("AA:BB:CC:DD:EE:FF"))
            .await
            .unwrap_err();
        assert_eq!(err, PluginError::DeviceNotFound("AA:BB:CC:DD:EE:FF".to_string()));

        let err = f.session.connect_to_device(ConnectOptions::new("garbage")).await.unwrap_err();
        assert!(matches!(err, PluginError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_connect_send_disconnect() {
        let f = fixture(10_000);
        f.radio_tx.send(RadioEvent::DeviceFound { device: device("aa:bb:cc:dd:ee:ff") }).unwrap();
        settle().await;

        f.session
            .connect_to_device(ConnectOptions::new("AA:BB:CC:DD:EE:FF"))
            .await
            .unwrap();
        assert_eq!(f.session.connected_device().as_deref(), Some("AA:BB:CC:DD:EE:FF"));

        let status = f.session.send_data_to_device(SendDataOptions::new("hello world")).await.unwrap();
        assert_eq!(status.status, DATA_SENT);
        assert_eq!(
            *f.radio.writes.lock(),
            vec![b"hell".to_vec(), b"o wo".to_vec(), b"rld".to_vec()]
        );

        f.session.disconnect_from_device().await.unwrap();
        assert_eq!(f.session.connected_device(), None);
        assert_eq!(
            f.session.send_data_to_device(SendDataOptions::new("x")).await,
            Err(PluginError::NoActiveConnection)
        );
    }

    #[tokio::test]
    async fn test_disconnect_without_connection_is_noop() {
        let f = fixture(10_000);
        let status = f.session.disconnect_from_device().await.unwrap();
        assert_eq!(status.status, DISCONNECTED);
        assert!(f.radio.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_received_data_split_into_records() {
        let f = fixture(10_000);
        f.radio_tx.send(RadioEvent::DataReceived { data: "12.".to_string() }).unwrap();
        f.radio_tx.send(RadioEvent::DataReceived { data: "5\r13".to_string() }).unwrap();
        settle().await;

        assert_eq!(
            *f.seen.lock(),
            vec![PluginEvent::DeviceRecvData(DeviceData { data: "12.5".to_string() })]
        );
    }

    #[tokio::test]
    async fn test_remote_disconnect_clears_connection() {
        let f = fixture(10_000);
        f.radio_tx.send(RadioEvent::DeviceFound { device: device("11:22:33:44:55:66") }).unwrap();
        settle().await;
        f.session
            .connect_to_device(ConnectOptions::new("11:22:33:44:55:66"))
            .await
            .unwrap();

        f.radio_tx.send(RadioEvent::Disconnected).unwrap();
        settle().await;

        assert_eq!(f.session.connected_device(), None);
    }

    #[tokio::test]
    async fn test_new_discovery_clears_device_table() {
        let f = fixture(10_000);
        f.radio_tx.send(RadioEvent::DeviceFound { device: device("11:22:33:44:55:66") }).unwrap();
        settle().await;
        assert_eq!(f.session.discovered_devices().len(), 1);

        f.session.start_discovering(DiscoveryOptions::default()).await.unwrap();
        assert!(f.session.discovered_devices().is_empty());
    }

    #[tokio::test]
    async fn test_scan_style_operations() {
        let f = fixture(10_000);
        assert_eq!(
            f.session.stop_scanning_devices().await.unwrap(),
            ScanResponse::unchanged(SCAN_NOT_RUNNING)
        );
        assert_eq!(
            f.session.start_scanning_devices().await.unwrap(),
            ScanResponse::changed(SCAN_STARTED)
        );
        assert_eq!(
            f.session.start_scanning_devices().await.unwrap(),
            ScanResponse::unchanged(SCAN_ALREADY_RUNNING)
        );
        assert_eq!(
            f.session.stop_scanning_devices().await.unwrap(),
            ScanResponse::changed(SCAN_STOPPED)
        );
    }

    #[test]
    fn test_radio_event_wire_format() {
        let event: RadioEvent = serde_json::from_str(
            r#"{"type":"deviceFound","device":{"name":"Tag1","type":0,"address":"11:22:33:44:55:66","rssi":-60}}"#,
        )
        .unwrap();
        assert!(matches!(event, RadioEvent::DeviceFound { .. }));

        let event: RadioEvent = serde_json::from_str(r#"{"type":"adapterState","enabled":false}"#).unwrap();
        assert_eq!(
            event,
            RadioEvent::AdapterState { enabled: false, permission_granted: true }
        );
    }
}
