//! Laird Bridge - Bluetooth serial plugin contract for cross-platform hosts
//!
//! Exposes a fixed surface for discovering Bluetooth devices, connecting to
//! one, exchanging text with it over the Laird virtual serial port, and
//! subscribing to the resulting events. A native implementation is bound
//! when one is registered; otherwise every hardware operation is rejected by
//! the web fallback.

pub mod config;
pub mod ffi;
pub mod logging;
pub mod plugin;
pub mod session;

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use config::PluginConfig;
use plugin::events::{EventKind, ListenerHandle, ListenerRegistry, PluginEvent};
use plugin::native::{NativeBridge, NativeChannel};
use plugin::resolver::{BindingKind, CapabilityResolver};
use plugin::types::{ConnectOptions, DiscoveryOptions, ScanResponse, SendDataOptions, StatusResponse};
use plugin::{BluetoothPlugin, PluginError, PluginInfo};
use session::{RadioBackend, RadioEvent, SerialSession};

pub use plugin::{CONTRACT_VERSION, DEFAULT_REGISTRATION_NAME};

/// Plugin context shared by the host runtime and startup code
///
/// Owns the listener registry and the resolver that binds the registration
/// name to one implementation on first use.
pub struct LairdBridge {
    config: PluginConfig,
    resolver: CapabilityResolver,
    events: ListenerRegistry,
}

/// Where the native implementation comes from
enum NativeSource {
    Plugin(Arc<dyn BluetoothPlugin>),
    Channel(Arc<dyn NativeChannel>),
    Radio {
        backend: Arc<dyn RadioBackend>,
        radio_events: mpsc::UnboundedReceiver<RadioEvent>,
    },
}

pub struct LairdBridgeBuilder {
    config: PluginConfig,
    events: ListenerRegistry,
    native: Option<NativeSource>,
}

impl LairdBridgeBuilder {
    pub fn config(mut self, config: PluginConfig) -> Self {
        self.config = config;
        self
    }

    /// Bind an already constructed implementation
    pub fn native(mut self, plugin: Arc<dyn BluetoothPlugin>) -> Self {
        self.native = Some(NativeSource::Plugin(plugin));
        self
    }

    /// Forward every operation through a native channel
    pub fn native_channel(mut self, channel: Arc<dyn NativeChannel>) -> Self {
        self.native = Some(NativeSource::Channel(channel));
        self
    }

    /// Run a serial session over a radio backend
    ///
    /// The session is started on first resolution, which must happen inside
    /// a tokio runtime.
    pub fn radio(
        mut self,
        backend: Arc<dyn RadioBackend>,
        radio_events: mpsc::UnboundedReceiver<RadioEvent>,
    ) -> Self {
        self.native = Some(NativeSource::Radio { backend, radio_events });
        self
    }

    pub fn build(self) -> Result<LairdBridge, PluginError> {
        let LairdBridgeBuilder { config, events, native } = self;
        config
            .validate()
            .map_err(|e| PluginError::InvalidArgument(e.to_string()))?;

        let mut resolver = CapabilityResolver::new(config.registration_name.clone());
        if !config.allow_web_fallback {
            resolver = resolver.without_fallback();
        }

        resolver = match native {
            None => resolver,
            Some(NativeSource::Plugin(plugin)) => resolver.with_native(plugin),
            Some(NativeSource::Channel(channel)) => {
                let name = config.registration_name.clone();
                let events = events.clone();
                resolver.with_native_factory(move || {
                    Ok(Arc::new(NativeBridge::new(name.clone(), Arc::clone(&channel), events.clone()))
                        as Arc<dyn BluetoothPlugin>)
                })
            }
            Some(NativeSource::Radio { backend, radio_events }) => {
                let config = config.clone();
                let events = events.clone();
                let radio_events = Mutex::new(Some(radio_events));
                resolver.with_native_factory(move || {
                    if tokio::runtime::Handle::try_current().is_err() {
                        return Err(PluginError::BridgeUnavailable(
                            "Serial session needs a tokio runtime".to_string(),
                        ));
                    }
                    let radio_events = radio_events.lock().take().ok_or_else(|| {
                        PluginError::BridgeUnavailable("Radio event stream already taken".to_string())
                    })?;
                    Ok(Arc::new(SerialSession::start(
                        Arc::clone(&backend),
                        radio_events,
                        events.clone(),
                        &config,
                    )) as Arc<dyn BluetoothPlugin>)
                })
            }
        };

        Ok(LairdBridge { config, resolver, events })
    }
}

impl LairdBridge {
    pub fn builder() -> LairdBridgeBuilder {
        LairdBridgeBuilder {
            config: PluginConfig::default(),
            events: ListenerRegistry::new(),
            native: None,
        }
    }

    /// Bridge with no native implementation registered
    pub fn with_config(config: PluginConfig) -> Result<Self, PluginError> {
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn registration_name(&self) -> &str {
        self.resolver.registration_name()
    }

    /// The bound implementation, binding it on first call
    pub fn plugin(&self) -> Result<Arc<dyn BluetoothPlugin>, PluginError> {
        self.resolver.resolve()
    }

    /// Kind of the current binding, `None` until the first operation
    pub fn binding_kind(&self) -> Option<BindingKind> {
        self.resolver.binding_kind()
    }

    pub fn describe(&self) -> Result<PluginInfo, PluginError> {
        Ok(self.plugin()?.describe())
    }

    pub fn events(&self) -> &ListenerRegistry {
        &self.events
    }

    pub fn add_listener<F>(&self, kind: EventKind, callback: F) -> ListenerHandle
    where
        F: Fn(&PluginEvent) + Send + Sync + 'static,
    {
        self.events.add_listener(kind, callback)
    }

    pub fn remove_all_listeners(&self) {
        self.events.remove_all_listeners();
    }

    /// Deliver an event reported by a native channel, by wire name
    pub fn deliver_native_event(&self, name: &str, payload: Value) -> Result<usize, PluginError> {
        let event = PluginEvent::from_wire(name, payload)?;
        Ok(self.events.notify(&event))
    }

    pub async fn start_discovering(&self, options: DiscoveryOptions) -> Result<StatusResponse, PluginError> {
        self.plugin()?.start_discovering(options).await
    }

    pub async fn cancel_discovering(&self) -> Result<StatusResponse, PluginError> {
        self.plugin()?.cancel_discovering().await
    }

    pub async fn connect_to_device(&self, options: ConnectOptions) -> Result<StatusResponse, PluginError> {
        self.plugin()?.connect_to_device(options).await
    }

    pub async fn disconnect_from_device(&self) -> Result<StatusResponse, PluginError> {
        self.plugin()?.disconnect_from_device().await
    }

    pub async fn send_data_to_device(&self, options: SendDataOptions) -> Result<StatusResponse, PluginError> {
        self.plugin()?.send_data_to_device(options).await
    }

    pub async fn start_scanning_devices(&self) -> Result<ScanResponse, PluginError> {
        self.plugin()?.start_scanning_devices().await
    }

    pub async fn stop_scanning_devices(&self) -> Result<ScanResponse, PluginError> {
        self.plugin()?.stop_scanning_devices().await
    }

    pub async fn echo(&self, value: impl Into<String>) -> Result<String, PluginError> {
        self.plugin()?.echo(value.into()).await
    }
}
