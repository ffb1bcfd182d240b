//! Native bridge stub
//!
//! Forwards contract calls by method name and JSON payload through an opaque
//! [`NativeChannel`] and translates the replies back into contract result
//! shapes. Events pushed by the native side enter through
//! [`NativeBridge::handle_native_event`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::events::{ListenerRegistry, PluginEvent};
use super::methods;
use super::types::{
    normalize_address, ConnectOptions, DiscoveryOptions, EchoOptions, EchoResponse, ScanResponse,
    SendDataOptions, StatusResponse,
};
use super::status::{DISCOVERY_CANCELED, DISCOVERY_STARTED};
use super::{BluetoothPlugin, PluginError, PluginInfo};

/// Request/response channel owned by the native platform layer
///
/// The serialization format on the far side is up to the platform; this
/// crate only sees method names and JSON values.
#[async_trait]
pub trait NativeChannel: Send + Sync {
    /// Platform name, e.g. "Android" or "iOS"
    fn platform(&self) -> &str;

    /// Invoke a named method with its options object
    async fn call(&self, method: &str, payload: Value) -> Result<Value, PluginError>;
}

/// Contract implementation backed by a native channel
pub struct NativeBridge {
    registration_name: String,
    channel: Arc<dyn NativeChannel>,
    events: ListenerRegistry,
}

impl NativeBridge {
    pub fn new(
        registration_name: impl Into<String>,
        channel: Arc<dyn NativeChannel>,
        events: ListenerRegistry,
    ) -> Self {
        let registration_name = registration_name.into();
        tracing::info!(
            "Binding plugin {} to native channel ({})",
            registration_name,
            channel.platform()
        );
        Self {
            registration_name,
            channel,
            events,
        }
    }

    /// Deliver an event pushed by the native side to registered listeners
    pub fn handle_native_event(&self, name: &str, payload: Value) -> Result<usize, PluginError> {
        let event = PluginEvent::from_wire(name, payload)?;
        Ok(self.events.notify(&event))
    }

    async fn invoke<P, R>(&self, method: &str, payload: &P) -> Result<R, PluginError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        tracing::debug!("Triggered method {}()", method);
        let payload = serde_json::to_value(payload)?;
        let reply = self.channel.call(method, payload).await.map_err(|e| {
            tracing::warn!("Native call {} failed: {}", method, e);
            e
        })?;
        Ok(serde_json::from_value(reply)?)
    }

    /// Discovery calls carry no guaranteed reply; a missing status means success
    async fn invoke_status(
        &self,
        method: &str,
        payload: &Value,
        fallback: &str,
    ) -> Result<StatusResponse, PluginError> {
        let reply: Value = self.invoke(method, payload).await?;
        let status = reply
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or(fallback);
        Ok(StatusResponse::new(status))
    }
}

#[async_trait]
impl BluetoothPlugin for NativeBridge {
    async fn start_discovering(&self, options: DiscoveryOptions) -> Result<StatusResponse, PluginError> {
        let options = serde_json::to_value(options)?;
        self.invoke_status(methods::START_DISCOVERING, &options, DISCOVERY_STARTED)
            .await
    }

    async fn cancel_discovering(&self) -> Result<StatusResponse, PluginError> {
        self.invoke_status(
            methods::CANCEL_DISCOVERING,
            &Value::Object(Default::default()),
            DISCOVERY_CANCELED,
        )
        .await
    }

    async fn connect_to_device(&self, options: ConnectOptions) -> Result<StatusResponse, PluginError> {
        // Malformed addresses never cross the bridge
        let address = normalize_address(&options.address)?;
        self.invoke(methods::CONNECT_TO_DEVICE, &ConnectOptions { address }).await
    }

    async fn disconnect_from_device(&self) -> Result<StatusResponse, PluginError> {
        self.invoke(methods::DISCONNECT_FROM_DEVICE, &Value::Object(Default::default())).await
    }

    async fn send_data_to_device(&self, options: SendDataOptions) -> Result<StatusResponse, PluginError> {
        self.invoke(methods::SEND_DATA_TO_DEVICE, &options).await
    }

    async fn start_scanning_devices(&self) -> Result<ScanResponse, PluginError> {
        self.invoke(methods::START_SCANNING_DEVICES, &Value::Object(Default::default())).await
    }

    async fn stop_scanning_devices(&self) -> Result<ScanResponse, PluginError> {
        self.invoke(methods::STOP_SCANNING_DEVICES, &Value::Object(Default::default())).await
    }

    async fn echo(&self, value: String) -> Result<String, PluginError> {
        let reply: EchoResponse = self.invoke(methods::ECHO, &EchoOptions { value }).await?;
        Ok(reply.value)
    }

    fn describe(&self) -> PluginInfo {
        PluginInfo {
            platform: self.channel.platform().to_string(),
            registration_name: self.registration_name.clone(),
            hardware: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::events::EventKind;
    use crate::plugin::types::Device;
    use parking_lot::Mutex;

    /// Records calls and answers with canned replies
    struct RecordingChannel {
        calls: Mutex<Vec<(String, Value)>>,
    }

    /// Succeeds on every call without a reply payload
    struct SilentChannel;

    #[async_trait]
    impl NativeChannel for SilentChannel {
        fn platform(&self) -> &str {
            "Test"
        }

        async fn call(&self, _method: &str, _payload: Value) -> Result<Value, PluginError> {
            Ok(Value::Null)
        }
    }

    #[async_trait]
    impl NativeChannel for RecordingChannel {
        fn platform(&self) -> &str {
            "Test"
        }

        async fn call(&self, method: &str, payload: Value) -> Result<Value, PluginError> {
            self.calls.lock().push((method.to_string(), payload.clone()));
            match method {
                methods::ECHO => Ok(payload),
                methods::SEND_DATA_TO_DEVICE => Err(PluginError::NoActiveConnection),
                methods::START_SCANNING_DEVICES => Ok(serde_json::json!({"status": 0, "body": "started"})),
                _ => Ok(serde_json::json!({"status": "ok"})),
            }
        }
    }

    fn bridge() -> (NativeBridge, Arc<RecordingChannel>, ListenerRegistry) {
        let channel = Arc::new(RecordingChannel { calls: Mutex::new(Vec::new()) });
        let events = ListenerRegistry::new();
        let bridge = NativeBridge::new("Laird", channel.clone(), events.clone());
        (bridge, channel, events)
    }

    #[tokio::test]
    async fn test_calls_forwarded_by_name() {
        let (bridge, channel, _) = bridge();

        let status = bridge
            .start_discovering(DiscoveryOptions { periodically: true })
            .await
            .unwrap();
        assert_eq!(status.status, "ok");
        let scan = bridge.start_scanning_devices().await.unwrap();
        assert_eq!(scan, ScanResponse::changed("started"));
        assert_eq!(bridge.echo("ping".to_string()).await.unwrap(), "ping");

        let calls = channel.calls.lock();
        assert_eq!(calls[0].0, "startDiscovering");
        assert_eq!(calls[0].1, serde_json::json!({"periodically": true}));
        assert_eq!(calls[1].0, "startScanningDevices");
        assert_eq!(calls[2].0, "echo");
    }

    #[tokio::test]
    async fn test_discovery_succeeds_without_reply_payload() {
        let bridge = NativeBridge::new("Laird", Arc::new(SilentChannel), ListenerRegistry::new());

        let status = bridge.start_discovering(DiscoveryOptions::default()).await.unwrap();
        assert_eq!(status.status, DISCOVERY_STARTED);
        let status = bridge.cancel_discovering().await.unwrap();
        assert_eq!(status.status, DISCOVERY_CANCELED);
    }

    #[tokio::test]
    async fn test_malformed_address_rejected_before_channel() {
        let (bridge, channel, _) = bridge();
        let err = bridge
            .connect_to_device(ConnectOptions::new("not-an-address"))
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::InvalidArgument(_)));
        assert!(channel.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_native_errors_propagate() {
        let (bridge, _, _) = bridge();
        let err = bridge.send_data_to_device(SendDataOptions::new("hello")).await.unwrap_err();
        assert_eq!(err, PluginError::NoActiveConnection);
    }

    #[test]
    fn test_native_events_reach_listeners() {
        let (bridge, _, events) = bridge();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        events.add_listener(EventKind::DeviceFound, move |event| s.lock().push(event.clone()));

        let delivered = bridge
            .handle_native_event(
                "deviceFoundEvent",
                serde_json::json!({"name": "Tag1", "type": 0, "address": "11:22:33:44:55:66", "rssi": -60}),
            )
            .unwrap();

        assert_eq!(delivered, 1);
        assert_eq!(
            seen.lock()[0],
            PluginEvent::DeviceFound(Device {
                name: "Tag1".to_string(),
                device_type: 0,
                address: "11:22:33:44:55:66".to_string(),
                rssi: -60,
            })
        );
    }
}
