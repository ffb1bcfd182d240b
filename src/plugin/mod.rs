//! Laird plugin contract
//!
//! This module defines the interface every backing implementation answers,
//! whether it forwards to a native Bluetooth stack or is the inert web
//! fallback. Application code only ever talks to [`BluetoothPlugin`].

pub mod events;
pub mod native;
pub mod resolver;
pub mod types;
pub mod web;

use async_trait::async_trait;
use thiserror::Error;

use self::types::{ConnectOptions, DiscoveryOptions, ScanResponse, SendDataOptions, StatusResponse};

/// Version of the canonical contract exposed by this crate
pub const CONTRACT_VERSION: u32 = 1;

/// Name the host runtime uses to look up the bound implementation
pub const DEFAULT_REGISTRATION_NAME: &str = "Laird";

/// Message carried by every web fallback rejection
pub const NOT_IMPLEMENTED_FOR_WEB: &str = "Not implemented for web.";

/// Status strings resolved by successful operations
pub mod status {
    pub const DISCOVERY_STARTED: &str = "Discovering has started.";
    pub const DISCOVERY_CANCELED: &str = "Discovering has been canceled.";
    pub const CONNECTED: &str = "Connected to bluetooth device.";
    pub const DISCONNECTED: &str = "Disconnected from bluetooth device.";
    pub const DATA_SENT: &str = "Successfully sent data to device.";
}

/// Wire names of the contract operations
pub mod methods {
    pub const START_DISCOVERING: &str = "startDiscovering";
    pub const CANCEL_DISCOVERING: &str = "cancelDiscovering";
    pub const CONNECT_TO_DEVICE: &str = "connectToDevice";
    pub const DISCONNECT_FROM_DEVICE: &str = "disconnectFromDevice";
    pub const SEND_DATA_TO_DEVICE: &str = "sendDataToDevice";
    pub const START_SCANNING_DEVICES: &str = "startScanningDevices";
    pub const STOP_SCANNING_DEVICES: &str = "stopScanningDevices";
    pub const ECHO: &str = "echo";

    /// Every operation name, in declaration order
    pub const ALL: [&str; 8] = [
        START_DISCOVERING,
        CANCEL_DISCOVERING,
        CONNECT_TO_DEVICE,
        DISCONNECT_FROM_DEVICE,
        SEND_DATA_TO_DEVICE,
        START_SCANNING_DEVICES,
        STOP_SCANNING_DEVICES,
        ECHO,
    ];
}

/// Bluetooth plugin contract
///
/// Every operation is non-blocking and reports failure through `Err`; a
/// successful `status` string never signals an error.
#[async_trait]
pub trait BluetoothPlugin: Send + Sync {
    /// Start a discovery session.
    ///
    /// Completion is observed through `discoveryStartEvent`,
    /// `deviceFoundEvent` and `discoveryStopEvent`, not through the return value.
    async fn start_discovering(&self, options: DiscoveryOptions) -> Result<StatusResponse, PluginError>;

    /// Request the current discovery session to stop
    async fn cancel_discovering(&self) -> Result<StatusResponse, PluginError>;

    /// Connect to a device previously reported by `deviceFoundEvent`
    async fn connect_to_device(&self, options: ConnectOptions) -> Result<StatusResponse, PluginError>;

    /// End the current connection; succeeds as a no-op when nothing is connected
    async fn disconnect_from_device(&self) -> Result<StatusResponse, PluginError>;

    /// Transmit a string payload over the active connection
    async fn send_data_to_device(&self, options: SendDataOptions) -> Result<StatusResponse, PluginError>;

    /// Scan-style start kept for hosts built against the older "Main" surface
    async fn start_scanning_devices(&self) -> Result<ScanResponse, PluginError>;

    /// Scan-style stop kept for hosts built against the older "Main" surface
    async fn stop_scanning_devices(&self) -> Result<ScanResponse, PluginError>;

    /// Connectivity check; returns its input unchanged
    async fn echo(&self, value: String) -> Result<String, PluginError> {
        tracing::debug!("ECHO {:?}", value);
        Ok(value)
    }

    /// Short description of the backing implementation
    fn describe(&self) -> PluginInfo;
}

/// Information about a bound implementation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    /// Platform name (e.g., "Web", "Android", "Desktop")
    pub platform: String,
    /// Registration name the implementation answers to
    pub registration_name: String,
    /// Whether real radio hardware is reachable
    pub hardware: bool,
}

impl std::fmt::Display for PluginInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) - hardware: {}",
            self.registration_name, self.platform, self.hardware
        )
    }
}

/// Plugin error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PluginError {
    #[error("{0}")]
    UnsupportedPlatform(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("No bluetooth device is connected.")]
    NoActiveConnection,

    #[error("Bridge unavailable: {0}")]
    BridgeUnavailable(String),

    #[error("Could not connect to bluetooth device {0}. Device not found.")]
    DeviceNotFound(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("Bluetooth is not enabled.")]
    BluetoothDisabled,

    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PluginError {
    /// The web fallback rejection
    pub fn not_implemented() -> Self {
        PluginError::UnsupportedPlatform(NOT_IMPLEMENTED_FOR_WEB.to_string())
    }

    /// Stable machine-readable code, used in FFI envelopes
    pub fn code(&self) -> &'static str {
        match self {
            PluginError::UnsupportedPlatform(_) => "UNSUPPORTED_PLATFORM",
            PluginError::InvalidArgument(_) => "INVALID_ARGUMENT",
            PluginError::NoActiveConnection => "NO_ACTIVE_CONNECTION",
            PluginError::BridgeUnavailable(_) => "BRIDGE_UNAVAILABLE",
            PluginError::DeviceNotFound(_) => "DEVICE_NOT_FOUND",
            PluginError::PermissionDenied(_) => "PERMISSION_DENIED",
            PluginError::BluetoothDisabled => "BLUETOOTH_DISABLED",
            PluginError::UnknownMethod(_) => "UNKNOWN_METHOD",
            PluginError::Platform(_) => "PLATFORM_ERROR",
            PluginError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Rebuild an error from an FFI or native-channel code and message
    pub fn from_code(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            "UNSUPPORTED_PLATFORM" => PluginError::UnsupportedPlatform(message),
            "INVALID_ARGUMENT" => PluginError::InvalidArgument(message),
            "NO_ACTIVE_CONNECTION" => PluginError::NoActiveConnection,
            "BRIDGE_UNAVAILABLE" => PluginError::BridgeUnavailable(message),
            "DEVICE_NOT_FOUND" => PluginError::DeviceNotFound(message),
            "PERMISSION_DENIED" => PluginError::PermissionDenied(message),
            "BLUETOOTH_DISABLED" => PluginError::BluetoothDisabled,
            "UNKNOWN_METHOD" => PluginError::UnknownMethod(message),
            "SERIALIZATION_ERROR" => PluginError::Serialization(message),
            _ => PluginError::Platform(message),
        }
    }
}

impl From<serde_json::Error> for PluginError {
    fn from(err: serde_json::Error) -> Self {
        PluginError::Serialization(err.to_string())
    }
}
