//! Web fallback implementation
//!
//! Bound when no native bridge is registered. It has no access to radio
//! hardware: every hardware operation rejects immediately with
//! [`PluginError::UnsupportedPlatform`] and leaves no state behind. Only
//! `echo` does real work.

use async_trait::async_trait;

use super::types::{ConnectOptions, DiscoveryOptions, ScanResponse, SendDataOptions, StatusResponse};
use super::{BluetoothPlugin, PluginError, PluginInfo};

/// Inert implementation of the contract
#[derive(Debug, Clone)]
pub struct WebFallback {
    registration_name: String,
}

impl WebFallback {
    pub fn new(registration_name: impl Into<String>) -> Self {
        let registration_name = registration_name.into();
        tracing::info!("Creating web fallback for plugin {}", registration_name);
        Self { registration_name }
    }
}

#[async_trait]
impl BluetoothPlugin for WebFallback {
    async fn start_discovering(&self, _options: DiscoveryOptions) -> Result<StatusResponse, PluginError> {
        Err(PluginError::not_implemented())
    }

    async fn cancel_discovering(&self) -> Result<StatusResponse, PluginError> {
        Err(PluginError::not_implemented())
    }

    async fn connect_to_device(&self, _options: ConnectOptions) -> Result<StatusResponse, PluginError> {
        Err(PluginError::not_implemented())
    }

    async fn disconnect_from_device(&self) -> Result<StatusResponse, PluginError> {
        Err(PluginError::not_implemented())
    }

    async fn send_data_to_device(&self, _options: SendDataOptions) -> Result<StatusResponse, PluginError> {
        Err(PluginError::not_implemented())
    }

    async fn start_scanning_devices(&self) -> Result<ScanResponse, PluginError> {
        Err(PluginError::not_implemented())
    }

    async fn stop_scanning_devices(&self) -> Result<ScanResponse, PluginError> {
        Err(PluginError::not_implemented())
    }

    fn describe(&self) -> PluginInfo {
        PluginInfo {
            platform: "Web".to_string(),
            registration_name: self.registration_name.clone(),
            hardware: false,
        }
    }
}
