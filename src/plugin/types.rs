//! Value shapes exchanged through the plugin contract
//!
//! Field names follow the JSON shapes the host runtime sees, so every type
//! here serializes directly onto the bridge boundary.

use serde::{Deserialize, Serialize};

use super::PluginError;

// ============================================================================
// Event payloads
// ============================================================================

/// Discovered peripheral descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    /// Device category as reported by the platform
    #[serde(rename = "type")]
    pub device_type: i32,
    /// Hardware address, unique within one discovery session
    pub address: String,
    /// Received signal strength
    pub rssi: i32,
}

/// Payload received from the connected device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceData {
    pub data: String,
}

// ============================================================================
// Operation options
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryOptions {
    /// Restart the radio scan every scan interval until the session ends
    #[serde(default)]
    pub periodically: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectOptions {
    pub address: String,
}

impl ConnectOptions {
    pub fn new(address: impl Into<String>) -> Self {
        Self { address: address.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendDataOptions {
    pub data: String,
}

impl SendDataOptions {
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoOptions {
    #[serde(default)]
    pub value: String,
}

// ============================================================================
// Operation results
// ============================================================================

/// Result of connect, disconnect, send and discovery operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn new(status: impl Into<String>) -> Self {
        Self { status: status.into() }
    }
}

/// Scan status codes of the scan-style operations
pub const SCAN_STATUS_CHANGED: u8 = 0;
pub const SCAN_STATUS_UNCHANGED: u8 = 1;

/// Result of the scan-style operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResponse {
    /// 0 when the scan state changed, 1 when it already was in the requested state
    pub status: u8,
    pub body: String,
}

impl ScanResponse {
    pub fn changed(body: impl Into<String>) -> Self {
        Self { status: SCAN_STATUS_CHANGED, body: body.into() }
    }

    pub fn unchanged(body: impl Into<String>) -> Self {
        Self { status: SCAN_STATUS_UNCHANGED, body: body.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoResponse {
    pub value: String,
}

// ============================================================================
// Address validation
// ============================================================================

/// Parse a `AA:BB:CC:DD:EE:FF` hardware address
pub fn parse_address(address: &str) -> Result<[u8; 6], PluginError> {
    let invalid = || PluginError::InvalidArgument(format!("Malformed device address: {:?}", address));

    let octets: Vec<&str> = address.split(':').collect();
    if octets.len() != 6 {
        return Err(invalid());
    }

    let mut bytes = [0u8; 6];
    for (slot, octet) in bytes.iter_mut().zip(octets) {
        if octet.len() != 2 {
            return Err(invalid());
        }
        let decoded = hex::decode(octet).map_err(|_| invalid())?;
        *slot = decoded[0];
    }
    Ok(bytes)
}

/// Canonical form of a device address
///
/// Accepts `AA:BB:CC:DD:EE:FF` hardware addresses and the UUID identifiers
/// Apple platforms report instead; both are returned upper-case.
pub fn normalize_address(address: &str) -> Result<String, PluginError> {
    if let Ok(bytes) = parse_address(address) {
        return Ok(bytes
            .iter()
            .map(|b| hex::encode_upper([*b]))
            .collect::<Vec<_>>()
            .join(":"));
    }

    uuid::Uuid::parse_str(address)
        .map(|id| id.hyphenated().to_string().to_uppercase())
        .map_err(|_| PluginError::InvalidArgument(format!("Malformed device address: {:?}", address)))
}
