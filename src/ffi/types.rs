//! FFI data types and JSON envelopes (v1)
//!
//! Everything crossing the FFI boundary is JSON. Results are wrapped in an
//! `{ok, data}` / `{ok, code, message}` envelope so hosts can branch on `ok`
//! without knowing the payload shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::plugin::events::PluginEvent;
use crate::plugin::PluginError;

/// Version 1 of the FFI protocol
pub const FFI_VERSION: u32 = 1;

// ============================================================================
// Result envelope
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FfiResult<T> {
    Ok { ok: bool, data: T },
    Err { ok: bool, code: String, message: String },
}

impl<T> FfiResult<T> {
    pub fn success(data: T) -> Self {
        FfiResult::Ok { ok: true, data }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        FfiResult::Err {
            ok: false,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, FfiResult::Ok { .. })
    }
}

impl<T> From<Result<T, PluginError>> for FfiResult<T> {
    fn from(result: Result<T, PluginError>) -> Self {
        match result {
            Ok(data) => FfiResult::success(data),
            Err(e) => FfiResult::error(e.code(), e.to_string()),
        }
    }
}

impl<T: Serialize> FfiResult<T> {
    /// Serialize the envelope; falls back to a fixed error envelope
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"ok":false,"code":"SERIALIZATION_ERROR","message":"Serialization failed"}"#.to_string()
        })
    }
}

// ============================================================================
// Version and events
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub crate_version: String,
    pub contract_version: u32,
    pub ffi_version: u32,
}

impl VersionInfo {
    pub fn current() -> Self {
        Self {
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            contract_version: crate::plugin::CONTRACT_VERSION,
            ffi_version: FFI_VERSION,
        }
    }
}

/// Plugin event queued for the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FfiEvent {
    /// Wire name, e.g. "deviceFoundEvent"
    pub name: String,
    pub payload: Value,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl FfiEvent {
    pub fn from_event(event: &PluginEvent) -> Result<Self, PluginError> {
        let (name, payload) = event.to_wire()?;
        Ok(Self {
            name: name.to_string(),
            payload,
            timestamp: chrono::Utc::now().timestamp_millis(),
        })
    }
}
