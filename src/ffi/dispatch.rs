//! Method-name dispatch
//!
//! Hosts call operations by wire name with an optional JSON options object.
//! Missing required parameters are rejected here with the same messages the
//! native plugins use.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use super::types::FfiResult;
use crate::plugin::types::{ConnectOptions, DiscoveryOptions, EchoOptions, EchoResponse, SendDataOptions};
use crate::plugin::{methods, BluetoothPlugin, PluginError};

pub const MISSING_ADDRESS: &str = "Did not specify address parameter.";
pub const MISSING_DATA: &str = "Did not specify data parameter.";

/// Invoke `method` on `plugin` and wrap the outcome in the FFI envelope
pub async fn dispatch(plugin: &dyn BluetoothPlugin, method: &str, payload: &[u8]) -> FfiResult<Value> {
    let result = async {
        let options = parse_options(payload)?;
        invoke(plugin, method, options).await
    }
    .await;

    if let Err(e) = &result {
        tracing::debug!("{} failed: {} ({})", method, e, e.code());
    }
    result.into()
}

/// Parse the options object; an empty payload or `null` means no options
fn parse_options(payload: &[u8]) -> Result<Map<String, Value>, PluginError> {
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }

    match serde_json::from_slice::<Value>(payload)
        .map_err(|e| PluginError::InvalidArgument(format!("Malformed options: {}", e)))?
    {
        Value::Object(options) => Ok(options),
        Value::Null => Ok(Map::new()),
        other => Err(PluginError::InvalidArgument(format!(
            "Options must be a JSON object, got {}",
            other
        ))),
    }
}

fn required_string(options: &Map<String, Value>, key: &str, missing: &str) -> Result<String, PluginError> {
    options
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| PluginError::InvalidArgument(missing.to_string()))
}

fn options_as<T: DeserializeOwned>(options: Map<String, Value>) -> Result<T, PluginError> {
    serde_json::from_value(Value::Object(options))
        .map_err(|e| PluginError::InvalidArgument(format!("Malformed options: {}", e)))
}

fn to_value<T: Serialize>(value: T) -> Result<Value, PluginError> {
    Ok(serde_json::to_value(value)?)
}

async fn invoke(
    plugin: &dyn BluetoothPlugin,
    method: &str,
    options: Map<String, Value>,
) -> Result<Value, PluginError> {
    match method {
        methods::START_DISCOVERING => {
            let options: DiscoveryOptions = options_as(options)?;
            to_value(plugin.start_discovering(options).await?)
        }
        methods::CANCEL_DISCOVERING => to_value(plugin.cancel_discovering().await?),
        methods::CONNECT_TO_DEVICE => {
            let address = required_string(&options, "address", MISSING_ADDRESS)?;
            to_value(plugin.connect_to_device(ConnectOptions::new(address)).await?)
        }
        methods::DISCONNECT_FROM_DEVICE => to_value(plugin.disconnect_from_device().await?),
        methods::SEND_DATA_TO_DEVICE => {
            let data = required_string(&options, "data", MISSING_DATA)?;
            to_value(plugin.send_data_to_device(SendDataOptions::new(data)).await?)
        }
        methods::START_SCANNING_DEVICES => to_value(plugin.start_scanning_devices().await?),
        methods::STOP_SCANNING_DEVICES => to_value(plugin.stop_scanning_devices().await?),
        methods::ECHO => {
            let EchoOptions { value } = options_as(options)?;
            let value = plugin.echo(value).await?;
            to_value(EchoResponse { value })
        }
        other => Err(PluginError::UnknownMethod(other.to_string())),
    }
}
