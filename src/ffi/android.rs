//! Android JNI interface
//!
//! JNI bindings called from Kotlin. Every function that returns a string
//! returns a JSON envelope (see [`FfiResult`]); handles are indices into the
//! bridge table.

use jni::objects::{JByteArray, JClass, JString};
use jni::sys::{jint, jlong, jstring};
use jni::JNIEnv;

use super::handle::{self, BridgeHandle};
use super::runtime;
use super::types::{FfiEvent, FfiResult, VersionInfo};
use crate::config::PluginConfig;
use crate::plugin::PluginError;

const PLATFORM: &str = "Android";

// =============================================================================
// Initialization and lifecycle
// =============================================================================

/// Create a bridge instance from a JSON config
/// Returns its handle, or -1 on failure
#[no_mangle]
pub extern "C" fn Java_com_laird_bridge_LairdBridgeFFI_init(
    env: JNIEnv,
    _class: JClass,
    config_bytes: JByteArray,
) -> jlong {
    let result: Result<jlong, PluginError> = (|| {
        runtime::init_runtime()?;

        let config_data: Vec<u8> = env
            .convert_byte_array(&config_bytes)
            .map_err(|e| PluginError::InvalidArgument(format!("Failed to read config bytes: {}", e)))?;
        let config = if config_data.is_empty() {
            PluginConfig::default()
        } else {
            PluginConfig::from_json(&config_data).map_err(|e| PluginError::InvalidArgument(e.to_string()))?
        };

        if config.enable_logging {
            crate::logging::init_logging(config.log_level.as_deref());
        }

        let bridge = BridgeHandle::new(config, PLATFORM)?;
        let handle = handle::register(bridge);

        tracing::info!("Laird bridge initialized with handle {}", handle);
        Ok(handle)
    })();

    match result {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!("Failed to initialize bridge: {}", e);
            log::error!("Failed to initialize bridge: {}", e);
            -1
        }
    }
}

/// Crate, contract and FFI versions
#[no_mangle]
pub extern "C" fn Java_com_laird_bridge_LairdBridgeFFI_version(mut env: JNIEnv, _class: JClass) -> jstring {
    let json = FfiResult::success(VersionInfo::current()).to_json();
    create_string(&mut env, json)
}

/// Release a bridge instance
#[no_mangle]
pub extern "C" fn Java_com_laird_bridge_LairdBridgeFFI_shutdown(_env: JNIEnv, _class: JClass, handle: jlong) {
    if handle::release(handle) {
        tracing::info!("Shut down bridge handle {}", handle);
    } else {
        tracing::warn!("Shutdown of unknown bridge handle {}", handle);
    }
}

// =============================================================================
// Plugin operations and events
// =============================================================================

/// Invoke a plugin operation by wire name with a JSON options payload
#[no_mangle]
pub extern "C" fn Java_com_laird_bridge_LairdBridgeFFI_invoke(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
    method: JString,
    payload: JByteArray,
) -> jstring {
    let result = (|| {
        let bridge = handle::get(handle)?;
        let method: String = env
            .get_string(&method)
            .map_err(|e| PluginError::InvalidArgument(format!("Failed to read method: {}", e)))?
            .into();
        let payload: Vec<u8> = if payload.is_null() {
            Vec::new()
        } else {
            env.convert_byte_array(&payload)
                .map_err(|e| PluginError::InvalidArgument(format!("Failed to read payload: {}", e)))?
        };

        runtime::block_on(async { bridge.invoke(&method, &payload).await })
    })();

    create_result_string(&mut env, result)
}

/// Drain up to `max` queued plugin events as a JSON array
#[no_mangle]
pub extern "C" fn Java_com_laird_bridge_LairdBridgeFFI_pollEvents(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
    max: jint,
) -> jstring {
    let result = (|| {
        let bridge = handle::get(handle)?;
        let events = bridge.poll_events(max.max(0) as usize);
        Ok(FfiResult::<Vec<FfiEvent>>::success(events).to_json())
    })();

    create_result_string(&mut env, result)
}

// =============================================================================
// Host-driven radio
// =============================================================================

/// Next radio command for the host to execute, or null when none is pending
#[no_mangle]
pub extern "C" fn Java_com_laird_bridge_LairdBridgeFFI_nextRadioCommand(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
) -> jstring {
    let result = (|| -> Result<Option<String>, PluginError> {
        let bridge = handle::get(handle)?;
        bridge
            .next_radio_command()
            .map(|command| serde_json::to_string(&command).map_err(PluginError::from))
            .transpose()
    })();

    match result {
        Ok(Some(json)) => create_string(&mut env, json),
        Ok(None) => std::ptr::null_mut(),
        Err(e) => {
            tracing::error!("nextRadioCommand error: {}", e);
            std::ptr::null_mut()
        }
    }
}

/// Report a radio event (JSON) from the host Bluetooth stack
#[no_mangle]
pub extern "C" fn Java_com_laird_bridge_LairdBridgeFFI_pushRadioEvent(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
    event_json: JByteArray,
) -> jstring {
    let result = (|| {
        let bridge = handle::get(handle)?;
        let data: Vec<u8> = env
            .convert_byte_array(&event_json)
            .map_err(|e| PluginError::InvalidArgument(format!("Failed to read event: {}", e)))?;
        bridge.push_radio_event(&data)?;
        Ok(FfiResult::success(()).to_json())
    })();

    create_result_string(&mut env, result)
}

// =============================================================================
// Helpers
// =============================================================================

fn create_string(env: &mut JNIEnv, json: String) -> jstring {
    match env.new_string(json) {
        Ok(s) => s.into_raw(),
        Err(e) => {
            tracing::error!("Failed to create Java string: {}", e);
            std::ptr::null_mut()
        }
    }
}

fn create_result_string(env: &mut JNIEnv, result: Result<String, PluginError>) -> jstring {
    let json = match result {
        Ok(json) => json,
        Err(e) => FfiResult::<()>::from(Err(e)).to_json(),
    };
    create_string(env, json)
}
