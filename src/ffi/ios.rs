//! iOS C FFI interface
//!
//! C-compatible functions for Swift. Unlike Android's JNI interface, memory
//! is managed by hand: every string returned here must be freed by the
//! caller with `laird_free_string()`.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::ptr;

use super::handle::{self, BridgeHandle};
use super::runtime;
use super::types::{FfiEvent, FfiResult, VersionInfo};
use crate::config::PluginConfig;
use crate::plugin::PluginError;

const PLATFORM: &str = "iOS";

const FATAL_JSON: &str = r#"{"ok":false,"code":"PLATFORM_ERROR","message":"String conversion failed"}"#;

fn into_c_string(json: String) -> *mut c_char {
    CString::new(json)
        .or_else(|_| CString::new(FATAL_JSON))
        .map(CString::into_raw)
        .unwrap_or(ptr::null_mut())
}

fn create_result_string(result: Result<String, PluginError>) -> *mut c_char {
    let json = match result {
        Ok(json) => json,
        Err(e) => FfiResult::<()>::from(Err(e)).to_json(),
    };
    into_c_string(json)
}

/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
unsafe fn c_str_to_string(ptr: *const c_char) -> Result<String, PluginError> {
    if ptr.is_null() {
        return Err(PluginError::InvalidArgument("Null pointer".to_string()));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map(str::to_string)
        .map_err(|e| PluginError::InvalidArgument(format!("Invalid UTF-8: {}", e)))
}

/// Free a string returned by any `laird_*` function
///
/// # Safety
/// `ptr` must come from this library and must not be freed twice.
#[no_mangle]
pub unsafe extern "C" fn laird_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

/// Create a bridge from a JSON config (null for defaults); returns -1 on failure
///
/// # Safety
/// `config_json` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn laird_init(config_json: *const c_char) -> i64 {
    let result: Result<i64, PluginError> = (|| {
        runtime::init_runtime()?;

        let config = if config_json.is_null() {
            PluginConfig::default()
        } else {
            let json = c_str_to_string(config_json)?;
            PluginConfig::from_json(json.as_bytes()).map_err(|e| PluginError::InvalidArgument(e.to_string()))?
        };

        if config.enable_logging {
            crate::logging::init_logging(config.log_level.as_deref());
        }

        let handle = handle::register(BridgeHandle::new(config, PLATFORM)?);
        tracing::info!("Laird bridge initialized with handle {}", handle);
        Ok(handle)
    })();

    result.unwrap_or_else(|e| {
        tracing::error!("Failed to initialize bridge: {}", e);
        -1
    })
}

#[no_mangle]
pub extern "C" fn laird_version() -> *mut c_char {
    into_c_string(FfiResult::success(VersionInfo::current()).to_json())
}

#[no_mangle]
pub extern "C" fn laird_shutdown(handle: i64) {
    if handle::release(handle) {
        tracing::info!("Shut down bridge handle {}", handle);
    }
}

/// Invoke a plugin operation by wire name
///
/// # Safety
/// `method` must be a NUL-terminated string; `payload_json` may be null.
#[no_mangle]
pub unsafe extern "C" fn laird_invoke(
    handle: i64,
    method: *const c_char,
    payload_json: *const c_char,
) -> *mut c_char {
    let result = (|| {
        let bridge = handle::get(handle)?;
        let method = c_str_to_string(method)?;
        let payload = if payload_json.is_null() {
            String::new()
        } else {
            c_str_to_string(payload_json)?
        };
        runtime::block_on(async { bridge.invoke(&method, payload.as_bytes()).await })
    })();

    create_result_string(result)
}

#[no_mangle]
pub extern "C" fn laird_poll_events(handle: i64, max: c_int) -> *mut c_char {
    let result = handle::get(handle).map(|bridge| {
        let events = bridge.poll_events(max.max(0) as usize);
        FfiResult::<Vec<FfiEvent>>::success(events).to_json()
    });
    create_result_string(result)
}

/// Next radio command as JSON, or null when none is pending
#[no_mangle]
pub extern "C" fn laird_next_radio_command(handle: i64) -> *mut c_char {
    let command = handle::get(handle)
        .ok()
        .and_then(|bridge| bridge.next_radio_command())
        .and_then(|command| serde_json::to_string(&command).ok());

    match command {
        Some(json) => into_c_string(json),
        None => ptr::null_mut(),
    }
}

/// # Safety
/// `event_json` must be a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn laird_push_radio_event(handle: i64, event_json: *const c_char) -> *mut c_char {
    let result = (|| {
        let bridge = handle::get(handle)?;
        let json = c_str_to_string(event_json)?;
        bridge.push_radio_event(json.as_bytes())?;
        Ok(FfiResult::success(()).to_json())
    })();

    create_result_string(result)
}
