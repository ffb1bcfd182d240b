//! Bridge instances owned by FFI hosts
//!
//! A [`BridgeHandle`] bundles the plugin context with the host-driven radio
//! and the event queue the host polls. Hosts refer to instances by the
//! integer handle returned from [`register`].

use std::sync::Arc;

use parking_lot::Mutex;

use super::dispatch::dispatch;
use super::events::EventQueue;
use super::types::{FfiEvent, FfiResult};
use crate::config::PluginConfig;
use crate::plugin::events::ListenerHandle;
use crate::plugin::PluginError;
use crate::session::host::{HostRadio, RadioCommand};
use crate::LairdBridge;

// Global table of bridge instances; released slots stay `None` so handles are never reused
// The table grows by one slot per bridge created over the life of the process
lazy_static::lazy_static! {
    static ref HANDLES: Mutex<Vec<Option<Arc<BridgeHandle>>>> = Mutex::new(Vec::new());
}

pub struct BridgeHandle {
    bridge: LairdBridge,
    radio: Arc<HostRadio>,
    events: EventQueue,
    _listeners: Vec<ListenerHandle>,
}

impl BridgeHandle {
    /// Bridge whose serial session drives a host-owned radio
    pub fn new(config: PluginConfig, platform: &str) -> Result<Self, PluginError> {
        let (radio, radio_events) = HostRadio::new(platform);
        let bridge = LairdBridge::builder()
            .config(config)
            .radio(radio.clone(), radio_events)
            .build()?;

        let events = EventQueue::new();
        let listeners = events.attach(bridge.events());

        Ok(Self {
            bridge,
            radio,
            events,
            _listeners: listeners,
        })
    }

    pub fn bridge(&self) -> &LairdBridge {
        &self.bridge
    }

    pub fn radio(&self) -> &Arc<HostRadio> {
        &self.radio
    }

    /// Run an operation by wire name; returns the JSON envelope
    pub async fn invoke(&self, method: &str, payload: &[u8]) -> String {
        match self.bridge.plugin() {
            Ok(plugin) => dispatch(plugin.as_ref(), method, payload).await.to_json(),
            Err(e) => FfiResult::<()>::from(Err(e)).to_json(),
        }
    }

    pub fn poll_events(&self, max: usize) -> Vec<FfiEvent> {
        self.events.drain(max)
    }

    pub fn next_radio_command(&self) -> Option<RadioCommand> {
        self.radio.next_command()
    }

    pub fn push_radio_event(&self, json: &[u8]) -> Result<(), PluginError> {
        self.radio.push_event_json(json)
    }
}

/// Store a bridge and return its handle
pub fn register(handle: BridgeHandle) -> i64 {
    let mut handles = HANDLES.lock();
    handles.push(Some(Arc::new(handle)));
    (handles.len() - 1) as i64
}

pub fn get(handle: i64) -> Result<Arc<BridgeHandle>, PluginError> {
    let handles = HANDLES.lock();
    usize::try_from(handle)
        .ok()
        .and_then(|index| handles.get(index))
        .and_then(|slot| slot.clone())
        .ok_or_else(|| PluginError::BridgeUnavailable(format!("Invalid handle: {}", handle)))
}

/// Drop a bridge; returns false for unknown or already released handles
pub fn release(handle: i64) -> bool {
    let released = {
        let mut handles = HANDLES.lock();
        usize::try_from(handle)
            .ok()
            .and_then(|index| handles.get_mut(index))
            .and_then(Option::take)
    };
    // Dropped outside the table lock
    released.is_some()
}
