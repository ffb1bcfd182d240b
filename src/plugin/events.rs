//! Plugin events and listener registry
//!
//! Events are a tagged enum; their string names only appear at the JSON
//! boundary. Delivery is fan-out: every live listener for an event kind gets
//! each occurrence once, in registration order. Nothing is queued or replayed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;

use super::types::{Device, DeviceData};
use super::PluginError;

/// Event kinds and their wire names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    DiscoveryStart,
    DiscoveryStop,
    DeviceFound,
    DeviceRecvData,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::DiscoveryStart,
        EventKind::DiscoveryStop,
        EventKind::DeviceFound,
        EventKind::DeviceRecvData,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EventKind::DiscoveryStart => "discoveryStartEvent",
            EventKind::DiscoveryStop => "discoveryStopEvent",
            EventKind::DeviceFound => "deviceFoundEvent",
            EventKind::DeviceRecvData => "deviceRecvDataEvent",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        EventKind::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An event pushed from the bound implementation to application code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginEvent {
    DiscoveryStart,
    DiscoveryStop,
    DeviceFound(Device),
    DeviceRecvData(DeviceData),
}

impl PluginEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PluginEvent::DiscoveryStart => EventKind::DiscoveryStart,
            PluginEvent::DiscoveryStop => EventKind::DiscoveryStop,
            PluginEvent::DeviceFound(_) => EventKind::DeviceFound,
            PluginEvent::DeviceRecvData(_) => EventKind::DeviceRecvData,
        }
    }

    /// Event name and JSON payload as seen by the host runtime
    pub fn to_wire(&self) -> Result<(&'static str, Value), PluginError> {
        let payload = match self {
            PluginEvent::DiscoveryStart | PluginEvent::DiscoveryStop => Value::Object(Default::default()),
            PluginEvent::DeviceFound(device) => serde_json::to_value(device)?,
            PluginEvent::DeviceRecvData(data) => serde_json::to_value(data)?,
        };
        Ok((self.kind().name(), payload))
    }

    /// Parse an event pushed by a native channel
    pub fn from_wire(name: &str, payload: Value) -> Result<Self, PluginError> {
        let kind = EventKind::from_name(name)
            .ok_or_else(|| PluginError::InvalidArgument(format!("Unknown event: {}", name)))?;

        Ok(match kind {
            EventKind::DiscoveryStart => PluginEvent::DiscoveryStart,
            EventKind::DiscoveryStop => PluginEvent::DiscoveryStop,
            EventKind::DeviceFound => PluginEvent::DeviceFound(serde_json::from_value(payload)?),
            EventKind::DeviceRecvData => PluginEvent::DeviceRecvData(serde_json::from_value(payload)?),
        })
    }
}

/// Listener callback
pub type Listener = Arc<dyn Fn(&PluginEvent) + Send + Sync + 'static>;

struct ListenerEntry {
    id: u64,
    kind: EventKind,
    callback: Listener,
}

#[derive(Default)]
struct RegistryInner {
    next_id: AtomicU64,
    listeners: Mutex<Vec<ListenerEntry>>,
}

/// Publish/subscribe registry shared by the bridge and its implementation
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    inner: Arc<RegistryInner>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for one event kind
    pub fn add_listener<F>(&self, kind: EventKind, callback: F) -> ListenerHandle
    where
        F: Fn(&PluginEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push(ListenerEntry {
            id,
            kind,
            callback: Arc::new(callback),
        });

        tracing::debug!("Registered listener {} for {}", id, kind);

        ListenerHandle {
            id,
            kind,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver an event to every listener of its kind, returns the delivery count
    ///
    /// Listeners run outside the registry lock, so a callback may add or
    /// remove listeners; such changes apply from the next event on.
    pub fn notify(&self, event: &PluginEvent) -> usize {
        let kind = event.kind();
        let targets: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .iter()
            .filter(|entry| entry.kind == kind)
            .map(|entry| Arc::clone(&entry.callback))
            .collect();

        tracing::debug!("Triggered listener {} ({} subscribers)", kind, targets.len());

        for callback in &targets {
            callback(event);
        }
        targets.len()
    }

    pub fn remove_all_listeners(&self) {
        self.inner.listeners.lock().clear();
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner
            .listeners
            .lock()
            .iter()
            .filter(|entry| entry.kind == kind)
            .count()
    }
}

/// Handle returned by [`ListenerRegistry::add_listener`]
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    id: u64,
    kind: EventKind,
    registry: Weak<RegistryInner>,
}

impl ListenerHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Unregister the listener; returns false if it was already gone
    pub fn remove(&self) -> bool {
        let Some(inner) = self.registry.upgrade() else {
            return false;
        };
        let mut listeners = inner.listeners.lock();
        let before = listeners.len();
        listeners.retain(|entry| entry.id != self.id);
        before != listeners.len()
    }
}
