//! Event queue drained by the host
//!
//! Hosts that cannot receive callbacks across the FFI boundary poll plugin
//! events instead. The queue listens to every event kind and keeps the most
//! recent events up to a fixed bound.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::types::FfiEvent;
use crate::plugin::events::{EventKind, ListenerHandle, ListenerRegistry};

/// Events kept before the oldest are dropped
pub const MAX_QUEUED_EVENTS: usize = 1024;

#[derive(Clone, Default)]
pub struct EventQueue {
    events: Arc<Mutex<VecDeque<FfiEvent>>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe the queue to every event kind of `registry`
    pub fn attach(&self, registry: &ListenerRegistry) -> Vec<ListenerHandle> {
        EventKind::ALL
            .into_iter()
            .map(|kind| {
                let queue = self.clone();
                registry.add_listener(kind, move |event| match FfiEvent::from_event(event) {
                    Ok(event) => queue.push(event),
                    Err(e) => tracing::error!("Dropping {} event: {}", kind, e),
                })
            })
            .collect()
    }

    pub fn push(&self, event: FfiEvent) {
        let mut events = self.events.lock();
        if events.len() >= MAX_QUEUED_EVENTS {
            if let Some(dropped) = events.pop_front() {
                tracing::warn!("Event queue full, dropping oldest {}", dropped.name);
            }
        }
        events.push_back(event);
    }

    /// Remove and return up to `max` events, oldest first
    pub fn drain(&self, max: usize) -> Vec<FfiEvent> {
        let mut events = self.events.lock();
        let count = max.min(events.len());
        events.drain(..count).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::events::PluginEvent;
    use crate::plugin::types::DeviceData;

    #[test]
    fn test_queue_collects_all_kinds() {
        let registry = ListenerRegistry::new();
        let queue = EventQueue::new();
        let handles = queue.attach(&registry);
        assert_eq!(handles.len(), 4);

        registry.notify(&PluginEvent::DiscoveryStart);
        registry.notify(&PluginEvent::DeviceRecvData(DeviceData { data: "ok".to_string() }));

        let events = queue.drain(10);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name, "discoveryStartEvent");
        assert_eq!(events[1].payload, serde_json::json!({"data": "ok"}));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_respects_max() {
        let registry = ListenerRegistry::new();
        let queue = EventQueue::new();
        queue.attach(&registry);
        for _ in 0..3 {
            registry.notify(&PluginEvent::DiscoveryStop);
        }
        assert_eq!(queue.drain(2).len(), 2);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_oldest_dropped_when_full() {
        let registry = ListenerRegistry::new();
        let queue = EventQueue::new();
        queue.attach(&registry);

        registry.notify(&PluginEvent::DiscoveryStart);
        for _ in 0..MAX_QUEUED_EVENTS {
            registry.notify(&PluginEvent::DiscoveryStop);
        }

        assert_eq!(queue.len(), MAX_QUEUED_EVENTS);
        assert!(queue.drain(MAX_QUEUED_EVENTS).iter().all(|e| e.name == "discoveryStopEvent"));
    }
}
