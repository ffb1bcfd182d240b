//! Host-driven radio backend
//!
//! The host platform (Android, iOS) owns the real Bluetooth stack. Radio
//! primitives requested by the session are queued as [`RadioCommand`]s that
//! the host drains and executes, and the host reports what the radio does by
//! pushing [`RadioEvent`]s back in.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::{RadioBackend, RadioEvent};
use crate::plugin::PluginError;

// On Android, mirror messages to log::debug! so they reach logcat through
// android_logger; elsewhere just use tracing.
#[cfg(feature = "android")]
macro_rules! h_debug {
    ($($arg:tt)*) => {{
        tracing::debug!($($arg)*);
        log::debug!($($arg)*);
    }};
}
#[cfg(not(feature = "android"))]
macro_rules! h_debug {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*);
    };
}

#[cfg(feature = "android")]
macro_rules! h_warn {
    ($($arg:tt)*) => {{
        tracing::warn!($($arg)*);
        log::warn!($($arg)*);
    }};
}
#[cfg(not(feature = "android"))]
macro_rules! h_warn {
    ($($arg:tt)*) => {
        tracing::warn!($($arg)*);
    };
}

/// Commands the host has not drained yet before new ones are refused
pub const MAX_PENDING_COMMANDS: usize = 256;

/// Radio primitive for the host to execute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum RadioCommand {
    StartScan,
    StopScan,
    Connect { address: String },
    Disconnect { address: String },
    /// Payload chunk, base64 encoded
    Write { data: String },
}

impl RadioCommand {
    /// Decoded payload of a `Write` command
    pub fn payload(&self) -> Option<Vec<u8>> {
        match self {
            RadioCommand::Write { data } => BASE64.decode(data).ok(),
            _ => None,
        }
    }
}

/// [`RadioBackend`] whose radio lives in the host application
pub struct HostRadio {
    platform: String,
    commands: Mutex<VecDeque<RadioCommand>>,
    enabled: AtomicBool,
    permission_granted: AtomicBool,
    events_tx: mpsc::UnboundedSender<RadioEvent>,
}

impl HostRadio {
    /// Create the radio and the event stream to hand to the session
    ///
    /// The adapter is assumed enabled with permissions granted until the
    /// host reports otherwise through an `adapterState` event.
    pub fn new(platform: impl Into<String>) -> (Arc<Self>, mpsc::UnboundedReceiver<RadioEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let radio = Arc::new(Self {
            platform: platform.into(),
            commands: Mutex::new(VecDeque::new()),
            enabled: AtomicBool::new(true),
            permission_granted: AtomicBool::new(true),
            events_tx,
        });
        (radio, events_rx)
    }

    /// Next command for the host to execute
    pub fn next_command(&self) -> Option<RadioCommand> {
        self.commands.lock().pop_front()
    }

    pub fn pending_commands(&self) -> usize {
        self.commands.lock().len()
    }

    /// Report a radio event from the host
    pub fn push_event(&self, event: RadioEvent) -> Result<(), PluginError> {
        if let RadioEvent::AdapterState { enabled, permission_granted } = &event {
            self.enabled.store(*enabled, Ordering::SeqCst);
            self.permission_granted.store(*permission_granted, Ordering::SeqCst);
        }

        h_debug!("Radio event from host: {:?}", event);
        self.events_tx
            .send(event)
            .map_err(|_| PluginError::BridgeUnavailable("Serial session has shut down".to_string()))
    }

    /// Report a radio event encoded as JSON
    pub fn push_event_json(&self, json: &[u8]) -> Result<(), PluginError> {
        let event: RadioEvent = serde_json::from_slice(json)
            .map_err(|e| PluginError::InvalidArgument(format!("Malformed radio event: {}", e)))?;
        self.push_event(event)
    }

    fn enqueue(&self, command: RadioCommand) -> Result<(), PluginError> {
        let mut commands = self.commands.lock();
        if commands.len() >= MAX_PENDING_COMMANDS {
            h_warn!("Radio command queue full ({} pending), dropping {:?}", commands.len(), command);
            return Err(PluginError::Platform("Radio command queue is full".to_string()));
        }
        h_debug!("Queued radio command {:?}", command);
        commands.push_back(command);
        Ok(())
    }
}

#[async_trait]
impl RadioBackend for HostRadio {
    fn platform(&self) -> &str {
        &self.platform
    }

    async fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    async fn has_scan_permission(&self) -> bool {
        self.permission_granted.load(Ordering::SeqCst)
    }

    async fn start_scan(&self) -> Result<(), PluginError> {
        self.enqueue(RadioCommand::StartScan)
    }

    async fn stop_scan(&self) -> Result<(), PluginError> {
        self.enqueue(RadioCommand::StopScan)
    }

    async fn connect(&self, address: &str) -> Result<(), PluginError> {
        self.enqueue(RadioCommand::Connect { address: address.to_string() })
    }

    async fn disconnect(&self, address: &str) -> Result<(), PluginError> {
        self.enqueue(RadioCommand::Disconnect { address: address.to_string() })
    }

    async fn write(&self, chunk: &[u8]) -> Result<(), PluginError> {
        self.enqueue(RadioCommand::Write { data: BASE64.encode(chunk) })
    }
}
