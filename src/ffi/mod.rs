//! FFI module for platform integration
//!
//! C-compatible interfaces for host applications. It handles:
//! - Bridge lifecycle through integer handles
//! - Plugin operations dispatched by wire name with JSON options
//! - Event polling for hosts without callbacks
//! - Host-driven radio commands and events

#[cfg(feature = "android")]
pub mod android;
pub mod dispatch;
pub mod events;
pub mod handle;
#[cfg(feature = "ios")]
pub mod ios;
pub mod runtime;
pub mod types;

pub use dispatch::dispatch;
pub use events::EventQueue;
pub use handle::BridgeHandle;
pub use types::*;
