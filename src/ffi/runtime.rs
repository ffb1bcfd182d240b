//! Async runtime management for FFI
//!
//! Maintains a single multi-threaded Tokio runtime that is initialized once
//! and used for all async operations from the FFI boundary. Session timers
//! and the radio event pump live on its worker threads.

use once_cell::sync::OnceCell;
use tokio::runtime::Runtime;

use crate::plugin::PluginError;

static RUNTIME: OnceCell<Runtime> = OnceCell::new();

/// Initialize the global async runtime; later calls are no-ops
pub fn init_runtime() -> Result<(), PluginError> {
    RUNTIME
        .get_or_try_init(|| {
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2) // Keep it lightweight for mobile hosts
                .thread_name("laird-bridge")
                .enable_all()
                .build()
        })
        .map(|_| ())
        .map_err(|e| PluginError::Platform(format!("Failed to create runtime: {}", e)))
}

/// Get a reference to the global runtime
pub fn get_runtime() -> Result<&'static Runtime, PluginError> {
    RUNTIME
        .get()
        .ok_or_else(|| PluginError::BridgeUnavailable("Runtime not initialized".to_string()))
}

/// Execute an async task on the global runtime
pub fn block_on<F: std::future::Future>(future: F) -> Result<F::Output, PluginError> {
    Ok(get_runtime()?.block_on(future))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_on_after_init() {
        init_runtime().unwrap();
        init_runtime().unwrap();
        assert_eq!(block_on(async { 7 }).unwrap(), 7);

        // Tasks spawned from inside reach the worker threads
        let reply = block_on(async { tokio::spawn(async { "done" }).await }).unwrap();
        assert_eq!(reply.unwrap(), "done");
    }
}
