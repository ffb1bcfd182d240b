//! Capability resolver
//!
//! Decides once which implementation answers for a registration name. A
//! registered native implementation wins; otherwise a single web fallback is
//! built lazily. The binding never changes afterwards.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::web::WebFallback;
use super::{BluetoothPlugin, PluginError};

/// Which kind of implementation is bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Native,
    WebFallback,
}

/// Factory producing the fallback implementation
pub type FallbackFactory = Box<dyn Fn(&str) -> Arc<dyn BluetoothPlugin> + Send + Sync>;

/// Factory producing the native implementation on first use
pub type NativeFactory = Box<dyn Fn() -> Result<Arc<dyn BluetoothPlugin>, PluginError> + Send + Sync>;

#[derive(Clone)]
struct Binding {
    kind: BindingKind,
    plugin: Arc<dyn BluetoothPlugin>,
}

/// Binds a registration name to exactly one implementation
pub struct CapabilityResolver {
    registration_name: String,
    native: Option<NativeFactory>,
    fallback: Option<FallbackFactory>,
    bound: OnceCell<Binding>,
}

impl CapabilityResolver {
    /// Resolver with the default web fallback and no native implementation
    pub fn new(registration_name: impl Into<String>) -> Self {
        Self {
            registration_name: registration_name.into(),
            native: None,
            fallback: Some(Box::new(|name: &str| {
                Arc::new(WebFallback::new(name)) as Arc<dyn BluetoothPlugin>
            })),
            bound: OnceCell::new(),
        }
    }

    /// Register an already constructed native implementation
    pub fn with_native(self, plugin: Arc<dyn BluetoothPlugin>) -> Self {
        self.with_native_factory(move || Ok(Arc::clone(&plugin)))
    }

    /// Register a native implementation built on first resolution
    pub fn with_native_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn BluetoothPlugin>, PluginError> + Send + Sync + 'static,
    {
        self.native = Some(Box::new(factory));
        self
    }

    /// Replace the fallback factory
    pub fn with_fallback<F>(mut self, factory: F) -> Self
    where
        F: Fn(&str) -> Arc<dyn BluetoothPlugin> + Send + Sync + 'static,
    {
        self.fallback = Some(Box::new(factory));
        self
    }

    /// Forbid the fallback; resolution then fails without a native implementation
    pub fn without_fallback(mut self) -> Self {
        self.fallback = None;
        self
    }

    pub fn registration_name(&self) -> &str {
        &self.registration_name
    }

    /// Return the bound implementation, binding it on first use
    ///
    /// Safe to call concurrently: the factories run at most once.
    pub fn resolve(&self) -> Result<Arc<dyn BluetoothPlugin>, PluginError> {
        self.bound
            .get_or_try_init(|| self.bind())
            .map(|binding| Arc::clone(&binding.plugin))
    }

    /// Kind of the current binding, `None` before first resolution
    pub fn binding_kind(&self) -> Option<BindingKind> {
        self.bound.get().map(|binding| binding.kind)
    }

    fn bind(&self) -> Result<Binding, PluginError> {
        if let Some(native) = &self.native {
            let plugin = native()?;
            tracing::info!("Plugin {} bound to native implementation", self.registration_name);
            return Ok(Binding {
                kind: BindingKind::Native,
                plugin,
            });
        }

        if let Some(fallback) = &self.fallback {
            let plugin = fallback(&self.registration_name);
            tracing::info!("Plugin {} bound to web fallback", self.registration_name);
            return Ok(Binding {
                kind: BindingKind::WebFallback,
                plugin,
            });
        }

        tracing::error!("No implementation available for plugin {}", self.registration_name);
        Err(PluginError::BridgeUnavailable(format!(
            "No implementation registered for {}",
            self.registration_name
        )))
    }
}
