//! Unit tests for individual Laird bridge components

#[cfg(test)]
mod fallback_tests {
    use laird_bridge::plugin::types::{ConnectOptions, DiscoveryOptions, SendDataOptions};
    use laird_bridge::plugin::web::WebFallback;
    use laird_bridge::plugin::{BluetoothPlugin, PluginError};

    fn assert_rejected<T: std::fmt::Debug>(result: Result<T, PluginError>) {
        match result {
            Err(e @ PluginError::UnsupportedPlatform(_)) => {
                assert!(!e.to_string().is_empty());
                assert!(e.to_string().contains("web"));
            }
            other => panic!("expected UnsupportedPlatform, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_every_hardware_operation_rejected() {
        let plugin = WebFallback::new("Laird");

        assert_rejected(plugin.start_discovering(DiscoveryOptions::default()).await);
        assert_rejected(plugin.start_discovering(DiscoveryOptions { periodically: true }).await);
        assert_rejected(plugin.cancel_discovering().await);
        assert_rejected(plugin.connect_to_device(ConnectOptions::new("AA:BB:CC:DD:EE:FF")).await);
        assert_rejected(plugin.disconnect_from_device().await);
        assert_rejected(plugin.send_data_to_device(SendDataOptions::new("hello")).await);
        assert_rejected(plugin.start_scanning_devices().await);
        assert_rejected(plugin.stop_scanning_devices().await);
    }

    #[tokio::test]
    async fn test_echo_is_identity() {
        let plugin = WebFallback::new("Laird");
        for value in ["", "hello", "\u{0}\r\n\t", "Tag1 ✓"] {
            assert_eq!(plugin.echo(value.to_string()).await.unwrap(), value);
        }
    }

    #[test]
    fn test_describe() {
        let info = WebFallback::new("Laird").describe();
        assert_eq!(info.platform, "Web");
        assert!(!info.hardware);
    }
}

#[cfg(test)]
mod listener_tests {
    use std::sync::Arc;

    use laird_bridge::plugin::events::{EventKind, ListenerRegistry, PluginEvent};
    use laird_bridge::plugin::types::Device;
    use parking_lot::Mutex;

    fn tag1() -> Device {
        Device {
            name: "Tag1".to_string(),
            device_type: 0,
            address: "11:22:33:44:55:66".to_string(),
            rssi: -60,
        }
    }

    #[test]
    fn test_two_listeners_each_receive_once_in_order() {
        let registry = ListenerRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for id in ["first", "second"] {
            let order = Arc::clone(&order);
            registry.add_listener(EventKind::DeviceFound, move |event| {
                order.lock().push((id, event.clone()));
            });
        }

        let delivered = registry.notify(&PluginEvent::DeviceFound(tag1()));
        assert_eq!(delivered, 2);
        assert_eq!(
            *order.lock(),
            vec![
                ("first", PluginEvent::DeviceFound(tag1())),
                ("second", PluginEvent::DeviceFound(tag1())),
            ]
        );
    }

    #[test]
    fn test_removed_listener_gets_nothing() {
        let registry = ListenerRegistry::new();
        let count = Arc::new(Mutex::new(0));

        let c = Arc::clone(&count);
        let handle = registry.add_listener(EventKind::DiscoveryStart, move |_| *c.lock() += 1);
        registry.notify(&PluginEvent::DiscoveryStart);
        assert!(handle.remove());
        registry.notify(&PluginEvent::DiscoveryStart);

        assert_eq!(*count.lock(), 1);
        assert_eq!(registry.listener_count(EventKind::DiscoveryStart), 0);
    }

    #[test]
    fn test_wire_payload_reaches_listener_unchanged() {
        let registry = ListenerRegistry::new();
        let seen = Arc::new(Mutex::new(None));

        let s = Arc::clone(&seen);
        registry.add_listener(EventKind::DeviceFound, move |event| {
            if let PluginEvent::DeviceFound(device) = event {
                *s.lock() = Some(device.clone());
            }
        });

        let event = PluginEvent::from_wire(
            "deviceFoundEvent",
            serde_json::json!({"name": "Tag1", "type": 0, "address": "11:22:33:44:55:66", "rssi": -60}),
        )
        .unwrap();
        registry.notify(&event);

        assert_eq!(*seen.lock(), Some(tag1()));
    }
}

#[cfg(test)]
mod resolver_tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use laird_bridge::plugin::resolver::{BindingKind, CapabilityResolver};
    use laird_bridge::plugin::web::WebFallback;
    use laird_bridge::plugin::BluetoothPlugin;

    #[test]
    fn test_concurrent_resolution_builds_one_fallback() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let resolver = Arc::new(CapabilityResolver::new("Laird").with_fallback(move |name| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(5));
            Arc::new(WebFallback::new(name)) as Arc<dyn BluetoothPlugin>
        }));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let resolver = Arc::clone(&resolver);
                std::thread::spawn(move || resolver.resolve().unwrap())
            })
            .collect();
        let plugins: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();

        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert!(plugins.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(resolver.binding_kind(), Some(BindingKind::WebFallback));
    }
}

#[cfg(test)]
mod config_tests {
    use laird_bridge::config::PluginConfig;

    #[test]
    fn test_host_config_json() {
        let config = PluginConfig::from_json(
            br#"{"registration_name": "Main", "allow_web_fallback": false, "log_level": "debug"}"#,
        )
        .unwrap();
        assert_eq!(config.registration_name, "Main");
        assert!(!config.allow_web_fallback);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.scan_timeout_ms, 30_000);
    }

    #[test]
    fn test_empty_registration_name_rejected() {
        assert!(PluginConfig::from_json(br#"{"registration_name": "  "}"#).is_err());
    }
}

#[cfg(test)]
mod address_tests {
    use laird_bridge::plugin::types::normalize_address;
    use laird_bridge::plugin::PluginError;

    #[test]
    fn test_malformed_addresses_rejected() {
        for address in ["", "AA:BB", "AA-BB-CC-DD-EE-FF", "GG:BB:CC:DD:EE:FF"] {
            assert!(matches!(normalize_address(address), Err(PluginError::InvalidArgument(_))));
        }
    }
}
