//! Logging setup
//!
//! Installs a `tracing` subscriber once per process. On Android, messages
//! are also routed to logcat through `android_logger`.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber; later calls are ignored
pub fn init_logging(level: Option<&str>) {
    let level = parse_log_level(level);

    #[cfg(feature = "android")]
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(to_level_filter(level))
            .with_tag("Laird"),
    );

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub fn parse_log_level(level: Option<&str>) -> tracing::Level {
    match level.map(str::to_ascii_lowercase).as_deref() {
        Some("trace") => tracing::Level::TRACE,
        Some("debug") => tracing::Level::DEBUG,
        Some("info") => tracing::Level::INFO,
        Some("warn") => tracing::Level::WARN,
        Some("error") => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

#[cfg(feature = "android")]
fn to_level_filter(level: tracing::Level) -> log::LevelFilter {
    match level {
        tracing::Level::TRACE => log::LevelFilter::Trace,
        tracing::Level::DEBUG => log::LevelFilter::Debug,
        tracing::Level::INFO => log::LevelFilter::Info,
        tracing::Level::WARN => log::LevelFilter::Warn,
        _ => log::LevelFilter::Error,
    }
}
