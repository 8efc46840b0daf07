//! Logging and tracing utilities for the container engine
//!
//! Structured logging goes through `tracing`. Binaries install a subscriber
//! once; library code only emits events.

use std::sync::atomic::{AtomicBool, Ordering};

/// Whether tracing has been initialized
static TRACING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize the default tracing subscriber
///
/// Multiple calls are safe; only the first one installs a subscriber.
pub fn init_default() {
    init_with_config(TracingConfig::default());
}

/// Initialize tracing with a custom configuration
pub fn init_with_config(config: TracingConfig) {
    if TRACING_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
        .is_ok()
    {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.default_level));

        let fmt_layer = fmt::layer()
            .with_target(config.show_target)
            .with_file(config.show_file)
            .with_line_number(config.show_line_number);

        // A host application may already own the global subscriber.
        let _ = tracing_subscriber::registry()
            .with(fmt_layer)
            .with(filter)
            .try_init();
    }
}

/// Whether [`init_default`] or [`init_with_config`] already ran
pub fn is_initialized() -> bool {
    TRACING_INITIALIZED.load(Ordering::Relaxed)
}

/// Configuration for tracing initialization
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Default log level filter (e.g., "info", "debug", "warn")
    pub default_level: String,
    /// Show the target (module path) in log output
    pub show_target: bool,
    /// Show source file in log output
    pub show_file: bool,
    /// Show line number in log output
    pub show_line_number: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: "warn,ndpak=info,ndpak_parsers=info".to_string(),
            show_target: true,
            show_file: false,
            show_line_number: false,
        }
    }
}

/// Macros for common logging patterns
#[macro_export]
macro_rules! log_parse_start {
    ($parser:expr, $path:expr) => {
        tracing::info!(
            parser = %$parser,
            path = %$path.display(),
            "Starting parse"
        );
    };
}

#[macro_export]
macro_rules! log_parse_complete {
    ($parser:expr, $duration:expr, $items:expr) => {
        tracing::info!(
            parser = %$parser,
            duration_ms = %$duration.as_millis(),
            items = %$items,
            "Parse complete"
        );
    };
}

#[macro_export]
macro_rules! log_parse_error {
    ($parser:expr, $error:expr) => {
        tracing::error!(
            parser = %$parser,
            error = %$error,
            "Parse failed"
        );
    };
}

/// Run `f` inside a `parse` span and log how long it took
pub fn instrument_parse<T, F>(name: &str, f: F) -> T
where
    F: FnOnce() -> T,
{
    let span = tracing::info_span!("parse", parser = %name);
    let _guard = span.enter();

    let start = std::time::Instant::now();
    let result = f();
    let duration = start.elapsed();

    tracing::debug!(duration_ms = %duration.as_millis(), "Parse operation complete");

    result
}
