//! Unified structured logging.
//!
//! Compact timestamped logging via `tracing` + `tracing-subscriber`, with
//! `RUST_LOG` taking precedence over the configured level when set.
//!
//! ```bash
//! RUST_LOG=debug graphkeep index .
//! RUST_LOG=graphkeep::indexer=trace graphkeep serve
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Initialize logging with configuration. Safe to call multiple times;
/// only the first call takes effect.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(config.level.clone())
        };

        if config.json {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_timer(CompactTime)
                .with_filter(filter);
            tracing_subscriber::registry().with(fmt_layer).init();
        } else {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_timer(CompactTime)
                .with_level(true)
                .with_filter(filter);
            tracing_subscriber::registry().with(fmt_layer).init();
        }
    });
}

/// Initialize logging with default configuration (`info`, plain text).
pub fn init() {
    init_with_config(&LoggingConfig::default());
}

/// Log an event with component context: `log_event!("indexer", "full-index", "{} files", n)`.
#[macro_export]
macro_rules! log_event {
    ($component:expr, $event:expr) => {
        tracing::info!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

/// Debug-only event logging, same shape as `log_event!`.
#[macro_export]
macro_rules! debug_event {
    ($component:expr, $event:expr) => {
        tracing::debug!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}
