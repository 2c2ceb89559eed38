//! Tracing subscriber setup for the `viewsync` binary.
//!
//! Controlled by `VIEWSYNC_LOG_FORMAT`:
//! - unset or `"pretty"` → human-readable events to stderr
//! - `"json"` → JSON events to stderr, one span-close record per operation
//! - `"off"` → no subscriber installed
//!
//! Filtering follows `RUST_LOG` (default `info`).

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Output format for log events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
    Off,
}

impl LogFormat {
    /// Read `VIEWSYNC_LOG_FORMAT`, falling back to [`LogFormat::Pretty`] for
    /// unknown values.
    #[must_use]
    pub fn from_env() -> Self {
        std::env::var("VIEWSYNC_LOG_FORMAT")
            .map(|v| Self::parse(&v))
            .unwrap_or(Self::Pretty)
    }

    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "off" | "none" => Self::Off,
            _ => Self::Pretty,
        }
    }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init() {
    init_with(LogFormat::from_env());
}

/// Install the global subscriber with an explicit format.
pub fn init_with(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // `try_init` fails only when a subscriber is already set, which is fine.
    let _ = match format {
        LogFormat::Off => return,
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init(),
    };
}
