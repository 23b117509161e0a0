//! Log output for the driver binaries.
//!
//! Events go to stderr so stdout only carries the drivers' progress lines.
//! `RUST_LOG` filters them (default `info`). `SEQUENCE_LOG_JSON=1` switches
//! to one JSON object per line.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Format selected by a `SEQUENCE_LOG_JSON` value.
    pub fn from_flag(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("1") | Some("true") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }

    pub fn from_env() -> Self {
        Self::from_flag(std::env::var("SEQUENCE_LOG_JSON").ok().as_deref())
    }
}

/// Install the global subscriber using the format from the environment.
pub fn init_logging() {
    init_logging_with(LogFormat::from_env());
}

/// Install the global subscriber. Returns false if one was already set.
pub fn init_logging_with(format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_target(false).with_writer(std::io::stderr)))
        .try_init()
        .is_ok()
}
