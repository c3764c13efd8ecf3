//! Logging initialization using `tracing` and `tracing-subscriber`.

use std::str::FromStr;

use tracing_subscriber::{fmt, util::SubscriberInitExt, EnvFilter};

use crate::errors::{DevportError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

impl FromStr for LogFormat {
    type Err = DevportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "human" | "text" => Ok(LogFormat::Human),
            "json" => Ok(LogFormat::Json),
            other => Err(DevportError::Config(format!("Unknown log format: {}", other))),
        }
    }
}

/// Install the global subscriber, writing to stderr so command output on
/// stdout stays machine-readable. Filter comes from `RUST_LOG` (default
/// `info`). Later calls are no-ops.
pub fn init_logging(format: LogFormat) -> Result<()> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Human => {
            let _ = builder.finish().try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().finish().try_init();
        }
    };

    Ok(())
}
