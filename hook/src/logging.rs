use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogFormat;
use crate::error::HookError;

const FILTER_ENV: &str = "NCUNIT_LOG";

/// Installs the global subscriber. Logs go to stderr; stdout is reserved
/// for the report. `log` records from the library are bridged in.
pub fn init(format: LogFormat) -> Result<(), HookError> {
    LogTracer::init().map_err(|e| HookError::Logging(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(filter());

    let installed = match format {
        LogFormat::Text => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().with_writer(std::io::stderr)),
        ),
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            ),
        ),
    };
    installed.map_err(|e| HookError::Logging(e.to_string()))
}

/// `NCUNIT_LOG` wins over `RUST_LOG`; without either, `info`.
fn filter() -> EnvFilter {
    EnvFilter::try_from_env(FILTER_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
