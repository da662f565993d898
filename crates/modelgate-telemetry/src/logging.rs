//! Structured logging setup.

use modelgate_config::{LogFormat, LoggingConfig};
use thiserror::Error;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Logging initialization errors
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The level filter string could not be parsed
    #[error("Invalid log filter '{filter}': {source}")]
    InvalidFilter {
        /// The filter string that failed to parse
        filter: String,
        /// Parse error from the filter layer
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    /// A global subscriber is already installed
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global tracing subscriber.
///
/// The filter honors `RUST_LOG` when set, falling back to the
/// configured level.
///
/// # Errors
/// Returns an error if the filter is invalid or a subscriber is
/// already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(env_directive) => {
            EnvFilter::try_new(&env_directive).map_err(|source| LoggingError::InvalidFilter {
                filter: env_directive,
                source,
            })?
        }
        Err(_) => {
            EnvFilter::try_new(&config.level).map_err(|source| LoggingError::InvalidFilter {
                filter: config.level.clone(),
                source,
            })?
        }
    };

    let format_layer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(format_layer)
        .try_init()?;

    Ok(())
}
