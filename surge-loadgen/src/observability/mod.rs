//! # Observability
//!
//! Structured logging setup for the `surge` binary. `RUST_LOG` overrides the default
//! `info` filter.

use serde::{Deserialize, Serialize};
use tracing::Subscriber;
use tracing_subscriber::{
    layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Filter from `RUST_LOG`, falling back to `default_directive`.
#[must_use]
pub fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Formatting layer for the chosen log format.
pub fn fmt_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    match format {
        LogFormat::Text => tracing_subscriber::fmt::layer().with_target(false).boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .boxed(),
    }
}

/// Install the global subscriber.
///
/// # Errors
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(format: LogFormat) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = env_filter("info");

    tracing_subscriber::registry().with(fmt_layer(format).with_filter(filter)).try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        let filter = EnvFilter::new("info");
        assert_eq!(filter.to_string(), "info");
    }

    #[test]
    fn test_log_format_names() {
        assert_eq!(serde_json::to_string(&LogFormat::Json).unwrap(), "\"json\"");
        assert_eq!(LogFormat::default(), LogFormat::Text);
    }

    #[test]
    fn test_json_layer_records_spans() {
        let subscriber = tracing_subscriber::registry().with(fmt_layer(LogFormat::Json));
        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("scenario", name = "smoke");
            let _guard = span.enter();
            tracing::info!(vus = 1, "json line");
        });
    }

    #[test]
    fn test_text_layer_builds() {
        let subscriber = tracing_subscriber::registry().with(fmt_layer(LogFormat::Text));
        tracing::subscriber::with_default(subscriber, || tracing::info!("text line"));
    }
}
