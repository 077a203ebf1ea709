//! Subscriber setup for the CLI.

use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to bridge log records: {0}")]
    LogBridge(#[from] log::SetLoggerError),

    #[error("Failed to install subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Default filter for a `-v` count, used when `RUST_LOG` is unset.
pub fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "nfbatch=warn",
        1 => "nfbatch=info",
        2 => "nfbatch=debug",
        _ => "nfbatch=trace",
    }
}

/// Installs the global subscriber. `log` records from dependencies and from
/// the worker pool are forwarded into `tracing`. Output goes to stderr so
/// stdout stays free for the JSON report.
pub fn init_logging(verbosity: u8, json: bool) -> Result<(), LoggingError> {
    tracing_log::LogTracer::init()?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbosity).into());

    if json {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        );
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_levels() {
        assert_eq!(default_filter(0), "nfbatch=warn");
        assert_eq!(default_filter(1), "nfbatch=info");
        assert_eq!(default_filter(7), "nfbatch=trace");
    }
}
