// Structured logging initialization

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize structured logging
///
/// Log levels come from `RUST_LOG` when set, otherwise from `log_level`.
/// With `json` enabled every entry is emitted as one JSON object, the
/// format log aggregators expect.
pub fn init_logging(log_level: &str, json: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    let registry = tracing_subscriber::registry();
    if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_filter(env_filter),
            )
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    } else {
        registry
            .with(fmt::layer().with_target(true).with_filter(env_filter))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    }

    tracing::debug!(log_level, json, "Structured logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent_per_process() {
        // The first call wins; later calls report an error instead of
        // panicking.
        let first = init_logging("debug", false);
        let second = init_logging("info", true);
        assert!(first.is_ok() || second.is_err());
    }
}
