use crate::config::Environment;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter from `RUST_LOG`, defaulting to `info`.
pub(crate) fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the process-wide subscriber: pretty output in development, JSON in
/// production, plus an OpenTelemetry layer that is inert until a tracer
/// provider is registered.
///
/// Panics if a global subscriber is already installed; use
/// [`try_setup_logging`] where that can happen (tests, embedding).
pub fn setup_logging(environment: Environment) {
    if let Err(e) = try_setup_logging(environment) {
        panic!("failed to install tracing subscriber: {e}");
    }
}

pub fn try_setup_logging(environment: Environment) -> anyhow::Result<()> {
    let registry = tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_opentelemetry::layer());

    match environment {
        Environment::Production => registry
            .with(tracing_subscriber::fmt::layer().json().with_level(true))
            .try_init()?,
        Environment::Development => registry
            .with(tracing_subscriber::fmt::layer().pretty().with_ansi(true))
            .try_init()?,
    }

    tracing::debug!(environment = environment.as_str(), "Logging initialised");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_install_is_reported_not_panicking() {
        let _ = try_setup_logging(Environment::Development);
        assert!(try_setup_logging(Environment::Production).is_err());
    }
}
