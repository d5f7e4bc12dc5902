use tracing_subscriber::{
    EnvFilter,
    fmt::{self, time::LocalTime},
    prelude::*,
};

use crate::{common::types::AnyResult, configs::LoggingConfig};

/// Joins the base level with any extra directives, e.g. `info,crowdqueue::watcher=debug`.
pub fn build_filter(config: &LoggingConfig) -> String {
    let level = config.level.as_deref().unwrap_or("info");
    match config.filters.as_deref().map(str::trim) {
        Some(filters) if !filters.is_empty() => format!("{},{}", level, filters),
        _ => level.to_string(),
    }
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over the config.
pub fn init(config: &LoggingConfig) -> AnyResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(build_filter(config)));

    let stdout_layer = fmt::layer()
        .with_timer(LocalTime::rfc_3339())
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_defaults_to_info() {
        assert_eq!(build_filter(&LoggingConfig::default()), "info");
    }

    #[test]
    fn test_build_filter_appends_directives() {
        let config = LoggingConfig {
            level: Some("warn".into()),
            filters: Some(" crowdqueue::watcher=debug ".into()),
        };
        assert_eq!(build_filter(&config), "warn,crowdqueue::watcher=debug");
    }

    #[test]
    fn test_built_filter_parses() {
        let config = LoggingConfig {
            level: Some("debug".into()),
            filters: Some("crowdqueue::store=trace,dashmap=warn".into()),
        };
        assert!(EnvFilter::try_new(build_filter(&config)).is_ok());
    }
}
